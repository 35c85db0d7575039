use axum::http::StatusCode;
use futures::{SinkExt, StreamExt};
use harness_core::capability::{ChannelPresentation, ChannelTransport, UiEvent};
use harness_core::controls::Controls;
use harness_core::sampler::JsonSchemaSampler;
use harness_core::{runtime, Dispatcher};
use harness_server::state::AppState;
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn app_state(controls: Controls) -> (AppState, mpsc::UnboundedReceiver<UiEvent>) {
    let (presentation, events) = ChannelPresentation::channel();
    let (transport, outbound) = ChannelTransport::channel();
    let dispatcher = Dispatcher::new(
        controls,
        Box::new(presentation),
        Box::new(transport),
        Box::new(JsonSchemaSampler::seeded(11)),
    )
    .with_seed(11);
    let (handle, _task) = runtime::spawn(dispatcher);
    (AppState::new(handle, outbound), events)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn start_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(harness_server::serve_on(state, listener));
    format!("ws://{addr}/")
}

async fn next_text<S>(stream: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_of_fresh_harness_is_empty() {
    let (state, _events) = app_state(Controls::default());
    let app = harness_server::build_router(state);
    let (status, json) = get(app, "/api/actions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["actions"], serde_json::json!([]));
    assert_eq!(json["forced"]["state"], "idle");
    assert_eq!(json["controls"]["validate_schema"], true);
    assert_eq!(json["execution_locked"], false);
}

#[tokio::test]
async fn plain_get_on_socket_route_is_rejected() {
    let (state, _events) = app_state(Controls::default());
    let app = harness_server::build_router(state);
    let (status, _) = get(app, "/").await;
    assert!(status.is_client_error());
}

// ---------------------------------------------------------------------------
// WebSocket transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forced_action_round_trip_over_websocket() {
    let controls = Controls {
        auto_send: true,
        ..Controls::default()
    };
    let (state, _events) = app_state(controls);
    let url = start_server(state.clone()).await;

    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut write, mut read) = ws.split();

    let frames = [
        r#"{"command":"startup","game":"Test Game"}"#,
        r#"{"command":"actions/register","game":"Test Game","data":{"actions":[{"name":"jump","description":"Jump"}]}}"#,
        r#"{"command":"actions/force","game":"Test Game","data":{"query":"jump now","action_names":["jump"]}}"#,
    ];
    for frame in frames {
        write.send(Message::Text(frame.into())).await.unwrap();
    }

    let action = next_text(&mut read).await;
    assert_eq!(action["command"], "action");
    assert_eq!(action["data"]["id"], "action_0");
    assert_eq!(action["data"]["name"], "jump");

    write
        .send(Message::Text(
            r#"{"command":"action/result","game":"Test Game","data":{"id":"action_0","success":false}}"#.into(),
        ))
        .await
        .unwrap();
    let retry = next_text(&mut read).await;
    assert_eq!(retry["data"]["id"], "action_1");

    let snapshot = state.harness.snapshot().await.unwrap();
    assert_eq!(snapshot.invocations_sent, 2);
}

#[tokio::test]
async fn undecodable_frames_are_dropped() {
    let (state, _events) = app_state(Controls::default());
    let url = start_server(state.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.send(Message::Text(r#"{"no_command":true}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text(
        r#"{"command":"actions/register","game":"g","data":{"actions":[{"name":"wave","description":"Wave"}]}}"#.into(),
    ))
    .await
    .unwrap();

    let mut registered = false;
    for _ in 0..50 {
        let snapshot = state.harness.snapshot().await.unwrap();
        if snapshot.actions.iter().any(|a| a.name == "wave") {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registered);
}

#[tokio::test]
async fn second_game_connection_is_refused() {
    let (state, _events) = app_state(Controls::default());
    let url = start_server(state).await;

    let (_first, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let second = tokio_tungstenite::connect_async(&url).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn send_delay_postpones_outgoing_frame() {
    let controls = Controls {
        send_delay_ms: 200,
        ..Controls::default()
    };
    let (state, _events) = app_state(controls);
    let url = start_server(state.clone()).await;
    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (_write, mut read) = ws.split();

    state
        .harness
        .operator(harness_core::operator::OperatorRequest::ShutdownImmediate)
        .await
        .unwrap();
    let started = std::time::Instant::now();
    let frame = next_text(&mut read).await;
    assert_eq!(frame["command"], "shutdown/immediate");
    assert!(started.elapsed() >= Duration::from_millis(150));
}
