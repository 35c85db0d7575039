use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, StreamExt};
use harness_core::{HarnessHandle, Outbound};
use tokio::sync::{mpsc, OwnedMutexGuard};

use crate::error::AppError;
use crate::state::AppState;

/// GET /: the game's WebSocket. One game at a time; a second connection is
/// refused with 409 until the first one closes.
pub async fn game_socket(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let Some(outbound) = app.claim_outbound() else {
        tracing::warn!("refusing second game connection");
        return Err(AppError::conflict("a game is already connected"));
    };
    let harness = app.harness.clone();
    Ok(ws.on_upgrade(move |socket| connection(socket, harness, outbound)))
}

async fn connection(
    socket: WebSocket,
    harness: HarnessHandle,
    mut outbound: OwnedMutexGuard<mpsc::UnboundedReceiver<Outbound>>,
) {
    tracing::info!("game connected");
    let (mut sink, mut stream) = socket.split();

    let writer = async {
        if let Some(lost) = write_outbound(&mut sink, &mut outbound).await {
            tracing::warn!(
                command = lost.command.kind(),
                "game disconnected before the frame was written; it was not delivered"
            );
        }
    };

    let reader = async {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    tracing::debug!(frame = %text.as_str(), "<- game");
                    match game_api_protocol::decode(text.as_str()) {
                        Ok(command) => {
                            if harness.command(command).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "dropping undecodable frame"),
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "websocket read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }
    tracing::info!("game disconnected");
}

/// Writes envelopes until the queue closes. Returns the envelope that was
/// taken off the queue but could not be written.
async fn write_outbound<S>(
    sink: &mut S,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
) -> Option<Outbound>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(envelope) = outbound.recv().await {
        if !envelope.delay.is_zero() {
            tokio::time::sleep(envelope.delay).await;
        }
        let frame = match game_api_protocol::encode(&envelope.command) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(command = envelope.command.kind(), error = %e, "cannot encode frame");
                continue;
            }
        };
        tracing::debug!(%frame, "-> game");
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
            tracing::debug!(error = %e, "websocket write failed");
            return Some(envelope);
        }
    }
    None
}
