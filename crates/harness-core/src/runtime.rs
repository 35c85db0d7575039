//! The serial dispatch loop.
//!
//! Protocol commands from the connection task and operator requests from the
//! console task are posted to one bounded channel. A single task owns the
//! [`Dispatcher`] and handles inputs strictly in arrival order. The loop ends
//! once every [`HarnessHandle`] has been dropped and hands the dispatcher
//! back through its `JoinHandle`.

use crate::dispatcher::Dispatcher;
use crate::error::{HarnessError, Result};
use crate::operator::OperatorRequest;
use crate::types::HarnessSnapshot;
use game_api_protocol::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const INPUT_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum Input {
    Command(Command),
    Operator(OperatorRequest),
    Snapshot(oneshot::Sender<HarnessSnapshot>),
}

/// Cheap to clone; every clone feeds the same loop.
#[derive(Clone)]
pub struct HarnessHandle {
    tx: mpsc::Sender<Input>,
}

impl HarnessHandle {
    pub async fn command(&self, command: Command) -> Result<()> {
        self.send(Input::Command(command)).await
    }

    pub async fn operator(&self, request: OperatorRequest) -> Result<()> {
        self.send(Input::Operator(request)).await
    }

    /// Read-only view of the dispatcher after every input queued before this
    /// call has been handled.
    pub async fn snapshot(&self) -> Result<HarnessSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Input::Snapshot(tx)).await?;
        rx.await.map_err(|_| HarnessError::RuntimeStopped)
    }

    async fn send(&self, input: Input) -> Result<()> {
        self.tx
            .send(input)
            .await
            .map_err(|_| HarnessError::RuntimeStopped)
    }
}

/// Start the dispatch loop on the current tokio runtime.
pub fn spawn(dispatcher: Dispatcher) -> (HarnessHandle, JoinHandle<Dispatcher>) {
    let (tx, rx) = mpsc::channel(INPUT_CAPACITY);
    let task = tokio::spawn(run(dispatcher, rx));
    (HarnessHandle { tx }, task)
}

async fn run(mut dispatcher: Dispatcher, mut rx: mpsc::Receiver<Input>) -> Dispatcher {
    tracing::debug!("dispatch loop started");
    while let Some(input) = rx.recv().await {
        match input {
            Input::Command(command) => dispatcher.dispatch(command),
            Input::Operator(request) => dispatcher.handle_operator(request),
            Input::Snapshot(reply) => {
                let _ = reply.send(dispatcher.snapshot());
            }
        }
    }
    tracing::debug!("dispatch loop stopped");
    dispatcher
}
