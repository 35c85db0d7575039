use harness_core::{HarnessHandle, Outbound};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub harness: HarnessHandle,
    /// Outgoing envelopes from the dispatcher. The connected game's socket
    /// holds the lock for as long as it is open.
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<Outbound>>>,
}

impl AppState {
    pub fn new(harness: HarnessHandle, outbound: mpsc::UnboundedReceiver<Outbound>) -> Self {
        Self {
            harness,
            outbound: Arc::new(Mutex::new(outbound)),
        }
    }

    /// Claim the outgoing stream for a new connection. `None` while another
    /// game is connected.
    pub fn claim_outbound(&self) -> Option<OwnedMutexGuard<mpsc::UnboundedReceiver<Outbound>>> {
        self.outbound.clone().try_lock_owned().ok()
    }
}
