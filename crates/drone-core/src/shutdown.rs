//! Shutdown signal shared by the pipeline stages.
//!
//! Only an explicit send on the broadcast channel stops a stage. Dropping
//! every sender leaves the stages running.

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

/// Resolves once shutdown is sent. Never resolves after the senders are gone.
pub(crate) async fn signalled(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending().await,
    }
}

/// Non-blocking check for a sent shutdown.
pub(crate) fn requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    match shutdown.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
    }
}
