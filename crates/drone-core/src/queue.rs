//! Bounded command queue with blocking submit and a non-blocking peek.
//!
//! Capacity is the only admission control: at most one command executing
//! plus `capacity` waiting. Submitters wait once it is full.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::TrajectoryCommand;

/// Reference capacity of the command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 2;

/// The dispatcher is gone; the rejected command is handed back.
#[derive(Debug, Error)]
#[error("command queue is closed")]
pub struct SubmitError(pub TrajectoryCommand);

/// Create a command queue. `capacity` must be non-zero.
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Submitting half, cheap to clone into request handlers.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<TrajectoryCommand>,
}

impl CommandSender {
    /// Enqueue, waiting while the queue is full.
    pub async fn submit(&self, command: TrajectoryCommand) -> Result<(), SubmitError> {
        self.tx
            .send(command)
            .await
            .map_err(|err| SubmitError(err.0))
    }
}

/// Consuming half, owned by the dispatcher.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<TrajectoryCommand>,
}

impl CommandReceiver {
    /// Next command in FIFO order; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<TrajectoryCommand> {
        self.rx.recv().await
    }

    /// Non-blocking peek: is another command waiting?
    pub fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}
