//! Shared state handed to request handlers.

use std::time::Duration;

use drone_core::{CommandSender, RealtimeSink};
use tokio::sync::broadcast;

pub struct AppState {
    pub commands: CommandSender,
    pub sink: RealtimeSink,
    pub submit_timeout: Option<Duration>,
    shutdown: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        commands: CommandSender,
        sink: RealtimeSink,
        submit_timeout: Option<Duration>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            commands,
            sink,
            submit_timeout,
            shutdown,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }
}
