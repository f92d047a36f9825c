//! Telemetry fan-out: pub/sub publish plus at most one realtime sink.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::models::TelemetryEvent;
use crate::shutdown;

/// Outbound buffer of an attached realtime sink.
pub const SINK_BUFFER: usize = 16;

/// Upper bound on one publish; a slower bus loses that tick.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PublishError(pub String);

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("failed to serialize telemetry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to publish telemetry: {0}")]
    Publish(#[from] PublishError),
    #[error("publish timed out after {0:?}")]
    PublishTimeout(Duration),
}

/// External message bus, one publish per telemetry tick.
pub trait TelemetryPublisher: Send + Sync + 'static {
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// In-process bus. Useful when no broker is configured and in tests.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: broadcast::Sender<(String, String)>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive `(topic, payload)` pairs published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<(String, String)> {
        self.tx.subscribe()
    }
}

impl TelemetryPublisher for ChannelPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        // No subscribers is not a failure for a bus.
        let _ = self.tx.send((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

struct Attached {
    id: u64,
    tx: mpsc::Sender<String>,
}

/// Slot holding zero or one realtime sink.
#[derive(Clone, Default)]
pub struct RealtimeSink {
    current: Arc<Mutex<Option<Attached>>>,
    next_id: Arc<AtomicU64>,
}

/// Receiving end handed to a newly attached connection.
pub struct SinkHandle {
    pub id: u64,
    pub rx: mpsc::Receiver<String>,
}

impl RealtimeSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Attached>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Attach a sink, replacing (and closing) any previous one.
    pub fn attach(&self, buffer: usize) -> SinkHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(buffer.max(1));
        if self.slot().replace(Attached { id, tx }).is_some() {
            tracing::info!("Realtime sink {} replaced the previous connection", id);
        }
        SinkHandle { id, rx }
    }

    /// Detach `id` if it is still the current sink.
    pub fn detach(&self, id: u64) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|a| a.id == id) {
            *slot = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    /// Forward one payload, waiting while the sink's buffer is full.
    pub async fn forward(&self, payload: String) {
        let current = self.slot().as_ref().map(|a| (a.id, a.tx.clone()));
        let Some((id, tx)) = current else {
            return;
        };
        if tx.send(payload).await.is_err() {
            tracing::debug!("Realtime sink {} went away", id);
            self.detach(id);
        }
    }
}

pub struct TelemetryFanout<P> {
    publisher: P,
    sink: RealtimeSink,
}

impl<P: TelemetryPublisher> TelemetryFanout<P> {
    pub fn new(publisher: P, sink: RealtimeSink) -> Self {
        Self { publisher, sink }
    }

    /// Serialize once, publish to `drone-{id}`, then forward to the sink.
    ///
    /// A publish failure or timeout is returned after the sink has still
    /// been served.
    pub async fn emit(&self, event: &TelemetryEvent) -> Result<(), FanoutError> {
        let payload = serde_json::to_string(event)?;
        let topic = event.topic();
        let publish = self.publisher.publish(&topic, &payload);
        let published = match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
            Ok(result) => result.map_err(FanoutError::from),
            Err(_) => Err(FanoutError::PublishTimeout(PUBLISH_TIMEOUT)),
        };
        self.sink.forward(payload).await;
        published
    }

    pub async fn run(
        self,
        mut events: mpsc::Receiver<TelemetryEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown::signalled(&mut shutdown) => {
                    tracing::info!("Telemetry fan-out shutting down");
                    break;
                }
                next = events.recv() => {
                    let Some(event) = next else {
                        tracing::info!("Telemetry queue closed");
                        break;
                    };
                    match self.emit(&event).await {
                        Ok(()) => {}
                        Err(err @ FanoutError::Serialize(_)) => {
                            tracing::error!(
                                "Telemetry tick at {} not delivered: {}",
                                event.timestamp,
                                err
                            );
                        }
                        Err(err) => tracing::warn!("{}", err),
                    }
                }
            }
        }
    }
}
