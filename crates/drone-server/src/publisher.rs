//! Redis pub/sub publisher for telemetry ticks.
//!
//! The broker connection is opened lazily on the first publish and reopened
//! after a failure, at most once per `RECONNECT_BACKOFF`. Startup never waits
//! on the broker.

use std::time::Duration;

use drone_core::{PublishError, TelemetryPublisher};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Link {
    conn: Option<ConnectionManager>,
    last_attempt: Option<Instant>,
}

pub struct RedisPublisher {
    client: redis::Client,
    link: Mutex<Link>,
}

impl RedisPublisher {
    /// Parse the broker address. Does not connect.
    pub fn new(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            link: Mutex::new(Link::default()),
        })
    }

    fn manager_config() -> ConnectionManagerConfig {
        ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT)
            .set_number_of_retries(1)
    }

    async fn connection(&self) -> Result<ConnectionManager, PublishError> {
        let mut link = self.link.lock().await;
        if let Some(conn) = &link.conn {
            return Ok(conn.clone());
        }
        if link
            .last_attempt
            .is_some_and(|at| at.elapsed() < RECONNECT_BACKOFF)
        {
            return Err(PublishError("redis unavailable, waiting to reconnect".into()));
        }

        link.last_attempt = Some(Instant::now());
        let connect = self
            .client
            .get_connection_manager_with_config(Self::manager_config());
        match tokio::time::timeout(CONNECT_TIMEOUT * 2, connect).await {
            Ok(Ok(conn)) => {
                tracing::info!("Connected to redis");
                link.conn = Some(conn.clone());
                Ok(conn)
            }
            Ok(Err(err)) => Err(PublishError(format!("redis connect: {}", err))),
            Err(_) => Err(PublishError("redis connect timed out".into())),
        }
    }
}

impl TelemetryPublisher for RedisPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let mut conn = self.connection().await?;
        conn.publish::<_, _, ()>(topic, payload)
            .await
            .map_err(|err| PublishError(format!("redis publish to {}: {}", topic, err)))
    }
}

/// Publisher selected at startup.
pub enum BusPublisher {
    Redis(RedisPublisher),
    Disabled,
}

impl BusPublisher {
    /// Publishing is disabled only when no broker is configured or its
    /// address is invalid. An unreachable broker is retried while running.
    pub fn from_config(config: &Config) -> Self {
        let Some(url) = config.redis_url() else {
            tracing::info!("Pub/sub publishing disabled");
            return BusPublisher::Disabled;
        };

        match RedisPublisher::new(&url) {
            Ok(publisher) => {
                tracing::info!("Publishing telemetry to {}", url);
                BusPublisher::Redis(publisher)
            }
            Err(err) => {
                tracing::warn!("Invalid redis address {}, publishing disabled: {}", url, err);
                BusPublisher::Disabled
            }
        }
    }
}

impl TelemetryPublisher for BusPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        match self {
            BusPublisher::Redis(publisher) => publisher.publish(topic, payload).await,
            BusPublisher::Disabled => Ok(()),
        }
    }
}
