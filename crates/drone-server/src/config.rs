//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use drone_core::{AgentState, GeoPoint, PipelineConfig};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for `POST /fly`.
    pub command_port: u16,
    /// Port for the realtime WebSocket stream.
    pub stream_port: u16,
    pub drone_name: String,
    pub drone_id: u32,
    /// Maximum step per tick, in degrees.
    pub top_speed: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Redis host:port (or URL). Empty disables publishing.
    pub redis_addr: Option<String>,
    pub tick_ms: u64,
    pub battery: f64,
    pub battery_drain: f64,
    pub command_queue_capacity: usize,
    /// How long `POST /fly` waits on a full queue. Unset waits indefinitely.
    pub submit_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_port: 3000,
            stream_port: 3070,
            drone_name: "drone".to_string(),
            drone_id: 9,
            top_speed: 0.000129726,
            latitude: -33.937687,
            longitude: 151.19189864,
            redis_addr: Some("localhost:6379".to_string()),
            tick_ms: 2000,
            battery: 10800.0,
            battery_drain: 0.01,
            command_queue_capacity: 2,
            submit_timeout_ms: None,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            command_port: parsed("DRONE_COMMAND_PORT", defaults.command_port),
            stream_port: parsed("DRONE_STREAM_PORT", defaults.stream_port),
            drone_name: env::var("DRONE_NAME").unwrap_or(defaults.drone_name),
            drone_id: parsed("DRONE_ID", defaults.drone_id),
            top_speed: parsed("DRONE_TOP_SPEED", defaults.top_speed),
            latitude: parsed("DRONE_LATITUDE", defaults.latitude),
            longitude: parsed("DRONE_LONGITUDE", defaults.longitude),
            redis_addr: match env::var("DRONE_REDIS_ADDR") {
                Ok(addr) if addr.trim().is_empty() => None,
                Ok(addr) => Some(addr),
                Err(_) => defaults.redis_addr,
            },
            tick_ms: parsed("DRONE_TICK_MS", defaults.tick_ms),
            battery: parsed("DRONE_BATTERY", defaults.battery),
            battery_drain: parsed("DRONE_BATTERY_DRAIN", defaults.battery_drain),
            command_queue_capacity: parsed("DRONE_COMMAND_QUEUE", defaults.command_queue_capacity),
            submit_timeout_ms: env::var("DRONE_SUBMIT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.top_speed.is_finite() && self.top_speed > 0.0) {
            bail!("DRONE_TOP_SPEED must be positive, got {}", self.top_speed);
        }
        if self.command_queue_capacity == 0 {
            bail!("DRONE_COMMAND_QUEUE must be at least 1");
        }
        if !(self.battery_drain.is_finite() && self.battery_drain >= 0.0) {
            bail!("DRONE_BATTERY_DRAIN must be non-negative, got {}", self.battery_drain);
        }
        Ok(())
    }

    /// Broker URL, accepting a bare `host:port`.
    pub fn redis_url(&self) -> Option<String> {
        self.redis_addr.as_ref().map(|addr| {
            if addr.contains("://") {
                addr.clone()
            } else {
                format!("redis://{}", addr)
            }
        })
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }

    pub fn agent(&self) -> AgentState {
        AgentState::new(
            self.drone_id,
            self.drone_name.clone(),
            GeoPoint::new(self.latitude, self.longitude, 0.0),
            self.top_speed,
            self.battery,
        )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            command_capacity: self.command_queue_capacity,
            tick: Duration::from_millis(self.tick_ms),
            battery_drain: self.battery_drain,
        }
    }
}
