//! Waypoint follower: the only writer of the agent record.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use crate::error::PipelineError;
use crate::models::{AgentState, FlightState, TargetPoint, TelemetryEvent};
use crate::shutdown;

/// Moves the agent toward each target in fixed steps, emitting a snapshot
/// after every step.
pub struct WaypointFollower {
    agent: AgentState,
    telemetry: mpsc::Sender<TelemetryEvent>,
    tick: Duration,
    battery_drain: f64,
}

impl WaypointFollower {
    pub fn new(
        agent: AgentState,
        telemetry: mpsc::Sender<TelemetryEvent>,
        tick: Duration,
        battery_drain: f64,
    ) -> Self {
        Self {
            agent,
            telemetry,
            tick,
            battery_drain,
        }
    }

    pub fn agent(&self) -> &AgentState {
        &self.agent
    }

    /// Step length for a leg, capped by the agent's top speed.
    pub fn step_size(&self, target: &TargetPoint) -> f64 {
        if target.speed.is_finite() && target.speed > 0.0 {
            target.speed.min(self.agent.speed)
        } else {
            self.agent.speed
        }
    }

    /// Fly to one target, one tick at a time.
    pub async fn follow(&mut self, target: TargetPoint) -> Result<(), PipelineError> {
        let step = self.step_size(&target);

        loop {
            let dx = target.position.lon - self.agent.position.lon;
            let dy = target.position.lat - self.agent.position.lat;
            let norm = (dx * dx + dy * dy).sqrt();

            // Zero or undefined direction: nothing to interpolate, snap.
            if !(step.is_finite() && step > 0.0) || !norm.is_finite() || norm <= step {
                break;
            }

            self.agent.position.lon += dx / norm * step;
            self.agent.position.lat += dy / norm * step;
            self.tick().await?;
        }

        self.agent.position = target.position;
        self.agent.state = FlightState::Flying;
        self.tick().await
    }

    async fn tick(&mut self) -> Result<(), PipelineError> {
        self.telemetry
            .send(self.agent.snapshot())
            .await
            .map_err(|_| PipelineError::QueueClosed("telemetry"))?;

        if !self.tick.is_zero() {
            tokio::time::sleep(self.tick).await;
        }
        self.agent.battery = (self.agent.battery - self.battery_drain).max(0.0);
        Ok(())
    }

    /// Consume targets until the queue closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut targets: mpsc::Receiver<TargetPoint>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            "Follower ready: {} (id {}) at ({}, {})",
            self.agent.name,
            self.agent.id,
            self.agent.position.lat,
            self.agent.position.lon
        );

        loop {
            tokio::select! {
                _ = shutdown::signalled(&mut shutdown) => {
                    tracing::info!("Follower shutting down");
                    break;
                }
                next = targets.recv() => {
                    let Some(target) = next else {
                        tracing::info!("Target queue closed");
                        break;
                    };
                    if let Err(err) = self.follow(target).await {
                        tracing::warn!("Follower stopped: {}", err);
                        break;
                    }
                }
            }
        }
    }
}
