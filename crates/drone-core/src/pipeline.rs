//! Wiring of the three stages.
//!
//! ```text
//! commands -> dispatcher -> targets -> follower -> telemetry -> fan-out -> {bus, sink}
//! ```

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::dispatcher::TrajectoryDispatcher;
use crate::fanout::{RealtimeSink, TelemetryFanout, TelemetryPublisher};
use crate::follower::WaypointFollower;
use crate::models::AgentState;
use crate::queue::{command_queue, CommandSender, DEFAULT_COMMAND_CAPACITY};

const TARGET_QUEUE_CAPACITY: usize = 1;
const TELEMETRY_QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub command_capacity: usize,
    /// Pacing delay paid by every tick.
    pub tick: Duration,
    pub battery_drain: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            tick: Duration::from_secs(2),
            battery_drain: 0.01,
        }
    }
}

/// Running pipeline: the submit side of the command queue, the realtime
/// sink slot, and the three stage tasks.
pub struct Pipeline {
    pub commands: CommandSender,
    pub sink: RealtimeSink,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn dispatcher, follower and fan-out. The agent moves into the follower.
    pub fn spawn<P: TelemetryPublisher>(
        agent: AgentState,
        publisher: P,
        config: PipelineConfig,
        shutdown: &broadcast::Sender<()>,
    ) -> Self {
        let (commands, command_rx) = command_queue(config.command_capacity.max(1));
        let (target_tx, target_rx) = mpsc::channel(TARGET_QUEUE_CAPACITY);
        let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_QUEUE_CAPACITY);
        let sink = RealtimeSink::new();

        let step = agent.speed;
        let dispatcher =
            TrajectoryDispatcher::new(command_rx, target_tx, step, shutdown.subscribe());
        let follower =
            WaypointFollower::new(agent, telemetry_tx, config.tick, config.battery_drain);
        let fanout = TelemetryFanout::new(publisher, sink.clone());

        let tasks = vec![
            tokio::spawn(dispatcher.run()),
            tokio::spawn(follower.run(target_rx, shutdown.subscribe())),
            tokio::spawn(fanout.run(telemetry_rx, shutdown.subscribe())),
        ];

        Self {
            commands,
            sink,
            tasks,
        }
    }

    /// Wait for every stage to stop.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!("Pipeline stage panicked: {}", err);
            }
        }
    }
}
