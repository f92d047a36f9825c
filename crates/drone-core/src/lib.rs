//! Drone simulator core: trajectory sampling, motion, and telemetry fan-out.

pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod follower;
pub mod models;
pub mod pattern;
pub mod pipeline;
pub mod queue;
mod shutdown;

pub use dispatcher::TrajectoryDispatcher;
pub use error::PipelineError;
pub use fanout::{
    ChannelPublisher, FanoutError, PublishError, RealtimeSink, SinkHandle, TelemetryFanout,
    TelemetryPublisher,
};
pub use follower::WaypointFollower;
pub use models::{
    AgentState, FlightState, GeoPoint, PathType, TargetPoint, TelemetryEvent, TrajectoryCommand,
};
pub use pattern::{sample, Frequencies, Sweep};
pub use pipeline::{Pipeline, PipelineConfig};
pub use queue::{command_queue, CommandReceiver, CommandSender, SubmitError};
