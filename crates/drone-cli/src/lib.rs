//! Drone CLI - operator tools for the drone simulator.
//!
//! - send_flight: queue a trajectory command
//! - watch_telemetry: attach to the realtime stream and print ticks

pub mod presets;

pub use presets::{parse_point, Preset};
