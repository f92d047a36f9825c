//! Drone simulator server: adapters around the core pipeline.

pub mod api;
pub mod config;
pub mod publisher;
pub mod state;
