//! Core data models for the drone pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in degrees (lat/lon) and meters (alt).
///
/// Clients sometimes post a full telemetry record where a point is expected;
/// unknown fields are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    /// Squared planar distance, longitude as x and latitude as y.
    pub fn distance_sq(&self, other: &GeoPoint) -> f64 {
        let dx = other.lon - self.lon;
        let dy = other.lat - self.lat;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &GeoPoint) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

/// Operational state reported in telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightState {
    #[default]
    Ready,
    Flying,
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightState::Ready => f.write_str("Ready"),
            FlightState::Flying => f.write_str("Flying"),
        }
    }
}

/// The single mutable agent record. Owned by the waypoint follower.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub id: u32,
    pub name: String,
    pub position: GeoPoint,
    pub state: FlightState,
    pub battery: f64,
    /// Per-tick maximum step, in degrees. Never leaves the process.
    pub speed: f64,
}

impl AgentState {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        position: GeoPoint,
        speed: f64,
        battery: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            state: FlightState::Ready,
            battery,
            speed,
        }
    }

    /// Immutable copy for observers, stamped with the current time.
    pub fn snapshot(&self) -> TelemetryEvent {
        TelemetryEvent {
            id: self.id,
            name: self.name.clone(),
            lat: self.position.lat,
            lon: self.position.lon,
            alt: self.position.alt,
            state: self.state,
            batt: self.battery,
            timestamp: Utc::now(),
        }
    }
}

/// Trajectory families understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum PathType {
    Sine,
    Figure8,
    Clockwise,
    CounterClockwise,
    Patrol,
    Random,
    Unrecognized,
}

impl PathType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "sine" => PathType::Sine,
            "figure8" => PathType::Figure8,
            "clockwise" => PathType::Clockwise,
            "counter-clockwise" => PathType::CounterClockwise,
            "patrol" => PathType::Patrol,
            "random" => PathType::Random,
            _ => PathType::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PathType::Sine => "sine",
            PathType::Figure8 => "figure8",
            PathType::Clockwise => "clockwise",
            PathType::CounterClockwise => "counter-clockwise",
            PathType::Patrol => "patrol",
            PathType::Random => "random",
            PathType::Unrecognized => "unrecognized",
        }
    }
}

impl From<String> for PathType {
    fn from(raw: String) -> Self {
        PathType::parse(&raw)
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A motion request, expanded by the dispatcher into target points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryCommand {
    #[serde(rename = "path")]
    pub path_type: PathType,
    /// Free-form, carried through untouched.
    #[serde(rename = "props", default)]
    pub properties: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Curve foci for the sampled families, waypoints for patrol.
    #[serde(default)]
    pub points: Vec<GeoPoint>,
    /// Frequency multipliers for `sine`.
    #[serde(default)]
    pub data: Vec<f64>,
}

impl TrajectoryCommand {
    pub fn new(path_type: PathType, start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            path_type,
            properties: String::new(),
            start,
            end,
            points: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn with_points(mut self, points: Vec<GeoPoint>) -> Self {
        self.points = points;
        self
    }

    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data = data;
        self
    }

    pub fn left_control(&self) -> Option<&GeoPoint> {
        self.points.first()
    }

    pub fn right_control(&self) -> Option<&GeoPoint> {
        self.points.get(1)
    }

    /// Outer/inner frequency pair from `data`, zero when absent.
    pub fn frequencies(&self) -> (f64, f64) {
        (
            self.data.first().copied().unwrap_or(0.0),
            self.data.get(1).copied().unwrap_or(0.0),
        )
    }
}

/// One leg of motion: where to go and how fast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPoint {
    pub position: GeoPoint,
    pub speed: f64,
}

impl TargetPoint {
    pub fn new(position: GeoPoint, speed: f64) -> Self {
        Self { position, speed }
    }
}

/// Snapshot of the agent at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: u32,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub state: FlightState,
    pub batt: f64,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon, self.alt)
    }

    /// Pub/sub topic for this agent.
    pub fn topic(&self) -> String {
        format!("drone-{}", self.id)
    }
}
