//! Ready-made trajectory commands around a center point.

use clap::ValueEnum;
use drone_core::{GeoPoint, PathType, TrajectoryCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Clockwise circle of `radius` degrees
    Circle,
    /// Figure eight spanning `radius` degrees
    Figure8,
    /// Patrol the corners of a square with half-side `radius`
    PatrolSquare,
}

impl Preset {
    pub fn build(self, center: GeoPoint, radius: f64) -> TrajectoryCommand {
        match self {
            Preset::Circle => orbit(PathType::Clockwise, center, radius),
            Preset::Figure8 => orbit(PathType::Figure8, center, radius),
            Preset::PatrolSquare => patrol_square(center, radius),
        }
    }
}

/// Controls one radius apart in latitude and an end point one radius east
/// make the sampled curve a circle of `radius` around `center`.
fn orbit(path_type: PathType, center: GeoPoint, radius: f64) -> TrajectoryCommand {
    let east = GeoPoint::new(center.lat, center.lon + radius, center.alt);
    let north = GeoPoint::new(center.lat + radius / 2.0, center.lon, center.alt);
    let south = GeoPoint::new(center.lat - radius / 2.0, center.lon, center.alt);
    TrajectoryCommand::new(path_type, center, east).with_points(vec![north, south])
}

fn patrol_square(center: GeoPoint, half_side: f64) -> TrajectoryCommand {
    let corner = |dlat: f64, dlon: f64| {
        GeoPoint::new(center.lat + dlat * half_side, center.lon + dlon * half_side, center.alt)
    };
    let corners = vec![corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0), corner(-1.0, -1.0)];
    TrajectoryCommand::new(PathType::Patrol, corners[0], center).with_points(corners)
}

/// Parse `lat,lon` or `lat,lon,alt`.
pub fn parse_point(raw: &str) -> Result<GeoPoint, String> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid point '{}': {}", raw, e))?;

    match parts.as_slice() {
        [lat, lon] => Ok(GeoPoint::new(*lat, *lon, 0.0)),
        [lat, lon, alt] => Ok(GeoPoint::new(*lat, *lon, *alt)),
        _ => Err(format!("expected lat,lon[,alt], got '{}'", raw)),
    }
}
