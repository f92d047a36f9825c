//! Parametric pattern sampling.
//!
//! A sweep walks one full revolution (i = 1..359 degrees) of
//!
//! ```text
//! p(i) = start + sin(outer·i°)·(end − start) + cos(inner·i°)·(left − right)
//! ```
//!
//! and keeps only samples more than one step away from the last kept sample,
//! so the follower never gets two targets closer than one tick of motion.

use std::f64::consts::PI;

use crate::models::{GeoPoint, PathType, TargetPoint};

/// Degrees walked per sweep.
pub const SWEEP_DEGREES: u32 = 360;

/// Outer/inner frequency multipliers for a curve family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frequencies {
    pub outer: f64,
    pub inner: f64,
}

impl Frequencies {
    pub const FIGURE8: Frequencies = Frequencies::new(1.0, 2.0);
    pub const CLOCKWISE: Frequencies = Frequencies::new(1.0, 1.0);
    pub const COUNTER_CLOCKWISE: Frequencies = Frequencies::new(1.0, -1.0);

    pub const fn new(outer: f64, inner: f64) -> Self {
        Self { outer, inner }
    }

    /// Fixed pair for a named family. `None` for families that take their
    /// frequencies from the command or are not sampled at all.
    pub fn for_path(path_type: PathType) -> Option<Frequencies> {
        match path_type {
            PathType::Figure8 => Some(Self::FIGURE8),
            PathType::Clockwise => Some(Self::CLOCKWISE),
            PathType::CounterClockwise => Some(Self::COUNTER_CLOCKWISE),
            _ => None,
        }
    }
}

/// Default foci: perpendicular offsets of a quarter chord around the midpoint.
pub fn default_controls(start: &GeoPoint, end: &GeoPoint) -> (GeoPoint, GeoPoint) {
    let a = (end.lon - start.lon) / 2.0;
    let b = (end.lat - start.lat) / 2.0;
    let mx = start.lon + a;
    let my = start.lat + b;
    (
        GeoPoint::new(my + a / 2.0, mx - b / 2.0, start.alt),
        GeoPoint::new(my - a / 2.0, mx + b / 2.0, start.alt),
    )
}

/// Point on the curve at `degree`, before any down-sampling.
pub fn curve_point(
    start: &GeoPoint,
    end: &GeoPoint,
    left: &GeoPoint,
    right: &GeoPoint,
    freq: Frequencies,
    degree: u32,
) -> GeoPoint {
    let theta = f64::from(degree) * PI / 180.0;
    let s = (freq.outer * theta).sin();
    let c = (freq.inner * theta).cos();
    GeoPoint::new(
        start.lat + s * (end.lat - start.lat) + c * (left.lat - right.lat),
        start.lon + s * (end.lon - start.lon) + c * (left.lon - right.lon),
        start.alt,
    )
}

/// Lazy, single-use sweep over one revolution of a curve.
#[derive(Debug, Clone)]
pub struct Sweep {
    start: GeoPoint,
    end: GeoPoint,
    left: GeoPoint,
    right: GeoPoint,
    freq: Frequencies,
    step: f64,
    degree: u32,
    last: Option<GeoPoint>,
}

impl Iterator for Sweep {
    type Item = TargetPoint;

    fn next(&mut self) -> Option<TargetPoint> {
        while self.degree < SWEEP_DEGREES {
            let point = curve_point(
                &self.start,
                &self.end,
                &self.left,
                &self.right,
                self.freq,
                self.degree,
            );
            self.degree += 1;

            let far_enough = match self.last {
                Some(last) => last.distance_sq(&point) > self.step * self.step,
                None => true,
            };
            if far_enough {
                self.last = Some(point);
                return Some(TargetPoint::new(point, self.step));
            }
        }
        None
    }
}

/// Start a sweep. Default controls are derived unless both are supplied.
pub fn sample(
    start: &GeoPoint,
    end: &GeoPoint,
    left: Option<&GeoPoint>,
    right: Option<&GeoPoint>,
    freq: Frequencies,
    step_threshold: f64,
) -> Sweep {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (*l, *r),
        _ => default_controls(start, end),
    };
    Sweep {
        start: *start,
        end: *end,
        left,
        right,
        freq,
        step: step_threshold,
        degree: 1,
        last: None,
    }
}
