//! Basic geometry of the plot clock, including conversion from Cartesian
//! coordinates to servo angles and servo pulse widths.
//!
//! The mechanism is a five-bar linkage. Two servos sit side by side below
//! the drawing surface, each turning a short "upper arm" of length `L1`.
//! The left upper arm carries a bent "forearm": the pen sits at distance `L2`
//! from the left elbow, and a "coupling point" sits `L3` back from the pen,
//! bent away from the forearm by a fixed angle. The right upper arm is joined
//! to that coupling point by a link of length `L2 - L3`.
//!
//! All lengths are in millimeters, and the `y` axis points away from the
//! servos (so everything that can be drawn has a positive `y`).
//!
//! This crate supports `no_std` and uses `libm` to allow for running in
//! embedded contexts.

#![cfg_attr(not(feature = "std"), no_std)]

use core::f64::consts::PI;
use libm::{acos, atan2, cos, floor, sin, sqrt};

pub type Angle = euclid::Angle<f64>;
pub type Point = euclid::Point2D<f64, Mm>;
pub type Vector = euclid::Vector2D<f64, Mm>;

pub struct Mm;

pub type Len = euclid::Length<f64, Mm>;

fn square<T: core::ops::Mul<T> + Copy>(x: T) -> <T as core::ops::Mul<T>>::Output {
    x * x
}

fn unit(angle: f64) -> Vector {
    Vector::new(cos(angle), sin(angle))
}

fn polar(from: Point, to: Point) -> (f64, f64) {
    let d = to - from;
    (sqrt(square(d.x) + square(d.y)), atan2(d.y, d.x))
}

pub trait LenExt {
    fn mm(self) -> Len;
}

impl LenExt for f64 {
    fn mm(self) -> Len {
        Len::new(self)
    }
}

pub trait FromKurbo {
    type Input;
    fn from_kurbo(p: Self::Input) -> Self;
}

#[cfg(feature = "kurbo")]
impl FromKurbo for Point {
    type Input = kurbo::Point;
    fn from_kurbo(p: kurbo::Point) -> Self {
        Point::new(p.x, p.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LeftRight<T> {
    pub left: T,
    pub right: T,
}

/// Angles of the two servos, in the servos' own frames of reference.
///
/// The left angle is measured so that zero points the left upper arm
/// straight to the left (the negative `x` direction); the right angle is
/// zero when the right upper arm points to the right. These are the angles
/// that the [`ServoCalibration`]s turn into pulse widths.
pub type JointAngles = LeftRight<Angle>;

/// Pulse widths of the two arm servos, in microseconds.
pub type ServoPulses = LeftRight<i32>;

/// A requested pen position that the linkage can't reach: one of the
/// triangles in the inverse kinematics has no solution.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("point ({x:.2}, {y:.2}) is outside the reachable workspace")]
pub struct UnreachablePosition {
    pub x: f64,
    pub y: f64,
}

impl UnreachablePosition {
    pub fn at(p: &Point) -> Self {
        UnreachablePosition { x: p.x, y: p.y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("arm length {name} must be positive (got {value})")]
    NonPositiveLength { name: &'static str, value: f64 },
    #[error("L3 ({l3}) must be shorter than L2 ({l2})")]
    CouplingTooLong { l2: f64, l3: f64 },
    #[error("the {side} servo has a zero (or non-finite) scale")]
    BadScale { side: &'static str },
    #[error("the servo origins coincide")]
    CoincidentOrigins,
}

/// Solves a triangle with the cosine rule.
///
/// Returns the angle between the sides of lengths `a` and `c`, which is
/// the angle opposite the side of length `b`. Returns `None` if there is
/// no triangle with these side lengths.
pub fn solve_joint_angle(a: f64, b: f64, c: f64) -> Option<Angle> {
    let cosine = (square(a) + square(c) - square(b)) / (2.0 * a * c);
    // This also rejects NaN, which we get if a or c is zero.
    if (-1.0..=1.0).contains(&cosine) {
        Some(Angle::radians(acos(cosine)))
    } else {
        None
    }
}

/// Converts between servo angles and pulse widths for a single servo.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServoCalibration {
    /// The pulse width (in microseconds) corresponding to a zero angle.
    pub zero_offset: f64,
    /// Microseconds of pulse width per radian.
    ///
    /// To calibrate, adjust this until a commanded 90 degree swing is
    /// really 90 degrees.
    pub scale: f64,
}

impl ServoCalibration {
    pub fn pulse(&self, angle: Angle) -> i32 {
        floor(angle.get() * self.scale + self.zero_offset) as i32
    }

    pub fn angle(&self, pulse: i32) -> Angle {
        Angle::radians((pulse as f64 - self.zero_offset) / self.scale)
    }
}

/// The physical dimensions of the linkage.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArmGeometry {
    /// Length of both upper arms (servo to elbow).
    pub l1: Len,
    /// Distance from the left elbow to the pen.
    pub l2: Len,
    /// Distance from the pen back to the coupling point, where the right
    /// forearm attaches.
    pub l3: Len,
    /// Axis of the left servo.
    pub left_origin: Point,
    /// Axis of the right servo.
    pub right_origin: Point,
    /// The bend in the left forearm: the angle at the pen between the
    /// direction to the left elbow and the direction to the coupling point.
    pub coupling_angle: Angle,
}

pub struct ConfigBuilder {
    l1: Len,
    l2: Len,
    l3: Len,
    left_origin: Point,
    right_origin: Point,
    coupling_angle: Angle,
    left_servo: ServoCalibration,
    right_servo: ServoCalibration,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            l1: 35.0.mm(),
            l2: 55.1.mm(),
            l3: 13.2.mm(),
            left_origin: Point::new(22.0, -25.0),
            right_origin: Point::new(47.0, -25.0),
            // About 35.6 degrees.
            coupling_angle: Angle::radians(0.621),
            left_servo: ServoCalibration {
                zero_offset: 2500.0,
                scale: 650.0,
            },
            right_servo: ServoCalibration {
                zero_offset: 850.0,
                scale: 650.0,
            },
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> Config {
        Config {
            arms: ArmGeometry {
                l1: self.l1,
                l2: self.l2,
                l3: self.l3,
                left_origin: self.left_origin,
                right_origin: self.right_origin,
                coupling_angle: self.coupling_angle,
            },
            left_servo: self.left_servo,
            right_servo: self.right_servo,
        }
    }

    pub fn with_arm_lengths(&mut self, l1: Len, l2: Len, l3: Len) -> &mut Self {
        self.l1 = l1;
        self.l2 = l2;
        self.l3 = l3;
        self
    }

    pub fn with_origins(&mut self, left: Point, right: Point) -> &mut Self {
        self.left_origin = left;
        self.right_origin = right;
        self
    }

    pub fn with_coupling_angle(&mut self, angle: Angle) -> &mut Self {
        self.coupling_angle = angle;
        self
    }

    pub fn with_left_servo(&mut self, calib: ServoCalibration) -> &mut Self {
        self.left_servo = calib;
        self
    }

    pub fn with_right_servo(&mut self, calib: ServoCalibration) -> &mut Self {
        self.right_servo = calib;
        self
    }
}

/// The geometric configuration of a plot clock: its linkage and the
/// calibration of its two arm servos.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub arms: ArmGeometry,
    pub left_servo: ServoCalibration,
    pub right_servo: ServoCalibration,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let arms = &self.arms;
        for (name, len) in [("L1", arms.l1), ("L2", arms.l2), ("L3", arms.l3)] {
            if !(len.get() > 0.0) {
                return Err(ConfigError::NonPositiveLength {
                    name,
                    value: len.get(),
                });
            }
        }
        if arms.l3.get() >= arms.l2.get() {
            return Err(ConfigError::CouplingTooLong {
                l2: arms.l2.get(),
                l3: arms.l3.get(),
            });
        }
        for (side, calib) in [("left", self.left_servo), ("right", self.right_servo)] {
            if calib.scale == 0.0 || !calib.scale.is_finite() {
                return Err(ConfigError::BadScale { side });
            }
        }
        if arms.left_origin == arms.right_origin {
            return Err(ConfigError::CoincidentOrigins);
        }
        Ok(())
    }

    pub fn is_reachable(&self, p: &Point) -> bool {
        self.point_to_joint_angles(p).is_ok()
    }

    /// Inverse kinematics: which servo angles put the pen at `p`?
    pub fn point_to_joint_angles(&self, p: &Point) -> Result<JointAngles, UnreachablePosition> {
        let arms = &self.arms;
        let (l1, l2, l3) = (arms.l1.get(), arms.l2.get(), arms.l3.get());
        let unreachable = UnreachablePosition::at(p);

        // The triangle between the left servo, the left elbow and the pen.
        let (c, a1) = polar(arms.left_origin, *p);
        let a2 = solve_joint_angle(l1, l2, c).ok_or(unreachable)?.get();
        let left = a2 + a1 - PI;

        // The same triangle gives us the direction of the forearm at the pen,
        // and hence the coupling point.
        let at_pen = solve_joint_angle(l2, l1, c).ok_or(unreachable)?.get();
        let coupling = *p + unit(a1 - at_pen + arms.coupling_angle.get() + PI) * l3;

        // The triangle between the right servo, the right elbow and the
        // coupling point.
        let (c, a1) = polar(arms.right_origin, coupling);
        let a2 = solve_joint_angle(l1, l2 - l3, c).ok_or(unreachable)?.get();

        Ok(JointAngles {
            left: Angle::radians(left),
            right: Angle::radians(a1 - a2),
        })
    }

    pub fn joint_angles_to_pulses(&self, angles: &JointAngles) -> ServoPulses {
        ServoPulses {
            left: self.left_servo.pulse(angles.left),
            right: self.right_servo.pulse(angles.right),
        }
    }

    pub fn pulses_to_joint_angles(&self, pulses: &ServoPulses) -> JointAngles {
        JointAngles {
            left: self.left_servo.angle(pulses.left),
            right: self.right_servo.angle(pulses.right),
        }
    }

    pub fn point_to_pulses(&self, p: &Point) -> Result<ServoPulses, UnreachablePosition> {
        Ok(self.joint_angles_to_pulses(&self.point_to_joint_angles(p)?))
    }

    /// Forward kinematics: where is the pen when the servos are at these angles?
    ///
    /// Returns `None` if the linkage can't be assembled at these angles.
    pub fn joint_angles_to_point(&self, angles: &JointAngles) -> Option<Point> {
        let arms = &self.arms;
        let (l1, l2, l3) = (arms.l1.get(), arms.l2.get(), arms.l3.get());

        let left_elbow = arms.left_origin + unit(angles.left.get() + PI) * l1;
        let right_elbow = arms.right_origin + unit(angles.right.get()) * l1;

        // The bent forearm is rigid, so the left elbow, the coupling point and
        // the pen form a fixed triangle.
        let elbow_to_coupling =
            sqrt(square(l2) + square(l3) - 2.0 * l2 * l3 * cos(arms.coupling_angle.get()));
        let bend = solve_joint_angle(l2, l3, elbow_to_coupling)?.get();

        // The coupling point is where the circles around the two elbows meet.
        // Of the two candidates, it's the one to the left of the line from the
        // left elbow to the right one.
        let (d, dir) = polar(left_elbow, right_elbow);
        let r_left = elbow_to_coupling;
        let r_right = l2 - l3;
        let along = (square(r_left) - square(r_right) + square(d)) / (2.0 * d);
        let across_sq = square(r_left) - square(along);
        if !(across_sq >= 0.0) {
            return None;
        }
        let coupling = left_elbow + unit(dir) * along + unit(dir + PI / 2.0) * sqrt(across_sq);

        let (_, to_coupling) = polar(left_elbow, coupling);
        Some(left_elbow + unit(to_coupling + bend) * l2)
    }

    pub fn pulses_to_point(&self, pulses: &ServoPulses) -> Option<Point> {
        self.joint_angles_to_point(&self.pulses_to_joint_angles(pulses))
    }
}
