//! Commands for the three servos of a plot clock.
//!
//! The motion planner is the only thing that writes to the servos, and
//! everything it writes is one of these.

#![no_std]

use plotclock_geom::ServoPulses;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmd {
    /// Set the pulse width of the lift servo, in microseconds.
    ///
    /// Larger values lower the pen.
    Lift(i32),
    /// Set the pulse widths of both arm servos at once.
    Joints(ServoPulses),
    /// Stop driving all three servos, letting them go limp until the next
    /// command.
    Release,
}

impl Cmd {
    pub fn lift(&self) -> Option<i32> {
        match self {
            Cmd::Lift(h) => Some(*h),
            _ => None,
        }
    }

    pub fn joints(&self) -> Option<ServoPulses> {
        match self {
            Cmd::Joints(p) => Some(*p),
            _ => None,
        }
    }
}
