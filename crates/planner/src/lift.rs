//! The pen lift.
//!
//! The lift servo is moved one microsecond of pulse width at a time, with a
//! pause after each, because jumping straight to the target makes the whole
//! mechanism bounce.

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::{Plotter, Servos};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiftLevel {
    /// The pen is touching the drawing surface.
    OnSurface,
    /// The pen is just clear of the surface, for moving between strokes.
    BetweenGlyphs,
    /// The pen is raised high enough to clear the rim of the sweep station.
    TowardStation,
    /// The pen is lowered into the sweep station.
    InStation,
}

/// Lift servo pulse widths (in microseconds) for each [`LiftLevel`].
///
/// Larger values are lower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftProfile {
    pub on_surface: i32,
    pub between_glyphs: i32,
    pub toward_station: i32,
    pub in_station: i32,
    /// How long to wait after each one-microsecond step. Larger is slower.
    pub step_delay_ms: u32,
}

impl Default for LiftProfile {
    fn default() -> Self {
        LiftProfile {
            on_surface: 1800,
            between_glyphs: 1600,
            toward_station: 1350,
            in_station: 1740,
            step_delay_ms: 2,
        }
    }
}

impl LiftProfile {
    pub fn height(&self, level: LiftLevel) -> i32 {
        match level {
            LiftLevel::OnSurface => self.on_surface,
            LiftLevel::BetweenGlyphs => self.between_glyphs,
            LiftLevel::TowardStation => self.toward_station,
            LiftLevel::InStation => self.in_station,
        }
    }
}

/// The heights that the lift passes through on its way from `from` to `to`,
/// not including `from` but including `to`.
pub fn lift_steps(from: i32, to: i32) -> LiftSteps {
    LiftSteps {
        current: from,
        target: to,
    }
}

#[derive(Clone, Debug)]
pub struct LiftSteps {
    current: i32,
    target: i32,
}

impl Iterator for LiftSteps {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.current == self.target {
            return None;
        }
        self.current += (self.target - self.current).signum();
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.current.abs_diff(self.target) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LiftSteps {}

impl<S: Servos, D: DelayNs> Plotter<S, D> {
    /// Steps the lift servo to `height`, one microsecond at a time.
    pub fn lift_to(&mut self, height: i32) {
        for h in lift_steps(self.state.lift, height) {
            self.set_lift(h);
        }
    }

    pub fn lift_to_level(&mut self, level: LiftLevel) {
        self.lift_to(self.config.lift.height(level));
    }

    pub fn is_pen_down(&self) -> bool {
        self.state.lift == self.config.lift.on_surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use plotclock_protocol::Cmd;
    use proptest::prelude::*;

    #[test]
    fn lower_by_200() {
        let steps: Vec<_> = lift_steps(1800, 1600).collect();
        assert_eq!(steps.len(), 200);
        assert_eq!(steps[0], 1799);
        assert_eq!(*steps.last().unwrap(), 1600);
        assert!(steps.windows(2).all(|w| w[1] == w[0] - 1));
    }

    #[test]
    fn raise_by_200() {
        let steps: Vec<_> = lift_steps(1600, 1800).collect();
        assert_eq!(steps.len(), 200);
        assert_eq!(*steps.last().unwrap(), 1800);
        assert!(steps.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn already_there() {
        assert_eq!(lift_steps(1600, 1600).count(), 0);
    }

    #[test]
    fn plotter_lift() {
        let mut plotter = plotter();
        plotter.lift_to(1600);
        plotter.servos_mut().clear();
        plotter.lift_to(1800);

        assert_eq!(plotter.state().lift, 1800);
        assert!(plotter.is_pen_down());
        let cmds = plotter.servos();
        assert_eq!(cmds.len(), 200);
        assert_eq!(cmds.first(), Some(&Cmd::Lift(1601)));
        assert_eq!(cmds.last(), Some(&Cmd::Lift(1800)));
    }

    #[test]
    fn lift_is_paced() {
        let mut plotter = plotter();
        let start = plotter.state().lift;
        plotter.lift_to(start + 10);
        // 2ms per step.
        assert_eq!(plotter.delay.total_ns, 20_000_000);
    }

    #[test]
    fn levels() {
        let mut plotter = plotter();
        plotter.lift_to_level(LiftLevel::InStation);
        assert_eq!(plotter.state().lift, 1740);
        plotter.lift_to_level(LiftLevel::BetweenGlyphs);
        assert_eq!(plotter.state().lift, 1600);
        assert!(!plotter.is_pen_down());
    }

    proptest! {
        #[test]
        fn monotonic(from in 1000..2000i32, to in 1000..2000i32) {
            let steps: Vec<_> = lift_steps(from, to).collect();
            prop_assert_eq!(steps.len() as u32, from.abs_diff(to));
            if from != to {
                prop_assert_eq!(*steps.last().unwrap(), to);
            }
            let mut prev = from;
            for h in steps {
                prop_assert_eq!(h.abs_diff(prev), 1);
                prop_assert_eq!(h.abs_diff(to) + 1, prev.abs_diff(to));
                prev = h;
            }
        }
    }
}
