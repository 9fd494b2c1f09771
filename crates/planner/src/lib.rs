//! The motion core of the plot clock.
//!
//! Everything here is expressed in terms of a [`Plotter`], which owns the
//! servos, the pacing delay and the only mutable state in the system: where
//! the pen is, and how high it's lifted. Glyphs and maintenance routines are
//! sequences of plotter operations, and the [`clock::ClockCycle`] decides
//! when to run them.
//!
//! Nothing here runs concurrently. Every waypoint and every lift step is
//! sent to the servos and then followed by a blocking delay, so that the
//! servos have time to get there before the next command.

use embedded_hal::delay::DelayNs;
use kurbo::Point;
use plotclock_geom::{ConfigError, FromKurbo as _, UnreachablePosition};
use plotclock_protocol::Cmd;
use serde::{Deserialize, Serialize};

pub mod clock;
pub mod glyph;
pub mod lift;
pub mod path;
pub mod sweep;

pub use clock::{
    ClockCycle, ClockLayout, ClockTime, CycleOutcome, CycleStep, GlyphPlacement, ParseTimeError,
    TimeSource, TimeSourceUnavailable,
};
pub use glyph::{Glyph, GlyphLibrary, GlyphOp, GlyphProgram, Placement};
pub use lift::{LiftLevel, LiftProfile};
pub use path::{ArcDirection, ArcSpec, Segment};
pub use sweep::SweepStation;

/// Somewhere to send servo commands.
pub trait Servos {
    fn send(&mut self, cmd: Cmd);
}

impl Servos for Vec<Cmd> {
    fn send(&mut self, cmd: Cmd) {
        self.push(cmd);
    }
}

impl<S: Servos + ?Sized> Servos for &mut S {
    fn send(&mut self, cmd: Cmd) {
        (**self).send(cmd);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error(transparent)]
    Unreachable(#[from] UnreachablePosition),
    #[error(transparent)]
    TimeSourceUnavailable(#[from] TimeSourceUnavailable),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no glyph for {0:?}")]
    UnknownGlyph(Glyph),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// How long to wait after sending each waypoint to the arm servos.
    ///
    /// Together with the waypoint density, this sets the drawing speed.
    pub waypoint_delay_us: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            waypoint_delay_us: 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterConfig {
    pub geom: plotclock_geom::Config,
    pub lift: LiftProfile,
    pub pacing: Pacing,
}

impl PlotterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geom.validate()
    }
}

/// The last commanded pen position and lift height.
///
/// We have no feedback from the servos, so this is our only idea of
/// where the pen is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotterState {
    pub position: Point,
    pub lift: i32,
}

pub struct Plotter<S, D> {
    config: PlotterConfig,
    state: PlotterState,
    servos: S,
    delay: D,
}

impl<S: Servos, D: DelayNs> Plotter<S, D> {
    /// Creates a plotter, assuming that the servos are already in the position
    /// described by `start`.
    pub fn new(config: PlotterConfig, start: PlotterState, servos: S, delay: D) -> Self {
        Plotter {
            config,
            state: start,
            servos,
            delay,
        }
    }

    pub fn config(&self) -> &PlotterConfig {
        &self.config
    }

    pub fn state(&self) -> PlotterState {
        self.state
    }

    pub fn servos(&self) -> &S {
        &self.servos
    }

    pub fn servos_mut(&mut self) -> &mut S {
        &mut self.servos
    }

    pub fn into_servos(self) -> S {
        self.servos
    }

    pub fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Moves the pen in a straight line to `target`, at whatever height it
    /// currently has.
    ///
    /// Every waypoint is solved before anything is sent to the servos, so
    /// if any of them is unreachable then the pen doesn't move at all.
    pub fn draw_to(&mut self, target: Point) -> Result<(), UnreachablePosition> {
        let geom = &self.config.geom;
        let waypoints = Segment::new(self.state.position, target)
            .waypoints()
            .map(|p| {
                geom.point_to_pulses(&plotclock_geom::Point::from_kurbo(p))
                    .map(|pulses| (p, pulses))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (p, pulses) in waypoints {
            self.servos.send(Cmd::Joints(pulses));
            self.state.position = p;
            self.delay.delay_us(self.config.pacing.waypoint_delay_us);
        }
        self.state.position = target;
        Ok(())
    }

    /// Traces an arc, as a sequence of straight lines.
    ///
    /// If part of the arc is unreachable, we stop there. The part before it
    /// has already been drawn.
    pub fn trace_arc(&mut self, arc: &ArcSpec) -> Result<(), UnreachablePosition> {
        for p in arc.points() {
            self.draw_to(p)?;
        }
        Ok(())
    }

    /// Stops driving the servos until the next command.
    pub fn release(&mut self) {
        self.servos.send(Cmd::Release);
    }

    fn set_lift(&mut self, height: i32) {
        self.servos.send(Cmd::Lift(height));
        self.state.lift = height;
        self.delay.delay_ms(self.config.lift.step_delay_ms);
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn draw_to_emits_every_waypoint() {
        let mut plotter = plotter();
        let target = Point::new(59.5, 42.0);
        plotter.draw_to(target).unwrap();

        let cmds = plotter.servos();
        // 10mm at 4 waypoints per mm, plus the starting point.
        assert_eq!(cmds.len(), 41);
        assert!(cmds.iter().all(|c| matches!(c, Cmd::Joints(_))));
        assert_eq!(plotter.state().position, target);

        let geom = &plotter.config().geom;
        let first = geom.pulses_to_point(&joints(cmds)[0]).unwrap();
        let last = geom.pulses_to_point(&joints(cmds)[40]).unwrap();
        assert!((first.x - 69.5).abs() < 0.15 && (first.y - 42.0).abs() < 0.15);
        assert!((last.x - 59.5).abs() < 0.15 && (last.y - 42.0).abs() < 0.15);
    }

    #[test]
    fn draw_to_paces_waypoints() {
        let mut plotter = plotter();
        plotter.draw_to(Point::new(69.5, 41.0)).unwrap();
        // 5 waypoints, 1ms each.
        assert_eq!(plotter.delay.total_ns, 5_000_000);
    }

    #[test]
    fn draw_to_zero_length() {
        let mut plotter = plotter();
        plotter.draw_to(station()).unwrap();
        let cmds = plotter.servos();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], cmds[1]);
    }

    #[test]
    fn unreachable_segment_is_not_drawn() {
        let mut plotter = plotter();
        let before = plotter.state();
        let err = plotter.draw_to(Point::new(35.0, 200.0)).unwrap_err();

        // The error is reported at the first unreachable waypoint, somewhere
        // along the way.
        assert!(err.y > 42.0 && err.y <= 200.0);
        assert!(plotter.servos().is_empty());
        assert_eq!(plotter.state(), before);
    }

    #[test]
    fn arc_stops_at_unreachable_point() {
        let mut plotter = plotter();
        // A big circle around the station, which leaves the workspace.
        let arc = ArcSpec {
            center: station(),
            radius: 80.0,
            start: 0.0,
            end: std::f64::consts::TAU,
            direction: ArcDirection::CounterClockwise,
            squeeze: 1.0,
        };
        assert!(plotter.trace_arc(&arc).is_err());
        // The pen is somewhere sensible, not at the failed point.
        let pos = plotter.state().position;
        assert!(plotter.config().geom.is_reachable(&plotclock_geom::Point::from_kurbo(pos)));
    }

    #[test]
    fn release() {
        let mut plotter = plotter();
        plotter.release();
        assert_eq!(plotter.into_servos(), vec![Cmd::Release]);
    }
}
