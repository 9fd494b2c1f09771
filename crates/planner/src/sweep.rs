//! Parking the pen in the sweep station.
//!
//! Between drawings the pen rests in a sponge at the edge of the surface,
//! which also carries the wiper that the frame glyph drags across the
//! board. Lowering the pen into it pulls the arms down a little, so we
//! start above the station and walk the arms down as the lift descends.

use embedded_hal::delay::DelayNs;
use kurbo::Point;
use plotclock_geom::UnreachablePosition;
use serde::{Deserialize, Serialize};

use crate::{lift::lift_steps, LiftLevel, Plotter, Servos};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepStation {
    pub position: Point,
    /// How far (in mm) the arms get pulled down while the pen goes into the
    /// station.
    pub arm_compensation: f64,
    /// Correct the arm position once for this many lift steps.
    pub compensation_interval: u32,
}

impl Default for SweepStation {
    fn default() -> Self {
        SweepStation {
            position: Point::new(69.5, 42.0),
            arm_compensation: 9.0,
            compensation_interval: 50,
        }
    }
}

impl<S: Servos, D: DelayNs> Plotter<S, D> {
    /// Puts the pen into the sweep station.
    pub fn park(&mut self, station: &SweepStation) -> Result<(), UnreachablePosition> {
        log::debug!("parking at {:?}", station.position);
        self.lift_to_level(LiftLevel::TowardStation);
        self.draw_to(station.position)?;

        let toward = self.config.lift.toward_station;
        let inside = self.config.lift.in_station;
        let ratio = if inside == toward {
            0.0
        } else {
            station.arm_compensation / (inside - toward) as f64
        };
        let interval = station.compensation_interval.max(1) as usize;

        for (i, h) in lift_steps(self.state.lift, inside).enumerate() {
            self.set_lift(h);
            if (i + 1) % interval == 0 {
                let y = station.position.y + station.arm_compensation
                    - (h - toward) as f64 * ratio;
                self.draw_to(Point::new(station.position.x, y))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use plotclock_protocol::Cmd;

    #[test]
    fn park_from_the_surface() {
        let station = SweepStation::default();
        let mut plotter = plotter();
        plotter.lift_to_level(LiftLevel::BetweenGlyphs);
        plotter.draw_to(Point::new(40.0, 30.0)).unwrap();
        plotter.servos_mut().clear();

        plotter.park(&station).unwrap();
        assert_eq!(plotter.state().lift, 1740);

        let cmds = plotter.servos();
        // Up first, then over to the station, then down.
        assert_eq!(cmds[0], Cmd::Lift(1599));
        let up = cmds.iter().position(|c| *c == Cmd::Lift(1350)).unwrap();
        let first_joint = cmds.iter().position(|c| c.joints().is_some()).unwrap();
        assert!(up < first_joint);
        let first_down = first_joint
            + cmds[first_joint..]
                .iter()
                .position(|c| *c == Cmd::Lift(1351))
                .unwrap();

        // 390 steps into the station, with a correction every 50.
        let lifts_in = cmds[first_down..].iter().filter(|c| c.lift().is_some()).count();
        assert_eq!(lifts_in, 390);
    }

    #[test]
    fn compensation_walks_down() {
        let station = SweepStation::default();
        let mut plotter = plotter();
        plotter.park(&station).unwrap();

        // Follow the corrections, and check that each one is lower than the
        // last and that they all sit on the station's vertical line.
        let config = *plotter.config();
        let mut lift = 0;
        let mut last_target_y = f64::INFINITY;
        let mut corrections = 0;
        let cmds = plotter.servos();
        for (i, cmd) in cmds.iter().enumerate() {
            match cmd {
                Cmd::Lift(h) => lift = *h,
                Cmd::Joints(_) if i > 0 && cmds[i - 1].lift().is_some() => {
                    corrections += 1;
                    let y = station.position.y + 9.0 - (lift - 1350) as f64 * 9.0 / 390.0;
                    assert!(y < last_target_y);
                    last_target_y = y;
                }
                _ => {}
            }
        }
        assert_eq!(corrections, 7);

        let p = config
            .geom
            .pulses_to_point(&joints(cmds).last().copied().unwrap())
            .unwrap();
        // After the last correction (at step 350) we're 40 steps from the
        // bottom, which is just under a millimeter above the station.
        let expected = station.position.y + 9.0 - 350.0 * 9.0 / 390.0;
        assert!((p.x - 69.5).abs() < 0.15);
        assert!((p.y - expected).abs() < 0.15);
    }

    #[test]
    fn park_twice_is_quiet() {
        let station = SweepStation::default();
        let mut plotter = plotter();
        plotter.park(&station).unwrap();
        plotter.servos_mut().clear();
        plotter.park(&station).unwrap();

        // We go back up to clear the rim and come down again.
        assert_eq!(plotter.state().lift, 1740);
        let lifts = plotter
            .servos()
            .iter()
            .filter(|c| c.lift().is_some())
            .count();
        assert_eq!(lifts, 2 * 390);
    }

    #[test]
    fn unreachable_station() {
        let station = SweepStation {
            position: Point::new(35.0, 200.0),
            ..SweepStation::default()
        };
        let mut plotter = plotter();
        assert!(plotter.park(&station).is_err());
        assert_eq!(plotter.state().lift, 1350);
    }
}
