//! The clock's font, and the interpreter that draws it.
//!
//! Each glyph is a short program of pen-up moves, lines and arcs. Digits
//! and the colon are written in font units (20 units tall at scale 1) and
//! placed on the surface by a baseline and a scale. The frame is special: it
//! wipes the whole drawing area starting and ending at the sweep station,
//! so its coordinates are absolute.

use embedded_hal::delay::DelayNs;
use kurbo::{Point, Vec2};
use plotclock_geom::UnreachablePosition;

use crate::{
    path::{ArcDirection, ArcSpec},
    LiftLevel, PlotError, Plotter, Servos, SweepStation,
};

/// Something that the clock knows how to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Glyph {
    Digit(u8),
    Colon,
    Frame,
}

impl Glyph {
    /// Looks up a glyph by its numeric code: `0` through `9` for digits,
    /// `11` for the colon and `111` for the frame.
    pub fn from_code(code: u32) -> Option<Glyph> {
        match code {
            0..=9 => Some(Glyph::Digit(code as u8)),
            11 => Some(Glyph::Colon),
            111 => Some(Glyph::Frame),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Glyph::Digit(d) => d as u32,
            Glyph::Colon => 11,
            Glyph::Frame => 111,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GlyphOp {
    /// Lift the pen to `lift`, and then travel to `to`.
    MoveTo { to: Point, lift: LiftLevel },
    /// Draw a line, with the pen down.
    LineTo(Point),
    /// Draw an arc, with the pen down.
    ArcTo(ArcSpec),
}

impl GlyphOp {
    fn placed(&self, baseline: Vec2, scale: f64) -> GlyphOp {
        let place = |p: Point| Point::ZERO + baseline + p.to_vec2() * scale;
        match *self {
            GlyphOp::MoveTo { to, lift } => GlyphOp::MoveTo {
                to: place(to),
                lift,
            },
            GlyphOp::LineTo(to) => GlyphOp::LineTo(place(to)),
            GlyphOp::ArcTo(arc) => GlyphOp::ArcTo(ArcSpec {
                center: place(arc.center),
                radius: arc.radius * scale,
                ..arc
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Coordinates are in font units, relative to a baseline.
    Anchored,
    /// Coordinates are already on the drawing surface.
    Absolute,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlyphProgram {
    pub ops: Vec<GlyphOp>,
    pub placement: Placement,
    /// The lift level to leave the pen at when the program is done.
    pub end_lift: LiftLevel,
}

impl GlyphProgram {
    /// Maps this program onto the drawing surface, with its font-unit origin
    /// at `baseline` and each font unit `scale` millimeters long.
    ///
    /// [`Placement::Absolute`] programs are returned unchanged.
    pub fn placed(&self, baseline: Point, scale: f64) -> GlyphProgram {
        match self.placement {
            Placement::Absolute => self.clone(),
            Placement::Anchored => GlyphProgram {
                ops: self
                    .ops
                    .iter()
                    .map(|op| op.placed(baseline.to_vec2(), scale))
                    .collect(),
                placement: Placement::Absolute,
                end_lift: self.end_lift,
            },
        }
    }
}

fn move_to(x: f64, y: f64) -> GlyphOp {
    GlyphOp::MoveTo {
        to: Point::new(x, y),
        lift: LiftLevel::BetweenGlyphs,
    }
}

fn line_to(x: f64, y: f64) -> GlyphOp {
    GlyphOp::LineTo(Point::new(x, y))
}

fn arc(
    direction: ArcDirection,
    (cx, cy): (f64, f64),
    radius: f64,
    start: f64,
    end: f64,
    squeeze: f64,
) -> GlyphOp {
    GlyphOp::ArcTo(ArcSpec {
        center: Point::new(cx, cy),
        radius,
        start,
        end,
        direction,
        squeeze,
    })
}

fn cw(center: (f64, f64), radius: f64, start: f64, end: f64) -> GlyphOp {
    arc(ArcDirection::Clockwise, center, radius, start, end, 1.0)
}

fn ccw(center: (f64, f64), radius: f64, start: f64, end: f64) -> GlyphOp {
    arc(ArcDirection::CounterClockwise, center, radius, start, end, 1.0)
}

fn anchored(ops: Vec<GlyphOp>) -> GlyphProgram {
    GlyphProgram {
        ops,
        placement: Placement::Anchored,
        end_lift: LiftLevel::BetweenGlyphs,
    }
}

fn digit(d: u8) -> GlyphProgram {
    anchored(match d {
        0 => vec![
            move_to(12.0, 6.0),
            arc(
                ArcDirection::CounterClockwise,
                (7.0, 10.0),
                10.0,
                -0.8,
                6.7,
                0.5,
            ),
        ],
        1 => vec![move_to(8.0, 20.0), line_to(8.0, 0.0)],
        2 => vec![
            move_to(2.0, 12.0),
            cw((8.0, 14.0), 6.0, 3.0, -0.8),
            line_to(1.0, 0.0),
            line_to(12.0, 0.0),
        ],
        3 => vec![
            move_to(2.0, 17.0),
            cw((5.0, 15.0), 5.0, 3.0, -2.0),
            cw((5.0, 5.0), 5.0, 1.57, -3.0),
        ],
        4 => vec![
            move_to(2.0, 20.0),
            line_to(2.0, 8.0),
            line_to(12.0, 8.0),
            line_to(12.0, 20.0),
            line_to(12.0, 0.0),
        ],
        5 => vec![
            move_to(2.0, 5.0),
            ccw((5.0, 6.0), 6.0, -2.5, 2.0),
            line_to(5.0, 20.0),
            line_to(12.0, 20.0),
        ],
        6 => vec![
            move_to(2.0, 10.0),
            cw((7.0, 6.0), 6.0, 2.0, -4.4),
            line_to(11.0, 20.0),
        ],
        7 => vec![move_to(2.0, 20.0), line_to(12.0, 20.0), line_to(2.0, 0.0)],
        8 => vec![
            move_to(5.0, 10.0),
            cw((5.0, 15.0), 5.0, 4.7, -1.6),
            ccw((5.0, 5.0), 5.0, -4.7, 2.0),
        ],
        _ => vec![
            move_to(9.0, 11.0),
            cw((7.0, 15.0), 5.0, 4.0, -0.5),
            line_to(5.0, 0.0),
        ],
    })
}

fn colon() -> GlyphProgram {
    // The dots are arcs whose start is already past their end, so each one
    // is a single point.
    anchored(vec![
        move_to(5.0, 15.0),
        ccw((5.0, 15.0), 0.1, 1.0, -1.0),
        move_to(5.0, 5.0),
        ccw((5.0, 5.0), 0.1, 1.0, -1.0),
    ])
}

fn frame(station: &SweepStation) -> GlyphProgram {
    let s = station.position;
    let grid = [
        (10.0, 45.0),
        (10.0, 40.0),
        (65.0, 40.0),
        (65.0, 45.0),
        (10.0, 40.0),
        (10.0, 35.0),
        (65.0, 35.0),
        (65.0, 30.0),
        (10.0, 40.0),
        (10.0, 35.0),
        (65.0, 35.0),
        (65.0, 30.0),
        (10.0, 30.0),
        (10.0, 25.0),
        (65.0, 25.0),
        (65.0, 20.0),
        (10.0, 20.0),
    ];

    let mut ops = vec![GlyphOp::MoveTo {
        to: Point::new(60.0, s.y),
        lift: LiftLevel::InStation,
    }];
    ops.extend(grid.iter().map(|&(x, y)| line_to(x, y)));
    ops.push(line_to(60.0, s.y));
    ops.push(line_to(s.x + 6.0, s.y));
    ops.push(line_to(s.x + 3.0, s.y));

    GlyphProgram {
        ops,
        placement: Placement::Absolute,
        end_lift: LiftLevel::TowardStation,
    }
}

/// All the glyphs the clock can draw.
#[derive(Clone, Debug)]
pub struct GlyphLibrary {
    digits: Vec<GlyphProgram>,
    colon: GlyphProgram,
    frame: GlyphProgram,
}

impl GlyphLibrary {
    /// Builds the library. The frame starts and finishes at the sweep
    /// station, so it depends on where that is.
    pub fn new(station: &SweepStation) -> Self {
        GlyphLibrary {
            digits: (0..10).map(digit).collect(),
            colon: colon(),
            frame: frame(station),
        }
    }

    pub fn get(&self, glyph: Glyph) -> Option<&GlyphProgram> {
        match glyph {
            Glyph::Digit(d) => self.digits.get(d as usize),
            Glyph::Colon => Some(&self.colon),
            Glyph::Frame => Some(&self.frame),
        }
    }

    pub fn render<S: Servos, D: DelayNs>(
        &self,
        plotter: &mut Plotter<S, D>,
        glyph: Glyph,
        baseline: Point,
        scale: f64,
    ) -> Result<(), PlotError> {
        let program = self.get(glyph).ok_or(PlotError::UnknownGlyph(glyph))?;
        log::debug!("drawing {glyph:?} at {baseline:?}, scale {scale}");
        plotter.render(program, baseline, scale)?;
        Ok(())
    }
}

impl<S: Servos, D: DelayNs> Plotter<S, D> {
    /// Runs a glyph program.
    ///
    /// The pen is lifted to the program's final level even if drawing fails
    /// partway through.
    pub fn render(
        &mut self,
        program: &GlyphProgram,
        baseline: Point,
        scale: f64,
    ) -> Result<(), UnreachablePosition> {
        let program = program.placed(baseline, scale);
        let ret = self.run_ops(&program.ops);
        if let Err(e) = &ret {
            log::warn!("glyph stopped early: {e}");
        }
        self.lift_to_level(program.end_lift);
        ret
    }

    fn run_ops(&mut self, ops: &[GlyphOp]) -> Result<(), UnreachablePosition> {
        for op in ops {
            match op {
                GlyphOp::MoveTo { to, lift } => {
                    self.lift_to_level(*lift);
                    self.draw_to(*to)?;
                }
                GlyphOp::LineTo(to) => {
                    self.lift_to_level(LiftLevel::OnSurface);
                    self.draw_to(*to)?;
                }
                GlyphOp::ArcTo(arc) => {
                    self.lift_to_level(LiftLevel::OnSurface);
                    self.trace_arc(arc)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use plotclock_geom::FromKurbo as _;
    use plotclock_protocol::Cmd;

    fn library() -> GlyphLibrary {
        GlyphLibrary::new(&SweepStation::default())
    }

    /// The positions of the pen for every arm command sent while the pen was
    /// on the surface.
    fn pen_down_points(plotter: &Plotter<Vec<Cmd>, NoDelay>, start_lift: i32) -> Vec<Point> {
        let config = plotter.config();
        let mut lift = start_lift;
        let mut ret = Vec::new();
        for cmd in plotter.servos() {
            match cmd {
                Cmd::Lift(h) => lift = *h,
                Cmd::Joints(pulses) if lift == config.lift.on_surface => {
                    let p = config.geom.pulses_to_point(pulses).unwrap();
                    ret.push(Point::new(p.x, p.y));
                }
                _ => {}
            }
        }
        ret
    }

    #[test]
    fn codes() {
        for code in [0, 5, 9, 11, 111] {
            assert_eq!(Glyph::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Glyph::from_code(10), None);
        assert_eq!(Glyph::from_code(12), None);
    }

    #[test]
    fn unknown_digit() {
        let mut plotter = plotter();
        let err = library()
            .render(&mut plotter, Glyph::Digit(12), Point::new(50.0, 23.5), 1.0)
            .unwrap_err();
        assert!(matches!(err, PlotError::UnknownGlyph(Glyph::Digit(12))));
        assert!(plotter.servos().is_empty());
    }

    #[test]
    fn placement() {
        let program = digit(0).placed(Point::new(10.0, 20.0), 0.5);
        assert_eq!(program.placement, Placement::Absolute);
        assert_eq!(
            program.ops[0],
            GlyphOp::MoveTo {
                to: Point::new(16.0, 23.0),
                lift: LiftLevel::BetweenGlyphs
            }
        );
        let GlyphOp::ArcTo(arc) = program.ops[1] else {
            panic!("expected an arc");
        };
        assert_eq!(arc.center, Point::new(13.5, 25.0));
        assert_eq!(arc.radius, 5.0);
        assert_eq!(arc.start, -0.8);
        assert_eq!(arc.end, 6.7);
        assert_eq!(arc.squeeze, 0.5);

        // The frame doesn't move.
        let frame = frame(&SweepStation::default());
        assert_eq!(frame.placed(Point::new(10.0, 3.0), 1.0), frame);
    }

    #[test]
    fn pen_discipline() {
        let lib = library();
        let baseline = Point::new(50.0, 23.5);
        for d in 0..10 {
            let mut plotter = plotter();
            let start_lift = plotter.state().lift;
            lib.render(&mut plotter, Glyph::Digit(d), baseline, 1.0)
                .unwrap();

            assert!(matches!(
                lib.get(Glyph::Digit(d)).unwrap().ops[0],
                GlyphOp::MoveTo { .. }
            ));

            let cmds = plotter.servos();
            // Every digit is drawn with the pen down, and finishes with it up.
            assert!(cmds.contains(&Cmd::Lift(1800)), "digit {d}");
            assert_eq!(cmds.last(), Some(&Cmd::Lift(1600)), "digit {d}");
            assert_eq!(plotter.state().lift, 1600);

            // Nothing gets drawn outside the digit's cell.
            let down = pen_down_points(&plotter, start_lift);
            assert!(!down.is_empty());
            for p in down {
                assert!(
                    p.x > 49.5 && p.x < 64.5 && p.y > 23.0 && p.y < 44.0,
                    "digit {d} drew at {p:?}"
                );
            }

            // The pen was lowered only after travelling to the start of the
            // stroke.
            let first_down = cmds.iter().position(|c| *c == Cmd::Lift(1800)).unwrap();
            assert!(cmds[..first_down]
                .iter()
                .any(|c| matches!(c, Cmd::Joints(_))));
        }
    }

    #[test]
    fn colon_is_two_dots() {
        let mut plotter = plotter();
        let start_lift = plotter.state().lift;
        library()
            .render(&mut plotter, Glyph::Colon, Point::new(34.0, 25.0), 0.9)
            .unwrap();

        let lowered = plotter
            .servos()
            .iter()
            .filter(|c| **c == Cmd::Lift(1800))
            .count();
        assert_eq!(lowered, 2);

        // Each dot is a tiny move from the travel point, with the pen down.
        let down = pen_down_points(&plotter, start_lift);
        let upper = Point::new(34.0 + 4.5, 25.0 + 13.5);
        let lower = Point::new(34.0 + 4.5, 25.0 + 4.5);
        assert!(down.iter().all(|p| p.distance(upper) < 0.3 || p.distance(lower) < 0.3));
        assert!(down.iter().any(|p| p.distance(upper) < 0.3));
        assert!(down.iter().any(|p| p.distance(lower) < 0.3));
    }

    #[test]
    fn frame_wipes_and_returns() {
        let station = SweepStation::default();
        let mut plotter = plotter();
        plotter.lift_to_level(LiftLevel::InStation);
        plotter.servos_mut().clear();

        library()
            .render(&mut plotter, Glyph::Frame, Point::new(10.0, 3.0), 1.0)
            .unwrap();

        let expected_end = Point::new(station.position.x + 3.0, station.position.y);
        assert_eq!(plotter.state().position, expected_end);
        assert_eq!(plotter.state().lift, plotter.config().lift.toward_station);

        // The travel out of the station happens at the station height.
        let cmds = plotter.servos();
        let first_lift = cmds.iter().position(|c| c.lift().is_some()).unwrap();
        assert!(first_lift > 0);
        assert_eq!(cmds[first_lift], Cmd::Lift(1741));
    }

    #[test]
    fn failure_still_lifts() {
        let mut plotter = plotter();
        // Far enough up that the digit is out of reach.
        let err = plotter
            .render(&digit(1), Point::new(30.0, 80.0), 1.0)
            .unwrap_err();
        let geom = plotter.config().geom;
        assert!(!geom.is_reachable(&plotclock_geom::Point::new(err.x, err.y)));
        assert_eq!(plotter.state().lift, 1600);
        assert!(geom.is_reachable(&plotclock_geom::Point::from_kurbo(plotter.state().position)));
    }
}
