use std::io::Write;

use plotclock_geom::Point;
use plotclock_planner::{PlotterConfig, Servos};
use plotclock_protocol::Cmd;
use svg::{
    node::element::{path::Data, Circle, Path},
    Document,
};

// The drawing surface, in mm.
const WIDTH: f64 = 80.0;
const HEIGHT: f64 = 50.0;

/// A pretend servo bus, which keeps track of where the pen goes.
pub struct SimulatedServos {
    config: PlotterConfig,
    lift: i32,
    pen: Option<Point>,
    /// Pen-down polylines. The last one is still being drawn if the pen is
    /// down.
    strokes: Vec<Vec<Point>>,
    drawing: bool,
    cmds: Vec<Cmd>,
}

impl SimulatedServos {
    pub fn new(config: &PlotterConfig) -> Self {
        SimulatedServos {
            config: *config,
            lift: config.lift.toward_station,
            pen: None,
            strokes: Vec::new(),
            drawing: false,
            cmds: Vec::new(),
        }
    }

    fn pen_down(&self) -> bool {
        self.lift >= self.config.lift.on_surface
    }

    pub fn cmds(&self) -> &[Cmd] {
        &self.cmds
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    pub fn write_trace(&self, mut out: impl Write) -> anyhow::Result<()> {
        out.write_all(&postcard::to_allocvec(&self.cmds)?)?;
        Ok(())
    }

    pub fn illustrate(&self, mut out: impl Write) -> anyhow::Result<()> {
        // Multiply all dimensions by 10 because firefox doesn't like to see small svgs.
        // The svg's y axis points down, and ours points up.
        let cvt = |p: &Point| (p.x * 10.0, (HEIGHT - p.y) * 10.0);

        let (w, h) = (WIDTH * 10.0, HEIGHT * 10.0);
        let border = Data::new()
            .move_to((0.0, 0.0))
            .line_to((w, 0.0))
            .line_to((w, h))
            .line_to((0.0, h))
            .close();
        let mut document = Document::new().set("viewBox", (0.0, 0.0, w, h)).add(
            Path::new()
                .set("fill", "none")
                .set("stroke", "lightgray")
                .set("d", border),
        );

        for stroke in &self.strokes {
            let Some((first, rest)) = stroke.split_first() else {
                continue;
            };
            let mut data = Data::new().move_to(cvt(first));
            for p in rest {
                data = data.line_to(cvt(p));
            }
            document = document.add(
                Path::new()
                    .set("fill", "none")
                    .set("stroke", "black")
                    .set("stroke-width", 3)
                    .set("stroke-linecap", "round")
                    .set("d", data),
            );
        }

        if let Some(pen) = &self.pen {
            let (cx, cy) = cvt(pen);
            document = document.add(
                Circle::new()
                    .set("cx", cx)
                    .set("cy", cy)
                    .set("r", 4.0)
                    .set("fill", "blue"),
            );
        }

        svg::write(&mut out, &document)?;
        Ok(())
    }
}

impl Servos for SimulatedServos {
    fn send(&mut self, cmd: Cmd) {
        self.cmds.push(cmd);
        match cmd {
            Cmd::Lift(h) => {
                self.lift = h;
                if !self.pen_down() {
                    self.drawing = false;
                }
            }
            Cmd::Joints(pulses) => {
                let Some(p) = self.config.geom.pulses_to_point(&pulses) else {
                    log::warn!("the arms can't be at {pulses:?}");
                    self.pen = None;
                    self.drawing = false;
                    return;
                };
                if self.pen_down() {
                    if !self.drawing {
                        self.strokes.push(self.pen.into_iter().collect());
                        self.drawing = true;
                    }
                    if let Some(stroke) = self.strokes.last_mut() {
                        stroke.push(p);
                    }
                }
                self.pen = Some(p);
            }
            Cmd::Release => {
                self.drawing = false;
            }
        }
    }
}
