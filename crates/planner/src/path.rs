//! Straight lines and arcs, broken up into points close enough together
//! that the pen moves smoothly between them.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// How many waypoints to put on each millimeter of a straight line.
pub const WAYPOINTS_PER_MM: f64 = 4.0;

/// The angle (in radians) between consecutive points on an arc.
pub const ARC_STEP: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub fn new(from: Point, to: Point) -> Self {
        Segment { from, to }
    }

    /// The number of steps between waypoints. There's always at least one,
    /// even if the segment has zero length.
    pub fn step_count(&self) -> usize {
        ((WAYPOINTS_PER_MM * self.from.distance(self.to)).floor() as usize).max(1)
    }

    /// Evenly spaced points along the segment, including both endpoints.
    ///
    /// The last point is exactly `to`.
    pub fn waypoints(&self) -> Waypoints {
        Waypoints {
            from: self.from,
            to: self.to,
            idx: 0,
            steps: self.step_count(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Waypoints {
    from: Point,
    to: Point,
    idx: usize,
    steps: usize,
}

impl Iterator for Waypoints {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.idx > self.steps {
            return None;
        }
        let p = if self.idx == self.steps {
            self.to
        } else {
            self.from.lerp(self.to, self.idx as f64 / self.steps as f64)
        };
        self.idx += 1;
        Some(p)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.idx);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Waypoints {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

impl ArcDirection {
    fn step(self) -> f64 {
        match self {
            ArcDirection::Clockwise => -ARC_STEP,
            ArcDirection::CounterClockwise => ARC_STEP,
        }
    }
}

/// A piece of an ellipse with horizontal and vertical axes.
///
/// The vertical radius is `radius`, and the horizontal one is
/// `squeeze * radius`. Angles are in radians, measured counter-clockwise
/// from the positive `x` axis, and can go outside `[0, 2π]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArcSpec {
    pub center: Point,
    pub radius: f64,
    pub start: f64,
    pub end: f64,
    pub direction: ArcDirection,
    pub squeeze: f64,
}

impl ArcSpec {
    pub fn point_at(&self, theta: f64) -> Point {
        self.center
            + Vec2::new(
                self.squeeze * self.radius * theta.cos(),
                self.radius * theta.sin(),
            )
    }

    /// Points along the arc, [`ARC_STEP`] radians apart.
    ///
    /// The first point is always at the start angle, even if the start angle
    /// is already past the end angle. After that, we keep going while we're
    /// before the end angle (for clockwise arcs) or not past it (for
    /// counter-clockwise arcs). So the last point can fall short of the end
    /// angle by up to one step, but it never overshoots.
    pub fn points(&self) -> ArcPoints {
        ArcPoints {
            arc: *self,
            offset: 0.0,
            done: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArcPoints {
    arc: ArcSpec,
    offset: f64,
    done: bool,
}

impl Iterator for ArcPoints {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.done {
            return None;
        }
        let arc = &self.arc;
        let p = arc.point_at(arc.start + self.offset);

        self.offset += arc.direction.step();
        let theta = arc.start + self.offset;
        self.done = match arc.direction {
            ArcDirection::Clockwise => theta <= arc.end,
            ArcDirection::CounterClockwise => theta > arc.end,
        };
        Some(p)
    }
}
