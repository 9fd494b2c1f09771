//! Deciding what to draw, and when.
//!
//! Once a minute the clock wipes the board and writes the new time. A cycle
//! goes like this: take the pen out of the sweep station, drag the wiper
//! over the surface, write `HH:MM` (without a leading zero on the hour),
//! put the pen back and let the servos go limp until the next minute.

use std::{convert::Infallible, fmt, str::FromStr};

use embedded_hal::delay::DelayNs;
use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::{Glyph, GlyphLibrary, PlotError, Plotter, Servos, SweepStation};

/// How long to let the pen settle into the station before releasing the
/// servos.
pub const RELEASE_SETTLE_MS: u32 = 1000;

/// A time of day, to the minute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<ClockTime> {
        (hour < 24 && minute < 60).then_some(ClockTime { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn hour_tens(&self) -> u8 {
        self.hour / 10
    }

    pub fn hour_units(&self) -> u8 {
        self.hour % 10
    }

    pub fn minute_tens(&self) -> u8 {
        self.minute / 10
    }

    pub fn minute_units(&self) -> u8 {
        self.minute % 10
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a time like \"07:05\", got {0:?}")]
pub struct ParseTimeError(String);

impl FromStr for ClockTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeError(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let hour = h.parse().map_err(|_| err())?;
        let minute = m.parse().map_err(|_| err())?;
        ClockTime::new(hour, minute).ok_or_else(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("time source unavailable: {reason}")]
pub struct TimeSourceUnavailable {
    pub reason: String,
}

/// Somewhere to find out what time it is.
pub trait TimeSource {
    fn now(&mut self) -> Result<ClockTime, TimeSourceUnavailable>;
}

impl<F: FnMut() -> Result<ClockTime, TimeSourceUnavailable>> TimeSource for F {
    fn now(&mut self) -> Result<ClockTime, TimeSourceUnavailable> {
        self()
    }
}

/// A stopped clock.
impl TimeSource for ClockTime {
    fn now(&mut self) -> Result<ClockTime, TimeSourceUnavailable> {
        Ok(*self)
    }
}

/// Where to put a glyph: the position of its origin, and its size relative
/// to the 20mm-tall font.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlyphPlacement {
    pub baseline: Point,
    pub scale: f64,
}

impl GlyphPlacement {
    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        GlyphPlacement {
            baseline: Point::new(x, y),
            scale,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockLayout {
    pub hour_tens: GlyphPlacement,
    pub hour_units: GlyphPlacement,
    pub colon: GlyphPlacement,
    pub minute_tens: GlyphPlacement,
    pub minute_units: GlyphPlacement,
    /// How often to check whether the minute has changed.
    pub poll_interval_ms: u32,
}

impl Default for ClockLayout {
    fn default() -> Self {
        ClockLayout {
            hour_tens: GlyphPlacement::new(12.0, 25.0, 0.9),
            hour_units: GlyphPlacement::new(26.0, 25.0, 0.9),
            colon: GlyphPlacement::new(34.0, 25.0, 0.9),
            minute_tens: GlyphPlacement::new(38.0, 23.5, 1.0),
            minute_units: GlyphPlacement::new(50.0, 23.5, 1.0),
            poll_interval_ms: 500,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CycleStep {
    Park,
    Glyph {
        glyph: Glyph,
        placement: GlyphPlacement,
    },
    Release,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Drawn(ClockTime),
    /// Some glyph couldn't be drawn. The pen was still parked afterwards.
    Aborted { time: ClockTime, error: PlotError },
}

pub struct ClockCycle {
    layout: ClockLayout,
    library: GlyphLibrary,
    station: SweepStation,
    last_minute: Option<u8>,
}

impl ClockCycle {
    pub fn new(layout: ClockLayout, station: SweepStation) -> Self {
        ClockCycle {
            layout,
            library: GlyphLibrary::new(&station),
            station,
            last_minute: None,
        }
    }

    pub fn layout(&self) -> &ClockLayout {
        &self.layout
    }

    /// The steps needed to draw `time`.
    pub fn plan(&self, time: ClockTime) -> Vec<CycleStep> {
        let l = &self.layout;
        let glyph = |glyph, placement| CycleStep::Glyph { glyph, placement };

        let mut steps = vec![
            CycleStep::Park,
            // The frame is absolute, so it doesn't matter where we put it.
            glyph(Glyph::Frame, GlyphPlacement::new(0.0, 0.0, 1.0)),
        ];
        if time.hour_tens() != 0 {
            steps.push(glyph(Glyph::Digit(time.hour_tens()), l.hour_tens));
        }
        steps.extend([
            glyph(Glyph::Digit(time.hour_units()), l.hour_units),
            glyph(Glyph::Colon, l.colon),
            glyph(Glyph::Digit(time.minute_tens()), l.minute_tens),
            glyph(Glyph::Digit(time.minute_units()), l.minute_units),
            CycleStep::Park,
            CycleStep::Release,
        ]);
        steps
    }

    /// Puts the pen away, in preparation for the first cycle.
    pub fn start<S: Servos, D: DelayNs>(
        &mut self,
        plotter: &mut Plotter<S, D>,
    ) -> Result<(), PlotError> {
        plotter.park(&self.station)?;
        Ok(())
    }

    /// Runs one complete cycle for `time`.
    ///
    /// If a glyph fails, the rest of the glyphs are skipped but the pen is
    /// still put away. Only a failure to park is returned as an error.
    pub fn draw<S: Servos, D: DelayNs>(
        &self,
        plotter: &mut Plotter<S, D>,
        time: ClockTime,
    ) -> Result<CycleOutcome, PlotError> {
        log::info!("drawing {time}");
        let mut failure = None;
        for step in self.plan(time) {
            match step {
                CycleStep::Park => plotter.park(&self.station)?,
                CycleStep::Glyph { glyph, placement } => {
                    if failure.is_some() {
                        continue;
                    }
                    let res = self.library.render(
                        plotter,
                        glyph,
                        placement.baseline,
                        placement.scale,
                    );
                    if let Err(e) = res {
                        log::error!("failed to draw {glyph:?} for {time}: {e}");
                        failure = Some(e);
                    }
                }
                CycleStep::Release => {
                    plotter.pause_ms(RELEASE_SETTLE_MS);
                    plotter.release();
                }
            }
        }

        Ok(match failure {
            Some(error) => CycleOutcome::Aborted { time, error },
            None => {
                log::info!("finished drawing {time}");
                CycleOutcome::Drawn(time)
            }
        })
    }

    /// Draws the time if the minute has changed since we last drew it.
    ///
    /// Returns `None` if there was nothing to do.
    pub fn poll<S: Servos, D: DelayNs, T: TimeSource>(
        &mut self,
        plotter: &mut Plotter<S, D>,
        time: &mut T,
    ) -> Result<Option<CycleOutcome>, PlotError> {
        let now = time.now()?;
        if self.last_minute == Some(now.minute()) {
            return Ok(None);
        }
        log::info!("the time is now {now}");
        // Remember the minute even if we fail, so that we don't retry until
        // the next one.
        self.last_minute = Some(now.minute());
        self.draw(plotter, now).map(Some)
    }

    /// Parks the pen and then keeps the clock up to date, forever.
    ///
    /// This only returns if the time source stops working or the pen can't
    /// be parked.
    pub fn run<S: Servos, D: DelayNs, T: TimeSource>(
        &mut self,
        plotter: &mut Plotter<S, D>,
        time: &mut T,
    ) -> Result<Infallible, PlotError> {
        // Don't touch the servos if we can't tell the time.
        let now = time.now()?;
        log::info!("starting at {now}");
        self.start(plotter)?;
        loop {
            self.poll(plotter, time)?;
            plotter.pause_ms(self.layout.poll_interval_ms);
        }
    }
}
