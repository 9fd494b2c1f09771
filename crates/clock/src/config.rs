use std::path::Path;

use anyhow::{bail, Context as _};
use plotclock_geom::FromKurbo as _;
use plotclock_planner::{ClockLayout, PlotterConfig, SweepStation};
use serde::{Deserialize, Serialize};

/// Everything there is to know about a particular clock.
///
/// When loaded from a file, anything that's missing takes its default value,
/// which is the reference machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotClockConfig {
    pub plotter: PlotterConfig,
    pub station: SweepStation,
    pub layout: ClockLayout,
}

impl PlotClockConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("bad config in {}", path.display()))
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.plotter.validate()?;

        let station = plotclock_geom::Point::from_kurbo(self.station.position);
        if !self.plotter.geom.is_reachable(&station) {
            bail!(
                "the sweep station at {:?} is out of reach",
                self.station.position
            );
        }
        let lift = &self.plotter.lift;
        if lift.in_station == lift.toward_station {
            bail!("the lift needs to move to get into the sweep station");
        }
        Ok(())
    }
}
