use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use embedded_hal::delay::DelayNs;
use kurbo::Point;
use log::LevelFilter;
use plotclock_planner::{ClockCycle, ClockTime, CycleOutcome, Plotter, PlotterState, Servos};

use crate::{config::PlotClockConfig, sim::SimulatedServos, time::Sleep};

mod config;
mod sim;
mod time;

/// With the arms at these two points, the servo horns should be 90 degrees
/// apart, parallel to the axes.
const CALIBRATION_POINTS: [(f64, f64); 2] = [(-3.0, 29.2), (74.1, 28.0)];
const CALIBRATION_PAUSE_MS: u32 = 500;

#[derive(Parser)]
struct Args {
    /// A JSON file describing the clock. Anything not in it gets the default.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to draw a picture of everything the pen drew.
    #[arg(long)]
    svg: Option<PathBuf>,
    /// Where to save all the servo commands that were sent.
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Don't wait for the servos to move.
    #[arg(long)]
    fast: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keep the clock showing the local time.
    Run,
    /// Draw one particular time, and then stop.
    Draw {
        #[arg(long)]
        time: ClockTime,
    },
    /// Swing the arms back and forth between the calibration points.
    Calibrate {
        /// How many times to do it; zero means forever.
        #[arg(long, default_value_t = 1)]
        cycles: u32,
    },
}

fn calibrate<S: Servos, D: DelayNs>(
    plotter: &mut Plotter<S, D>,
    cycles: u32,
) -> anyhow::Result<()> {
    let mut done = 0;
    while cycles == 0 || done < cycles {
        for (x, y) in CALIBRATION_POINTS {
            plotter.draw_to(Point::new(x, y))?;
            plotter.pause_ms(CALIBRATION_PAUSE_MS);
        }
        done += 1;
    }
    Ok(())
}

fn drive(
    cmd: &Command,
    config: &PlotClockConfig,
    plotter: &mut Plotter<SimulatedServos, Sleep>,
) -> anyhow::Result<()> {
    let mut cycle = ClockCycle::new(config.layout, config.station);
    match cmd {
        Command::Run => {
            let err = match cycle.run(plotter, &mut time::SystemClock) {
                Ok(never) => match never {},
                Err(e) => e,
            };
            Err(anyhow::Error::from(err).context("the clock stopped"))
        }
        Command::Draw { time } => {
            cycle.start(plotter)?;
            match cycle.draw(plotter, *time)? {
                CycleOutcome::Drawn(t) => {
                    log::info!("drew {t}");
                    Ok(())
                }
                CycleOutcome::Aborted { time, error } => {
                    Err(anyhow::Error::from(error).context(format!("failed to draw {time}")))
                }
            }
        }
        Command::Calibrate { cycles } => calibrate(plotter, *cycles),
    }
}

fn save(servos: &SimulatedServos, args: &Args) -> anyhow::Result<()> {
    if let Some(path) = &args.svg {
        let out = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        servos.illustrate(BufWriter::new(out))?;
    }
    if let Some(path) = &args.trace {
        let out = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        servos.write_trace(BufWriter::new(out))?;
    }
    Ok(())
}

fn init_logging() {
    let mut logger = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => logger.parse_filters(&filters),
        Err(_) => logger.filter_module("plotclock", LevelFilter::Info),
    };
    logger.init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            log::info!("loading configuration from {}", path.display());
            PlotClockConfig::load(path)?
        }
        None => {
            log::info!("using the default configuration");
            PlotClockConfig::default()
        }
    };
    config.validate().context("invalid configuration")?;

    // There's no way to ask the servos where they are, so assume that we
    // were left hovering over the sweep station.
    let start = PlotterState {
        position: config.station.position,
        lift: config.plotter.lift.toward_station,
    };
    let servos = SimulatedServos::new(&config.plotter);
    let mut plotter = Plotter::new(config.plotter, start, servos, Sleep::new(args.fast));

    let result = drive(&args.cmd, &config, &mut plotter);
    save(plotter.servos(), &args)?;
    result
}
