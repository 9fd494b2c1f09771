use std::time::Duration;

use chrono::{Local, Timelike as _};
use embedded_hal::delay::DelayNs;
use plotclock_planner::{ClockTime, TimeSource, TimeSourceUnavailable};

/// The local time, according to the operating system.
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&mut self) -> Result<ClockTime, TimeSourceUnavailable> {
        let now = Local::now();
        ClockTime::new(now.hour() as u8, now.minute() as u8).ok_or_else(|| TimeSourceUnavailable {
            reason: format!("nonsense local time {now}"),
        })
    }
}

/// Waits for the servos by sleeping the thread, unless we're in a hurry.
pub struct Sleep {
    fast: bool,
}

impl Sleep {
    pub fn new(fast: bool) -> Self {
        Sleep { fast }
    }
}

impl DelayNs for Sleep {
    fn delay_ns(&mut self, ns: u32) {
        if !self.fast {
            std::thread::sleep(Duration::from_nanos(ns.into()));
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        if !self.fast {
            std::thread::sleep(Duration::from_millis(ms.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock() {
        let t = SystemClock.now().unwrap();
        assert!(t.hour() < 24 && t.minute() < 60);
    }
}
