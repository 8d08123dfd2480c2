use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;
use serde::Deserialize;

/// Random pause in `[min_secs, min_secs + add_secs]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PauseRange {
    pub min_secs: f64,
    pub add_secs: f64,
}

impl PauseRange {
    pub const NONE: PauseRange = PauseRange {
        min_secs: 0.0,
        add_secs: 0.0,
    };

    pub const fn new(min_secs: f64, add_secs: f64) -> Self {
        PauseRange { min_secs, add_secs }
    }

    pub fn is_zero(&self) -> bool {
        self.min_secs <= 0.0 && self.add_secs <= 0.0
    }

    pub fn sample(&self) -> Duration {
        if self.is_zero() {
            return Duration::ZERO;
        }
        let min = self.min_secs.max(0.0);
        let max = min + self.add_secs.max(0.0);
        let mut rng = rand::thread_rng();
        Duration::from_secs_f64(rng.gen_range(min..=max))
    }

    pub fn pause(&self) {
        let delay = self.sample();
        if delay.is_zero() {
            return;
        }
        info!("Waiting for {:.1} seconds...", delay.as_secs_f64());
        thread::sleep(delay);
    }
}
