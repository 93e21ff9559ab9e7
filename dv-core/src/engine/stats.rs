//! Rail usage histogram
//!
//! Time spent at each voltage is accumulated into fixed-width bins above the
//! rail minimum. Bin 0 collects time spent off; voltages beyond the histogram
//! range are squashed into the top bin.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::constants::stats::{range_mv, BIN_UV, TOP_BIN};

/// Per-rail time-at-voltage histogram
#[derive(Debug, Clone)]
pub struct RailStats {
    bin_uv: i32,
    time_at_mv: [Duration; TOP_BIN + 1],
    last_update: Instant,
    last_index: usize,
    /// Rail is powered down through in-band power management
    pub(crate) off: bool,
}

impl RailStats {
    pub fn new(bin_uv: i32) -> Self {
        Self {
            bin_uv: if bin_uv > 0 { bin_uv } else { BIN_UV },
            time_at_mv: [Duration::ZERO; TOP_BIN + 1],
            last_update: Instant::now(),
            last_index: 0,
            off: false,
        }
    }

    pub fn bin_uv(&self) -> i32 {
        self.bin_uv
    }

    fn bin_for(&self, min_millivolts: i32, millivolts: i32) -> usize {
        let above = i64::from(millivolts - min_millivolts) * 1000;
        let bin = i64::from(self.bin_uv);
        let index = 1 + (2 * above + bin) / (2 * bin);
        (index as usize).min(TOP_BIN)
    }

    /// Start accounting at `millivolts`
    pub fn init(&mut self, rail: &str, min_millivolts: i32, max_millivolts: i32, millivolts: i32, now: Instant) {
        self.last_update = now;
        if millivolts >= min_millivolts {
            self.last_index = self.bin_for(min_millivolts, millivolts);
        }

        let ceiling = min_millivolts + range_mv(self.bin_uv);
        if max_millivolts > ceiling {
            warn!("{}: stats above {} mV will be squashed", rail, ceiling);
        }
    }

    /// Charge elapsed time to the current bin without moving it
    pub fn accumulate(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update);
        self.time_at_mv[self.last_index] += elapsed;
        self.last_update = now;
    }

    /// Charge elapsed time, then move to the bin for `millivolts`
    pub fn record(&mut self, min_millivolts: i32, millivolts: i32, now: Instant) {
        self.accumulate(now);

        if self.off {
            return;
        }

        if millivolts >= min_millivolts {
            self.last_index = self.bin_for(min_millivolts, millivolts);
        } else if millivolts == 0 {
            self.last_index = 0;
        }
    }

    /// Mark the rail powered off (bin 0) or back on at `millivolts`
    pub fn set_off(&mut self, off: bool, min_millivolts: i32, millivolts: i32, now: Instant) {
        self.accumulate(now);
        self.off = off;
        if off {
            self.last_index = 0;
        } else if millivolts >= min_millivolts {
            self.last_index = self.bin_for(min_millivolts, millivolts);
        }
    }

    /// Non-empty bins as `(bin voltage in mV, time)`, bin 0 always first
    pub fn bins(&self, min_millivolts: i32) -> Vec<(i32, Duration)> {
        let mut bins = vec![(0, self.time_at_mv[0])];
        for (i, time) in self.time_at_mv.iter().enumerate().skip(1) {
            if time.is_zero() {
                continue;
            }
            bins.push((min_millivolts + (i as i32 - 1) * self.bin_uv / 1000, *time));
        }
        bins
    }

    pub fn current_bin(&self) -> usize {
        self.last_index
    }
}
