//! Clock-to-rail voltage bindings
//!
//! Each managed clock carries an ascending frequency table and a parallel
//! voltage table: `millivolts[i]` is the lowest safe voltage for any rate up
//! to `freqs[i]`. A rate change recomputes the clock's requested voltage and
//! re-runs the rail update engine for the owning rail.

use serde::Serialize;
use tracing::{error, warn};

use crate::data::{cleanup_freq_table, validate_parallel_table, ClockSpec, HwModeRange};
use crate::error::{DvfsError, Result};

use super::rail::RailId;
use super::registry::Registry;

/// Stable handle of a registered clock binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClockId(pub(crate) usize);

/// Frequency/voltage binding for one clock
#[derive(Debug, Clone)]
pub struct ClockDvfs {
    pub(crate) clock: String,
    pub(crate) rail: RailId,
    pub(crate) freqs: Vec<u64>,
    pub(crate) alt_freqs: Option<Vec<u64>>,
    pub(crate) use_alt_freqs: bool,
    pub(crate) millivolts: Vec<i32>,
    pub(crate) hw_millivolts: Option<Vec<i32>>,
    pub(crate) max_millivolts: i32,
    pub(crate) range: HwModeRange,
    pub(crate) hw_rate_min: u64,
    pub(crate) cur_rate: u64,
    pub(crate) cur_millivolts: i32,
}

impl ClockDvfs {
    /// Build a binding from its description, cleaning up the tables
    pub fn from_spec(spec: &ClockSpec, rail: RailId) -> Result<Self> {
        let (freqs, millivolts) =
            cleanup_freq_table(&spec.clock, &spec.freqs, &spec.millivolts, spec.freqs_mult)?;

        let hw_millivolts = spec
            .hw_millivolts
            .as_deref()
            .map(|mv| validate_parallel_table(&spec.clock, "hw_millivolts", mv, freqs.len()))
            .transpose()?;

        let alt_freqs = spec
            .alt_freqs
            .as_deref()
            .map(|alt| cleanup_freq_table(&spec.clock, alt, &millivolts, spec.freqs_mult).map(|(f, _)| f))
            .transpose()?;

        Ok(Self {
            clock: spec.clock.clone(),
            rail,
            freqs,
            alt_freqs,
            use_alt_freqs: false,
            millivolts,
            hw_millivolts,
            max_millivolts: spec.max_millivolts,
            range: spec.hw_range,
            hw_rate_min: spec.hw_rate_min,
            cur_rate: 0,
            cur_millivolts: 0,
        })
    }

    pub fn clock(&self) -> &str {
        &self.clock
    }

    pub fn rail(&self) -> RailId {
        self.rail
    }

    pub fn cur_rate(&self) -> u64 {
        self.cur_rate
    }

    pub fn cur_millivolts(&self) -> i32 {
        self.cur_millivolts
    }

    pub fn millivolts(&self) -> &[i32] {
        &self.millivolts
    }

    pub fn hw_millivolts(&self) -> Option<&[i32]> {
        self.hw_millivolts.as_deref()
    }

    pub fn freqs(&self) -> &[u64] {
        &self.freqs
    }

    pub fn alt_freqs(&self) -> Option<&[u64]> {
        self.alt_freqs.as_deref()
    }

    /// Frequency table currently in effect
    pub fn active_freqs(&self) -> &[u64] {
        match (&self.alt_freqs, self.use_alt_freqs) {
            (Some(alt), true) => alt,
            _ => &self.freqs,
        }
    }

    pub fn max_rate(&self) -> u64 {
        self.active_freqs().last().copied().unwrap_or(0)
    }

    /// Smallest table rate at or above `rate`, or the top rate
    pub fn round_rate(&self, rate: u64) -> u64 {
        let freqs = self.active_freqs();
        freqs
            .iter()
            .copied()
            .find(|&f| f >= rate)
            .unwrap_or_else(|| self.max_rate())
    }

    /// `rate` falls in the hardware-mode voltage range
    pub fn is_hw_range(&self, rate: u64) -> bool {
        match self.range {
            HwModeRange::AllRates => true,
            HwModeRange::HighRates => rate >= self.hw_rate_min,
            HwModeRange::None => false,
        }
    }

    /// Crossing from below the high-rate threshold into it
    fn is_hw_range_entry(&self, rate: u64, rail_hw_mode: bool) -> bool {
        self.cur_rate != 0
            && !rail_hw_mode
            && self.range == HwModeRange::HighRates
            && rate >= self.hw_rate_min
            && self.cur_rate < self.hw_rate_min
    }

    fn is_hw_scale(&self, rate: u64, rail_hw_mode: bool) -> bool {
        rail_hw_mode || self.is_hw_range_entry(rate, rail_hw_mode)
    }

    fn table(&self, hw: bool) -> Result<&[i32]> {
        if hw {
            self.hw_millivolts.as_deref().ok_or_else(|| DvfsError::MissingTable {
                clock: self.clock.clone(),
                table: "hardware-mode voltage",
            })
        } else {
            Ok(&self.millivolts)
        }
    }

    fn index_for(&self, rate: u64) -> Option<usize> {
        self.active_freqs().iter().position(|&f| rate <= f)
    }

    /// Work out the `(rate, millivolts)` this binding would request
    ///
    /// On entry to the high-rate hardware range the first step stops at the
    /// range bottom; the hardware controller completes the ramp.
    pub fn resolve(&self, rate: u64, rail_hw_mode: bool) -> Result<(u64, i32)> {
        let table = self.table(self.is_hw_scale(rate, rail_hw_mode))?;

        let rate = if self.is_hw_range_entry(rate, rail_hw_mode) {
            self.hw_rate_min
        } else {
            rate
        };

        let max = self.max_rate();
        if rate > max {
            warn!("rate {} too high for dvfs on {}", rate, self.clock);
            return Err(DvfsError::RateTooHigh {
                clock: self.clock.clone(),
                rate,
                max,
            });
        }

        if rate == 0 {
            return Ok((0, 0));
        }

        let i = self.index_for(rate).unwrap_or(table.len() - 1);
        let millivolts = table[i];
        if self.max_millivolts != 0 && millivolts > self.max_millivolts {
            warn!("voltage {} too high for dvfs on {}", millivolts, self.clock);
            return Err(DvfsError::VoltageAboveCap {
                clock: self.clock.clone(),
                millivolts,
                cap: self.max_millivolts,
            });
        }

        Ok((rate, millivolts))
    }

    /// Safe voltage for running at `rate`, without changing anything
    pub fn predict(&self, rate: u64) -> Result<i32> {
        if rate == 0 {
            return Ok(0);
        }
        let table = self.table(self.is_hw_range(rate))?;
        match self.index_for(rate) {
            Some(i) => Ok(table[i]),
            None => Err(DvfsError::RateTooHigh {
                clock: self.clock.clone(),
                rate,
                max: self.max_rate(),
            }),
        }
    }

    /// Seed the requested voltage from a clock that is already running
    ///
    /// Rates beyond the table fall back to the binding's voltage cap.
    pub(crate) fn seed(&mut self, rate: u64) {
        self.cur_rate = rate;
        self.cur_millivolts = match self.index_for(rate) {
            Some(i) => self.millivolts[i],
            None => self.max_millivolts,
        };
    }
}

impl Registry {
    /// Register a clock binding on its rail
    pub fn setup_dvfs(&mut self, spec: &ClockSpec) -> Result<ClockId> {
        let rail = self.rail_by_name(&spec.rail).ok_or_else(|| DvfsError::UnknownRail(spec.rail.clone()))?;
        if self.clock_by_name(&spec.clock).is_some() {
            return Err(DvfsError::invalid_config(
                format!("{}.clock", spec.clock),
                "clock already has a dvfs binding",
            ));
        }

        let binding = ClockDvfs::from_spec(spec, rail)?;
        let id = ClockId(self.clocks.len());
        self.clocks.push(binding);
        self.rails[rail.0].clocks.push(id);
        Ok(id)
    }

    /// Attach an alternate frequency table to an existing binding
    pub fn add_alt_freqs(&mut self, clock: ClockId, freqs: &[u64], freqs_mult: u64) -> Result<()> {
        let binding = self.binding_mut(clock)?;
        let (alt, _) = cleanup_freq_table(&binding.clock, freqs, &binding.millivolts, freqs_mult)?;
        binding.alt_freqs = Some(alt);
        Ok(())
    }

    /// Record a new clock rate and bring the rail in line with it
    pub fn set_rate(&mut self, clock: ClockId, rate: u64) -> Result<()> {
        let binding = self.binding(clock)?;
        let rail = binding.rail;
        let (rate, millivolts) = binding.resolve(rate, self.rails[rail.0].hw_mode)?;

        let binding = &mut self.clocks[clock.0];
        binding.cur_rate = rate;
        binding.cur_millivolts = millivolts;

        self.update_rail(rail).map_err(|e| {
            error!(
                "Failed to set regulator {} for clock {} to {} mV: {}",
                self.rails[rail.0].name, self.clocks[clock.0].clock, millivolts, e
            );
            e
        })
    }

    /// Switch between the normal and alternate frequency tables
    ///
    /// If the rail cannot follow, the previous table is restored.
    pub fn use_alt_freqs(&mut self, clock: ClockId, use_alt: bool) -> Result<()> {
        let binding = self.binding_mut(clock)?;
        if binding.alt_freqs.is_none() {
            return Err(DvfsError::NoAltFreqs(binding.clock.clone()));
        }
        if binding.use_alt_freqs == use_alt {
            return Ok(());
        }

        binding.use_alt_freqs = use_alt;
        let rate = binding.cur_rate;
        if let Err(e) = self.set_rate(clock, rate) {
            error!(
                "{}: {} alt dvfs failed: {}",
                self.clocks[clock.0].clock,
                if use_alt { "set" } else { "clear" },
                e
            );
            self.clocks[clock.0].use_alt_freqs = !use_alt;
            if let Err(e) = self.set_rate(clock, rate) {
                warn!("{}: restoring dvfs table failed: {}", self.clocks[clock.0].clock, e);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Select which rates use the hardware-mode voltage table
    pub fn set_hw_range(&mut self, clock: ClockId, range: i32) -> Result<()> {
        let binding = self.binding_mut(clock)?;
        if binding.hw_millivolts.is_none() {
            return Err(DvfsError::MissingTable {
                clock: binding.clock.clone(),
                table: "hardware-mode voltage",
            });
        }
        binding.range = HwModeRange::from_index(range).ok_or(DvfsError::InvalidRange(range))?;
        Ok(())
    }

    /// Threshold rate of the high-rate hardware range, if one is set
    pub fn hw_threshold(&self, clock: ClockId) -> Result<Option<u64>> {
        let binding = self.binding(clock)?;
        Ok((binding.hw_rate_min != 0).then_some(binding.hw_rate_min))
    }

    /// Hand the rail to the closed-loop hardware controller
    pub fn hw_mode_set(&mut self, clock: ClockId, rate: u64) -> Result<()> {
        let rail = self.binding(clock)?.rail;
        if self.rails[rail.0].hw_mode {
            return Ok(());
        }
        self.rails[rail.0].hw_mode = true;
        self.set_rate(clock, rate)
    }

    /// Take the rail back from the hardware controller
    ///
    /// The regulator output is re-read since the controller moved it, and a
    /// rail that was disabled meanwhile goes through the disable sequence.
    pub fn hw_mode_clear(&mut self, clock: ClockId, rate: u64) -> Result<()> {
        let rail = self.binding(clock)?.rail;
        if !self.rails[rail.0].hw_mode {
            return Ok(());
        }

        self.rails[rail.0].hw_mode = false;
        if let Some(handle) = self.rails[rail.0].regulator {
            let mv = crate::hw::get_millivolts(&*self.regulator, handle, &self.rails[rail.0].name)?;
            let r = &mut self.rails[rail.0];
            r.millivolts = mv;
            r.new_millivolts = mv;
        }

        if self.rails[rail.0].disabled {
            self.rails[rail.0].disabled = false;
            if let Err(e) = self.disable_rail(rail) {
                warn!("{}: re-disable after hardware mode failed: {}", self.rails[rail.0].name, e);
            }
        }

        self.set_rate(clock, rate)
    }
}
