/*
 * This file is part of socdvfs.
 *
 * Copyright (C) 2025 socdvfs contributors
 *
 * socdvfs is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * socdvfs is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with socdvfs. If not, see <https://www.gnu.org/licenses/>.
 */

//! Event scripts for the simulator
//!
//! A script is a JSON array of steps. Each step is delivered to the
//! controller the way the host kernel would deliver it; a failing step is
//! recorded and the replay carries on.

use std::fs;
use std::path::Path;

use dv_core::{
    ClockProvider, DvfsController, DvfsError, PmEvent, RateChange, Result, ShutdownKind, ThermalKind,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sim::SimClocks;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum ScriptStep {
    /// Full clock rate change: pre notification, rate switch, post notification
    ClockRate { clock: String, rate: u64 },
    /// Direct rate request on a binding, bypassing the clock framework
    SetRate { clock: String, rate: u64 },
    ClockActive { clock: String, active: bool },
    Thermal { rail: String, kind: ThermalKind, index: usize },
    AltFreqs { clock: String, enable: bool },
    HwRange { clock: String, range: i32 },
    HwModeSet { clock: String, rate: u64 },
    HwModeClear { clock: String, rate: u64 },
    DisableRail { rail: String },
    EnableRail { rail: String },
    PowerUp { rail: String },
    PowerDown { rail: String },
    Suspend,
    Resume,
    Shutdown,
}

impl ScriptStep {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptStep::ClockRate { .. } => "clock_rate",
            ScriptStep::SetRate { .. } => "set_rate",
            ScriptStep::ClockActive { .. } => "clock_active",
            ScriptStep::Thermal { .. } => "thermal",
            ScriptStep::AltFreqs { .. } => "alt_freqs",
            ScriptStep::HwRange { .. } => "hw_range",
            ScriptStep::HwModeSet { .. } => "hw_mode_set",
            ScriptStep::HwModeClear { .. } => "hw_mode_clear",
            ScriptStep::DisableRail { .. } => "disable_rail",
            ScriptStep::EnableRail { .. } => "enable_rail",
            ScriptStep::PowerUp { .. } => "power_up",
            ScriptStep::PowerDown { .. } => "power_down",
            ScriptStep::Suspend => "suspend",
            ScriptStep::Resume => "resume",
            ScriptStep::Shutdown => "shutdown",
        }
    }
}

/// Result of one replayed step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let data = fs::read_to_string(path).map_err(|source| DvfsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

/// Deliver a rate change through the notifier path
///
/// The clock moves only if the pre notification succeeds; a failed post
/// notification leaves the new rate in place.
fn clock_rate(dvfs: &DvfsController, clocks: &SimClocks, clock: &str, rate: u64) -> Result<()> {
    let old = clocks.rate(clock);
    dvfs.on_rate_change(clock, &RateChange::pre(old, rate))?;
    clocks.set_rate(clock, rate);
    dvfs.on_rate_change(clock, &RateChange::post(old, rate))
}

pub fn apply_step(dvfs: &DvfsController, clocks: &SimClocks, step: &ScriptStep) -> Result<()> {
    match step {
        ScriptStep::ClockRate { clock, rate } => clock_rate(dvfs, clocks, clock, *rate),
        ScriptStep::SetRate { clock, rate } => dvfs.set_rate(clock, *rate),
        ScriptStep::ClockActive { clock, active } => {
            clocks.set_active(clock, *active);
            Ok(())
        }
        ScriptStep::Thermal { rail, kind, index } => dvfs.update_thermal_index(rail, *kind, *index),
        ScriptStep::AltFreqs { clock, enable } => dvfs.use_alt_freqs(clock, *enable),
        ScriptStep::HwRange { clock, range } => dvfs.set_hw_range(clock, *range),
        ScriptStep::HwModeSet { clock, rate } => dvfs.hw_mode_set(clock, *rate),
        ScriptStep::HwModeClear { clock, rate } => dvfs.hw_mode_clear(clock, *rate),
        ScriptStep::DisableRail { rail } => dvfs.disable_rail(rail),
        ScriptStep::EnableRail { rail } => dvfs.enable_rail(rail),
        ScriptStep::PowerUp { rail } => dvfs.power_up(rail),
        ScriptStep::PowerDown { rail } => dvfs.power_down(rail),
        ScriptStep::Suspend => dvfs.on_pm_event(PmEvent::SuspendPrepare),
        ScriptStep::Resume => dvfs.on_pm_event(PmEvent::PostSuspend),
        ScriptStep::Shutdown => {
            dvfs.on_shutdown(ShutdownKind::PowerOff);
            Ok(())
        }
    }
}

pub fn run_script(dvfs: &DvfsController, clocks: &SimClocks, steps: &[ScriptStep]) -> Vec<StepOutcome> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let error = match apply_step(dvfs, clocks, step) {
            Ok(()) => None,
            Err(e) => {
                warn!("step {} ({}) failed: {}", index, step.name(), e);
                Some(e.to_string())
            }
        };
        outcomes.push(StepOutcome { index, op: step.name(), error });
    }
    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    info!("replayed {} steps, {} failed", steps.len(), failed);
    outcomes
}
