//! Debug dumps and status snapshots
//!
//! Text renderings of the rail tree, the frequency/voltage tables and the
//! usage histograms, plus a serializable status snapshot. All of them are
//! advisory: they read the registry under the caller's lock and never change
//! any voltage.

use std::fmt::Write as _;
use std::time::Instant;

use serde::Serialize;

use crate::constants::units::HZ_PER_DECI_MHZ;
use crate::engine::{RailMode, Registry};
use crate::error::Result;

fn format_mhz(hz: u64) -> String {
    let f = hz / HZ_PER_DECI_MHZ;
    format!(" {:4}.{}", f / 10, f % 10)
}

/// Rail tree: voltage, mode, relationship ranges, thermal limits and clocks
pub fn dump_tree(registry: &Registry) -> String {
    let mut out = String::new();
    out.push_str("   clock           rate       mV\n");
    out.push_str("-------------------------------------\n");

    for rail in registry.rails() {
        let mode = match rail.mode() {
            RailMode::HardwareControlled => " hw mode",
            RailMode::Disabled => " disabled",
            _ => "",
        };
        let millivolts = if rail.stats.off { 0 } else { rail.millivolts };
        let _ = writeln!(out, "{} {} mV{}:", rail.name, millivolts, mode);

        // Range of the relationship: to-rail off vs. to-rail as it is now
        let to = rail.snapshot();
        let mut to_off = to;
        to_off.millivolts = 0;
        to_off.new_millivolts = 0;
        for rel in &rail.relationships_from {
            let edge = &registry.relationships()[rel.0];
            let from_rail = &registry.rails()[edge.from().0];
            let from = from_rail.snapshot();
            let _ = writeln!(
                out,
                "   {:<10} {:<7} mV {:<4} mV .. {:<4} mV",
                from_rail.name,
                from_rail.millivolts,
                edge.solve(&from, &to_off),
                edge.solve(&from, &to)
            );
        }

        let _ = writeln!(out, "   nominal    {:<7} mV", rail.nominal_millivolts);
        let _ = writeln!(out, "   therm_floor    {:<7} mV", rail.thermal.floor().unwrap_or(0));
        let _ = writeln!(out, "   therm_cap    {:<7} mV", rail.thermal.cap().unwrap_or(0));

        let mut clocks: Vec<_> = rail.clocks.iter().map(|c| &registry.bindings()[c.0]).collect();
        clocks.sort_by(|a, b| {
            b.cur_millivolts
                .cmp(&a.cur_millivolts)
                .then_with(|| a.clock.cmp(&b.clock))
        });
        for d in clocks {
            let _ = writeln!(out, "   {:<15} {:<10} {:<4} mV", d.clock, d.cur_rate, d.cur_millivolts);
        }
    }
    out
}

/// Frequency/voltage tables in mV and MHz
///
/// A voltage row is printed once for consecutive clocks sharing it.
pub fn dump_table(registry: &Registry) -> String {
    let mut out = String::from("DVFS tables: units mV/MHz\n");
    let mut last_mv: Option<&[i32]> = None;
    let mut last_hw: Option<&[i32]> = None;

    for rail in registry.rails() {
        for c in &rail.clocks {
            let d = &registry.bindings()[c.0];
            let mut mv_done = false;

            if last_mv != Some(d.millivolts()) {
                out.push('\n');
                mv_done = true;
                last_mv = Some(d.millivolts());
                let _ = write!(out, "{:<16}", rail.name);
                for mv in d.millivolts() {
                    let _ = write!(out, "{:7}", mv);
                }
                out.push('\n');
            }

            if let Some(hw) = d.hw_millivolts() {
                if last_hw != Some(hw) {
                    if !mv_done {
                        out.push('\n');
                    }
                    last_hw = Some(hw);
                    let _ = write!(out, "{:<8} (hw)   ", rail.name);
                    for mv in hw {
                        let _ = write!(out, "{:7}", mv);
                    }
                    out.push('\n');
                }
            }

            let _ = write!(out, "{:<16}", d.clock);
            for &f in d.freqs() {
                out.push_str(&format_mhz(f));
            }
            if let Some(alt) = d.alt_freqs() {
                out.push('\n');
                let _ = write!(out, "{:<10} (alt)", d.clock);
                for &f in alt {
                    out.push_str(&format_mhz(f));
                }
            }
            out.push('\n');
        }
    }
    out
}

/// Time spent in each voltage bin, in milliseconds
///
/// Charges the time since the last transition to the current bin first.
pub fn dump_stats(registry: &mut Registry) -> String {
    let now = Instant::now();
    let mut out = format!("{:<12} {:<10}\n", "millivolts", "time");

    for rail in &mut registry.rails {
        let bin_uv = rail.stats.bin_uv();
        let _ = writeln!(out, "{} (bin: {}.{:02}mV)", rail.name, bin_uv / 1000, (bin_uv / 10) % 100);
        rail.stats.accumulate(now);
        for (mv, time) in rail.stats.bins(rail.min_millivolts) {
            let _ = writeln!(out, "{:<12} {:<10}", mv, time.as_millis());
        }
    }
    out
}

/// Current rate and voltage request of one clock
#[derive(Debug, Clone, Serialize)]
pub struct ClockStatus {
    pub clock: String,
    pub rate: u64,
    pub millivolts: i32,
}

/// State of one rail
#[derive(Debug, Clone, Serialize)]
pub struct RailStatus {
    pub name: String,
    pub mode: RailMode,
    pub millivolts: i32,
    pub nominal_millivolts: i32,
    pub min_millivolts: i32,
    pub max_millivolts: i32,
    pub therm_floor: Option<i32>,
    pub therm_cap: Option<i32>,
    pub clocks: Vec<ClockStatus>,
}

/// Snapshot of the whole registry
#[derive(Debug, Clone, Serialize)]
pub struct DvfsStatus {
    pub started: bool,
    pub rails: Vec<RailStatus>,
}

pub fn status(registry: &Registry) -> DvfsStatus {
    let rails = registry
        .rails()
        .iter()
        .map(|rail| RailStatus {
            name: rail.name.clone(),
            mode: rail.mode(),
            millivolts: rail.millivolts,
            nominal_millivolts: rail.nominal_millivolts,
            min_millivolts: rail.min_millivolts,
            max_millivolts: rail.max_millivolts,
            therm_floor: rail.thermal.floor(),
            therm_cap: rail.thermal.cap(),
            clocks: rail
                .clocks
                .iter()
                .map(|c| {
                    let d = &registry.bindings()[c.0];
                    ClockStatus {
                        clock: d.clock.clone(),
                        rate: d.cur_rate,
                        millivolts: d.cur_millivolts,
                    }
                })
                .collect(),
        })
        .collect();

    DvfsStatus {
        started: registry.is_started(),
        rails,
    }
}

/// Export a status snapshot as pretty JSON
pub fn status_to_json(status: &DvfsStatus) -> Result<String> {
    Ok(serde_json::to_string_pretty(status)?)
}
