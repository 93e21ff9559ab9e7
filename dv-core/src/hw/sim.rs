//! Simulated regulator and clock services
//!
//! Stand-ins for the hardware so a board description can be exercised on a
//! workstation, and the backing store for the engine's unit tests. The
//! regulator keeps every write in a log and can be told to fail writes or
//! connects.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::{ClockProvider, RegulatorHandle, RegulatorService};
use crate::constants::units::UV_PER_MV;
use crate::error::{DvfsError, Result};

/// Output voltage reported by a supply that has no preset
pub const DEFAULT_BOOT_MILLIVOLTS: i32 = 1000;

#[derive(Debug, Clone)]
struct SimSupply {
    name: String,
    uv: i32,
    enabled: bool,
    range: Option<(i32, i32)>,
}

/// One regulator write as seen by the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoltageWrite {
    pub supply: String,
    pub millivolts: i32,
}

#[derive(Default)]
pub struct SimRegulator {
    supplies: Mutex<Vec<SimSupply>>,
    boot: Mutex<HashMap<String, (i32, Option<(i32, i32)>)>>,
    writes: Mutex<Vec<VoltageWrite>>,
    failing: Mutex<Vec<(String, i32)>>,
    missing: Mutex<Vec<String>>,
}

impl SimRegulator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Boot voltage and optional constraint range (mV) of a supply
    pub fn set_boot(&self, supply: &str, millivolts: i32, range: Option<(i32, i32)>) {
        self.boot.lock().insert(supply.to_string(), (millivolts, range));
    }

    /// Make every write of `millivolts` to `supply` fail
    pub fn fail_write(&self, supply: &str, millivolts: i32) {
        self.failing.lock().push((supply.to_string(), millivolts));
    }

    /// Make `connect` fail for `supply`
    pub fn remove_supply(&self, supply: &str) {
        self.missing.lock().push(supply.to_string());
    }

    pub fn writes(&self) -> Vec<VoltageWrite> {
        self.writes.lock().clone()
    }

    pub fn writes_for(&self, supply: &str) -> Vec<i32> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.supply == supply)
            .map(|w| w.millivolts)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Current output of a connected supply in mV
    pub fn output(&self, supply: &str) -> Option<i32> {
        self.supplies
            .lock()
            .iter()
            .find(|s| s.name == supply)
            .map(|s| s.uv / UV_PER_MV)
    }

    pub fn is_supply_enabled(&self, supply: &str) -> bool {
        self.supplies.lock().iter().any(|s| s.name == supply && s.enabled)
    }

    fn with_supply<R>(&self, handle: RegulatorHandle, f: impl FnOnce(&mut SimSupply) -> R) -> Result<R> {
        let mut supplies = self.supplies.lock();
        supplies
            .get_mut(handle.0 as usize)
            .map(f)
            .ok_or_else(|| DvfsError::regulator(format!("stale handle {}", handle.0)))
    }
}

impl RegulatorService for SimRegulator {
    fn connect(&self, supply: &str) -> Result<RegulatorHandle> {
        if self.missing.lock().iter().any(|s| s == supply) {
            return Err(DvfsError::RegulatorConnect {
                rail: supply.to_string(),
                reason: "supply not present".to_string(),
            });
        }
        let (mv, range) = self
            .boot
            .lock()
            .get(supply)
            .copied()
            .unwrap_or((DEFAULT_BOOT_MILLIVOLTS, None));

        let mut supplies = self.supplies.lock();
        if let Some(idx) = supplies.iter().position(|s| s.name == supply) {
            return Ok(RegulatorHandle(idx as u32));
        }
        supplies.push(SimSupply {
            name: supply.to_string(),
            uv: mv * UV_PER_MV,
            enabled: false,
            range: range.map(|(lo, hi)| (lo * UV_PER_MV, hi * UV_PER_MV)),
        });
        debug!("sim: connected {} at {} mV", supply, mv);
        Ok(RegulatorHandle(supplies.len() as u32 - 1))
    }

    fn set_voltage(&self, handle: RegulatorHandle, min_uv: i32, max_uv: i32) -> Result<()> {
        let failing = self.failing.lock().clone();
        let write = self.with_supply(handle, |s| {
            let mv = min_uv / UV_PER_MV;
            if failing.iter().any(|(name, f)| *name == s.name && *f == mv) {
                return Err(DvfsError::regulator(format!("{}: write of {} mV rejected", s.name, mv)));
            }
            if min_uv > max_uv {
                return Err(DvfsError::regulator(format!("{}: empty window {}..{} uV", s.name, min_uv, max_uv)));
            }
            s.uv = min_uv;
            Ok(VoltageWrite { supply: s.name.clone(), millivolts: mv })
        })??;
        self.writes.lock().push(write);
        Ok(())
    }

    fn get_voltage(&self, handle: RegulatorHandle) -> Result<i32> {
        self.with_supply(handle, |s| s.uv)
    }

    fn enable(&self, handle: RegulatorHandle) -> Result<()> {
        self.with_supply(handle, |s| s.enabled = true)
    }

    fn disable(&self, handle: RegulatorHandle) -> Result<()> {
        self.with_supply(handle, |s| s.enabled = false)
    }

    fn is_enabled(&self, handle: RegulatorHandle) -> bool {
        self.with_supply(handle, |s| s.enabled).unwrap_or(false)
    }

    fn supported_range(&self, handle: RegulatorHandle) -> Option<(i32, i32)> {
        self.with_supply(handle, |s| s.range).ok().flatten()
    }
}

#[derive(Debug, Clone, Copy)]
struct SimClock {
    rate: u64,
    active: bool,
}

/// Clock framework stand-in: a rate and an active flag per clock
#[derive(Default)]
pub struct SimClocks {
    clocks: Mutex<HashMap<String, SimClock>>,
}

impl SimClocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the boot rate; the clock becomes active
    pub fn set(&self, clock: &str, rate: u64) {
        self.clocks
            .lock()
            .insert(clock.to_string(), SimClock { rate, active: true });
    }

    /// Returns the previous rate
    pub fn set_rate(&self, clock: &str, rate: u64) -> u64 {
        let mut clocks = self.clocks.lock();
        let entry = clocks
            .entry(clock.to_string())
            .or_insert(SimClock { rate: 0, active: true });
        std::mem::replace(&mut entry.rate, rate)
    }

    pub fn set_active(&self, clock: &str, active: bool) {
        if let Some(c) = self.clocks.lock().get_mut(clock) {
            c.active = active;
        }
    }
}

impl ClockProvider for SimClocks {
    fn is_active(&self, clock: &str) -> bool {
        self.clocks.lock().get(clock).map(|c| c.active).unwrap_or(false)
    }

    fn rate(&self, clock: &str) -> u64 {
        self.clocks.lock().get(clock).map(|c| c.rate).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regulator_reports_boot_voltage() {
        let reg = SimRegulator::new();
        reg.set_boot("vdd-core", 900, Some((600, 1300)));
        let h = reg.connect("vdd-core").unwrap();
        assert_eq!(reg.get_voltage(h).unwrap(), 900_000);
        assert_eq!(reg.supported_range(h), Some((600_000, 1_300_000)));
        assert!(!reg.is_enabled(h));
    }

    #[test]
    fn test_regulator_logs_writes() {
        let reg = SimRegulator::new();
        let h = reg.connect("vdd-cpu").unwrap();
        reg.set_voltage(h, 850_000, 1_200_000).unwrap();
        reg.set_voltage(h, 900_000, 1_200_000).unwrap();
        assert_eq!(reg.writes_for("vdd-cpu"), vec![850, 900]);
        assert_eq!(reg.output("vdd-cpu"), Some(900));
    }

    #[test]
    fn test_regulator_injected_failure_keeps_output() {
        let reg = SimRegulator::new();
        reg.set_boot("vdd-cpu", 800, None);
        let h = reg.connect("vdd-cpu").unwrap();
        reg.fail_write("vdd-cpu", 900);
        assert!(reg.set_voltage(h, 900_000, 1_200_000).is_err());
        assert_eq!(reg.output("vdd-cpu"), Some(800));
        assert!(reg.writes().is_empty());
    }

    #[test]
    fn test_missing_supply_refuses_connect() {
        let reg = SimRegulator::new();
        reg.remove_supply("vdd-gpu");
        assert!(matches!(reg.connect("vdd-gpu"), Err(DvfsError::RegulatorConnect { .. })));
    }

    #[test]
    fn test_clocks_track_rate_and_activity() {
        let clocks = SimClocks::new();
        clocks.set("sclk", 102_000_000);
        assert_eq!(clocks.set_rate("sclk", 204_000_000), 102_000_000);
        assert_eq!(clocks.rate("sclk"), 204_000_000);
        clocks.set_active("sclk", false);
        assert!(!clocks.is_active("sclk"));
        assert!(!clocks.is_active("unknown"));
    }
}
