//! Test helpers shared by the engine unit tests
//!
//! [`RecordingRegulator`] is the simulated regulator with a test-friendly
//! surface: presets carry a fixed constraint range and writes come back as
//! `(supply, millivolts)` pairs so tests can check the exact stepping
//! sequence.

use std::sync::Arc;

use crate::engine::Registry;
use crate::error::Result;
use crate::hw::{RegulatorHandle, RegulatorService, SimRegulator};

pub(crate) const MHZ: u64 = 1_000_000;

/// Constraint range reported by preset supplies, in mV
const RANGE_MV: (i32, i32) = (500, 1400);

#[derive(Default)]
pub(crate) struct RecordingRegulator {
    sim: SimRegulator,
}

impl RecordingRegulator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Output voltage a supply reports when first connected
    pub fn preset(&self, supply: &str, millivolts: i32) {
        self.sim.set_boot(supply, millivolts, Some(RANGE_MV));
    }

    /// Fail the write of `millivolts` to `supply`
    pub fn fail_at(&self, supply: &str, millivolts: i32) {
        self.sim.fail_write(supply, millivolts);
    }

    pub fn refuse_connect(&self, supply: &str) {
        self.sim.remove_supply(supply);
    }

    pub fn writes(&self) -> Vec<(String, i32)> {
        self.sim
            .writes()
            .into_iter()
            .map(|w| (w.supply, w.millivolts))
            .collect()
    }

    pub fn writes_for(&self, supply: &str) -> Vec<i32> {
        self.sim.writes_for(supply)
    }

    pub fn clear_writes(&self) {
        self.sim.clear_writes();
    }

    pub fn is_supply_enabled(&self, supply: &str) -> bool {
        self.sim.is_supply_enabled(supply)
    }
}

impl RegulatorService for RecordingRegulator {
    fn connect(&self, supply: &str) -> Result<RegulatorHandle> {
        self.sim.connect(supply)
    }

    fn set_voltage(&self, handle: RegulatorHandle, min_uv: i32, max_uv: i32) -> Result<()> {
        self.sim.set_voltage(handle, min_uv, max_uv)
    }

    fn get_voltage(&self, handle: RegulatorHandle) -> Result<i32> {
        self.sim.get_voltage(handle)
    }

    fn enable(&self, handle: RegulatorHandle) -> Result<()> {
        self.sim.enable(handle)
    }

    fn disable(&self, handle: RegulatorHandle) -> Result<()> {
        self.sim.disable(handle)
    }

    fn is_enabled(&self, handle: RegulatorHandle) -> bool {
        self.sim.is_enabled(handle)
    }

    fn supported_range(&self, handle: RegulatorHandle) -> Option<(i32, i32)> {
        self.sim.supported_range(handle)
    }
}

/// Connect every rail the way `start` does, without a clock provider
pub(crate) fn connect_all(registry: &mut Registry) {
    let ids: Vec<_> = registry.rail_ids().collect();
    for id in ids {
        if let Some(name) = registry.needs_connect(id) {
            let handle = registry.regulator.connect(&name).ok();
            registry.finish_connect(id, handle).unwrap();
        }
    }
    registry.mark_started();
}

mod tests {
    use super::*;

    #[test]
    fn test_recording_regulator_shares_simulator_behaviour() {
        let reg = RecordingRegulator::new();
        reg.preset("vdd-core", 900);
        let h = reg.connect("vdd-core").unwrap();
        assert_eq!(reg.connect("vdd-core").unwrap(), h);
        assert_eq!(reg.get_voltage(h).unwrap(), 900_000);
        assert_eq!(reg.supported_range(h), Some((500_000, 1_400_000)));

        reg.fail_at("vdd-core", 950);
        assert!(reg.set_voltage(h, 950_000, 1_200_000).is_err());
        reg.set_voltage(h, 1_000_000, 1_200_000).unwrap();
        assert_eq!(reg.writes(), vec![("vdd-core".to_string(), 1000)]);
    }
}
