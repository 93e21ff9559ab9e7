//! Voltage rails
//!
//! A rail is a regulated power domain shared by one or more clocks. Rails are
//! stored in the registry arena and referenced by [`RailId`]; relationship
//! edges and clock bindings are index vectors into the registry.

use serde::Serialize;

use crate::data::RailSpec;
use crate::hw::RegulatorHandle;

use super::binding::ClockId;
use super::relationship::{RailSnapshot, RelationshipId};
use super::stats::RailStats;
use super::thermal::ThermalLimits;

/// Stable handle of a registered rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RailId(pub(crate) usize);

impl RailId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Externally visible rail state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RailMode {
    /// No regulator handle yet
    Unconnected,
    Active,
    Disabled,
    Suspended,
    /// Voltage follows a closed-loop hardware controller
    HardwareControlled,
}

/// A voltage rail and its solver state
#[derive(Debug)]
pub struct Rail {
    pub(crate) name: String,
    pub(crate) nominal_millivolts: i32,
    pub(crate) min_millivolts: i32,
    pub(crate) max_millivolts: i32,
    pub(crate) disable_millivolts: i32,
    pub(crate) suspend_millivolts: i32,
    pub(crate) override_millivolts: i32,
    pub(crate) step: i32,
    pub(crate) step_up: i32,

    /// Voltage currently on the regulator
    pub(crate) millivolts: i32,
    /// Voltage about to be written, equal to `millivolts` when idle
    pub(crate) new_millivolts: i32,

    /// Edges to rails that depend on this rail
    pub(crate) relationships_to: Vec<RelationshipId>,
    /// Edges to rails this rail depends on
    pub(crate) relationships_from: Vec<RelationshipId>,
    pub(crate) clocks: Vec<ClockId>,

    pub(crate) thermal: ThermalLimits,

    pub(crate) jmp_to_zero: bool,
    pub(crate) in_band_pm: bool,
    pub(crate) hw_mode: bool,
    pub(crate) disabled: bool,
    pub(crate) suspended: bool,
    /// Set while this rail is stepping; nested updates of it are no-ops
    pub(crate) resolving_to: bool,
    pub(crate) is_ready: bool,

    pub(crate) regulator: Option<RegulatorHandle>,
    pub(crate) stats: RailStats,
}

impl Rail {
    /// Build a rail from its description
    ///
    /// Disable and suspend levels are clamped to nominal, the rail starts at
    /// nominal, and missing step sizes default to a single full-range step.
    pub fn from_spec(spec: &RailSpec) -> Self {
        let nominal = spec.nominal_millivolts;
        let step = if spec.step > 0 { spec.step } else { spec.max_millivolts };
        let step_up = if spec.step_up > 0 { spec.step_up } else { step };

        Self {
            name: spec.name.clone(),
            nominal_millivolts: nominal,
            min_millivolts: spec.min_millivolts,
            max_millivolts: spec.max_millivolts,
            disable_millivolts: spec.disable_millivolts.min(nominal),
            suspend_millivolts: spec.suspend_millivolts.min(nominal),
            override_millivolts: spec.override_millivolts,
            step,
            step_up,
            millivolts: nominal,
            new_millivolts: nominal,
            relationships_to: Vec::new(),
            relationships_from: Vec::new(),
            clocks: Vec::new(),
            thermal: ThermalLimits::new(spec.therm_floors.clone(), spec.therm_caps.clone()),
            jmp_to_zero: spec.jmp_to_zero,
            in_band_pm: spec.in_band_pm,
            hw_mode: false,
            disabled: false,
            suspended: false,
            resolving_to: false,
            is_ready: false,
            regulator: None,
            stats: RailStats::new(spec.stats_bin_uv),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn millivolts(&self) -> i32 {
        self.millivolts
    }

    pub fn new_millivolts(&self) -> i32 {
        self.new_millivolts
    }

    pub fn nominal_millivolts(&self) -> i32 {
        self.nominal_millivolts
    }

    pub fn min_millivolts(&self) -> i32 {
        self.min_millivolts
    }

    pub fn max_millivolts(&self) -> i32 {
        self.max_millivolts
    }

    pub fn thermal(&self) -> &ThermalLimits {
        &self.thermal
    }

    pub fn stats(&self) -> &RailStats {
        &self.stats
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn clocks(&self) -> &[ClockId] {
        &self.clocks
    }

    pub fn mode(&self) -> RailMode {
        if self.regulator.is_none() {
            RailMode::Unconnected
        } else if self.hw_mode {
            RailMode::HardwareControlled
        } else if self.disabled {
            RailMode::Disabled
        } else if self.suspended {
            RailMode::Suspended
        } else {
            RailMode::Active
        }
    }

    pub fn disable_level(&self) -> i32 {
        if self.disable_millivolts != 0 {
            self.disable_millivolts
        } else {
            self.nominal_millivolts
        }
    }

    pub fn suspend_level(&self) -> i32 {
        if self.suspend_millivolts != 0 {
            self.suspend_millivolts
        } else {
            self.nominal_millivolts
        }
    }

    /// Effective `(min, max)` after thermal floor and cap
    pub fn limits(&self) -> (i32, i32) {
        let min = self.thermal.floor().unwrap_or(self.min_millivolts);
        let max = self.thermal.cap().unwrap_or(self.max_millivolts);
        (min, max)
    }

    /// Clamp into the effective limits
    ///
    /// If a floor sits above a cap the floor wins: running hot is recoverable,
    /// running under-volted is not.
    pub fn clamp(&self, millivolts: i32) -> i32 {
        let (min, max) = self.limits();
        millivolts.min(max).max(min)
    }

    /// Apply the override voltage, then clamp
    pub fn apply_limits(&self, millivolts: i32) -> i32 {
        let millivolts = if self.override_millivolts != 0 {
            self.override_millivolts
        } else {
            millivolts
        };
        self.clamp(millivolts)
    }

    pub fn snapshot(&self) -> RailSnapshot {
        RailSnapshot {
            millivolts: self.millivolts,
            new_millivolts: self.new_millivolts,
            min_millivolts: self.min_millivolts,
            max_millivolts: self.max_millivolts,
            nominal_millivolts: self.nominal_millivolts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ThermalLimit;

    #[test]
    fn test_from_spec_defaults() {
        let rail = Rail::from_spec(&RailSpec::new("vdd-core", 600, 1000, 1200).with_levels(1100, 1050));
        assert_eq!(rail.step, 1200);
        assert_eq!(rail.step_up, 1200);
        assert_eq!(rail.millivolts, 1000);
        // Clamped to nominal
        assert_eq!(rail.disable_millivolts, 1000);
        assert_eq!(rail.suspend_millivolts, 1000);
        assert_eq!(rail.mode(), RailMode::Unconnected);
    }

    #[test]
    fn test_step_up_defaults_to_step() {
        let rail = Rail::from_spec(&RailSpec::new("vdd-core", 600, 1000, 1200).with_step(25));
        assert_eq!(rail.step_up, 25);
    }

    #[test]
    fn test_levels_fall_back_to_nominal() {
        let rail = Rail::from_spec(&RailSpec::new("vdd-core", 600, 1000, 1200).with_levels(0, 900));
        assert_eq!(rail.disable_level(), 1000);
        assert_eq!(rail.suspend_level(), 900);
    }

    #[test]
    fn test_apply_limits_clamps_to_floor() {
        let spec = RailSpec::new("vdd-core", 600, 1000, 1200)
            .with_thermal(vec![ThermalLimit::new(25, 750)], Vec::new());
        let mut rail = Rail::from_spec(&spec);
        rail.thermal.init("vdd-core", 600, 1000);
        assert_eq!(rail.apply_limits(700), 750);
        assert_eq!(rail.apply_limits(1500), 1200);
    }

    #[test]
    fn test_override_replaces_demand() {
        let mut spec = RailSpec::new("vdd-core", 600, 1000, 1200);
        spec.override_millivolts = 1050;
        let rail = Rail::from_spec(&spec);
        assert_eq!(rail.apply_limits(800), 1050);
    }
}
