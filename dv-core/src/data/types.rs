//! Core data types for rail and clock descriptions
//!
//! These are the static, per-hardware-variant descriptions handed to the
//! registry at init time. Voltages are in millivolts, rates in Hz.

use serde::{Deserialize, Serialize};

/// One band of a thermal floor or cap table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThermalLimit {
    /// Upper temperature of the band in °C
    pub temperature: i32,
    pub millivolts: i32,
}

impl ThermalLimit {
    pub const fn new(temperature: i32, millivolts: i32) -> Self {
        Self { temperature, millivolts }
    }
}

/// Which thermal table an index or query refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThermalKind {
    Floor,
    Cap,
}

impl ThermalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThermalKind::Floor => "floors",
            ThermalKind::Cap => "caps",
        }
    }
}

/// Static description of a voltage rail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailSpec {
    /// Regulator supply name, also the rail identity
    pub name: String,
    pub nominal_millivolts: i32,
    /// 0 means "take it from the regulator's supported range on connect"
    #[serde(default)]
    pub min_millivolts: i32,
    pub max_millivolts: i32,
    /// Level used when the rail is disabled; 0 selects nominal
    #[serde(default)]
    pub disable_millivolts: i32,
    /// Level used while suspended; 0 selects nominal
    #[serde(default)]
    pub suspend_millivolts: i32,
    /// Unconditional override applied on top of clock demand
    #[serde(default)]
    pub override_millivolts: i32,
    /// Largest downward step; 0 defaults to max_millivolts
    #[serde(default)]
    pub step: i32,
    /// Largest upward step; 0 defaults to step
    #[serde(default)]
    pub step_up: i32,
    /// Rail may be switched straight to and from 0 mV
    #[serde(default)]
    pub jmp_to_zero: bool,
    /// Rail power is switched explicitly, dvfs never turns it off
    #[serde(default)]
    pub in_band_pm: bool,
    /// Histogram bin width; 0 selects the default
    #[serde(default)]
    pub stats_bin_uv: i32,
    #[serde(default)]
    pub therm_floors: Vec<ThermalLimit>,
    #[serde(default)]
    pub therm_caps: Vec<ThermalLimit>,
}

impl RailSpec {
    /// Minimal rail description; optional fields default to zero/empty
    pub fn new(name: impl Into<String>, min: i32, nominal: i32, max: i32) -> Self {
        Self {
            name: name.into(),
            nominal_millivolts: nominal,
            min_millivolts: min,
            max_millivolts: max,
            disable_millivolts: 0,
            suspend_millivolts: 0,
            override_millivolts: 0,
            step: 0,
            step_up: 0,
            jmp_to_zero: false,
            in_band_pm: false,
            stats_bin_uv: 0,
            therm_floors: Vec::new(),
            therm_caps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: i32) -> Self {
        self.step = step;
        self
    }

    pub fn with_step_up(mut self, step_up: i32) -> Self {
        self.step_up = step_up;
        self
    }

    pub fn with_levels(mut self, disable: i32, suspend: i32) -> Self {
        self.disable_millivolts = disable;
        self.suspend_millivolts = suspend;
        self
    }

    pub fn with_jmp_to_zero(mut self, allowed: bool) -> Self {
        self.jmp_to_zero = allowed;
        self
    }

    pub fn with_in_band_pm(mut self, in_band: bool) -> Self {
        self.in_band_pm = in_band;
        self
    }

    pub fn with_thermal(mut self, floors: Vec<ThermalLimit>, caps: Vec<ThermalLimit>) -> Self {
        self.therm_floors = floors;
        self.therm_caps = caps;
        self
    }
}

/// When a clock's voltage comes from the hardware-mode table
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HwModeRange {
    /// Never, unless the rail itself is in hardware-controlled mode
    #[default]
    None,
    /// For every rate
    AllRates,
    /// For rates at or above the binding's threshold rate
    HighRates,
}

impl HwModeRange {
    /// Map the numeric range selector used by clock drivers
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::None),
            1 => Some(Self::AllRates),
            2 => Some(Self::HighRates),
            _ => None,
        }
    }
}

/// Static description of a clock's frequency/voltage binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSpec {
    pub clock: String,
    pub rail: String,
    pub freqs: Vec<u64>,
    /// Multiplier applied to every frequency entry; 0 leaves them as-is
    #[serde(default)]
    pub freqs_mult: u64,
    /// Normal-mode voltages; the table ends at the first 0 entry
    pub millivolts: Vec<i32>,
    /// Voltages used while the rail is hardware-controlled
    #[serde(default)]
    pub hw_millivolts: Option<Vec<i32>>,
    #[serde(default)]
    pub alt_freqs: Option<Vec<u64>>,
    /// Highest voltage this clock may request; 0 means no cap
    #[serde(default)]
    pub max_millivolts: i32,
    #[serde(default)]
    pub hw_range: HwModeRange,
    /// Threshold rate for `HwModeRange::HighRates`
    #[serde(default)]
    pub hw_rate_min: u64,
}

impl ClockSpec {
    pub fn new(clock: impl Into<String>, rail: impl Into<String>, freqs: Vec<u64>, millivolts: Vec<i32>) -> Self {
        Self {
            clock: clock.into(),
            rail: rail.into(),
            freqs,
            freqs_mult: 0,
            millivolts,
            hw_millivolts: None,
            alt_freqs: None,
            max_millivolts: 0,
            hw_range: HwModeRange::None,
            hw_rate_min: 0,
        }
    }

    pub fn with_hw_table(mut self, millivolts: Vec<i32>, range: HwModeRange, rate_min: u64) -> Self {
        self.hw_millivolts = Some(millivolts);
        self.hw_range = range;
        self.hw_rate_min = rate_min;
        self
    }

    pub fn with_max_millivolts(mut self, cap: i32) -> Self {
        self.max_millivolts = cap;
        self
    }
}
