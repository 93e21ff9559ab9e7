//! Data types and validation modules
//!
//! Contains the static rail/clock descriptions and their validation.

mod types;
mod validation;

pub use types::{ClockSpec, HwModeRange, RailSpec, ThermalKind, ThermalLimit};
pub use validation::{
    cleanup_freq_table, thermal_limits_size, validate_parallel_table, validate_rail_spec,
};
