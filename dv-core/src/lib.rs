//! socdvfs core library
//!
//! Dynamic voltage and frequency scaling coordinator for the regulated power
//! rails of a SoC.
//!
//! # Features
//!
//! - **Rail update engine**: per-rail voltage from the highest clock demand,
//!   thermal floors/caps and rail-to-rail relationships, applied in bounded
//!   regulator steps
//! - **Relationships**: directed constraints between rails, solved to a
//!   fixpoint even when the graph has cycles
//! - **Clock bindings**: frequency/voltage tables with alternate and
//!   hardware-controlled variants
//! - **Power sequencing**: dependency-ordered suspend with rollback, disable
//!   that never lowers a rail, in-band power up/down
//! - **Debug dumps**: rail tree, tables, time-at-voltage histograms
//!
//! # Module Structure
//!
//! - `hw/` - Regulator and clock service interfaces, plus simulated services
//! - `data/` - Rail/clock descriptions and their validation
//! - `engine/` - Registry, update engine, relationships, thermal limits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dv_core::{ClockProvider, DvfsController, RailSpec, RegulatorService};
//!
//! fn bring_up(regulator: Arc<dyn RegulatorService>, clocks: Arc<dyn ClockProvider>) -> dv_core::Result<()> {
//!     let dvfs = DvfsController::new(regulator, clocks);
//!     dvfs.init_rails(&[RailSpec::new("vdd-core", 800, 1000, 1200).with_step(50)])?;
//!     dvfs.start()?;
//!     dvfs.set_rate("sclk", 204_000_000)
//! }
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod controller;
pub mod display;
pub mod error;

#[cfg(test)]
mod test_utils;

// Re-export primary types from data/
pub use data::{ClockSpec, HwModeRange, RailSpec, ThermalKind, ThermalLimit};

// Re-export validation functions from data/
pub use data::{cleanup_freq_table, thermal_limits_size, validate_parallel_table, validate_rail_spec};

// Re-export error types
pub use error::{DvfsError, Result};

// Re-export engine types
pub use engine::{
    ClockDvfs, ClockId, OffsetFloor, Rail, RailId, RailMode, RailSnapshot, RailStats, Registry,
    Relationship, RelationshipDef, RelationshipId, SolverSpec, ThermalLimits, TrackingFloor,
};

// Re-export hardware interfaces from hw/
pub use hw::{
    ClockProvider, PmEvent, RateChange, RatePhase, RegulatorHandle, RegulatorService, ShutdownKind,
    SimClocks, SimRegulator, VoltageWrite,
};

pub use controller::DvfsController;

// Re-export display functions
pub use display::{dump_stats, dump_table, dump_tree, status, status_to_json, ClockStatus, DvfsStatus, RailStatus};
