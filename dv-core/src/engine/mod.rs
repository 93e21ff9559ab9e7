//! Rail update engine modules
//!
//! Contains the rail registry, relationship solvers, clock bindings, thermal
//! limits, usage statistics and the suspend/disable sequencing.

mod binding;
mod pm;
mod rail;
mod registry;
mod relationship;
mod stats;
mod thermal;
mod update;

pub use binding::{ClockDvfs, ClockId};
pub use rail::{Rail, RailId, RailMode};
pub use registry::Registry;
pub use relationship::{
    OffsetFloor, RailSnapshot, Relationship, RelationshipDef, RelationshipEdge, RelationshipId,
    SolverSpec, TrackingFloor,
};
pub use stats::RailStats;
pub use thermal::ThermalLimits;
