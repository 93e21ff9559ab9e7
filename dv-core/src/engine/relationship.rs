//! Rail-to-rail voltage relationships
//!
//! A relationship is a directed edge: the voltage of the *to* rail must
//! satisfy some function of the *from* rail's voltage. Solvers see read-only
//! snapshots of both rails and return the value the to-rail should hold.
//!
//! Every solver result is a lower bound. When a rail has several incoming
//! relationships they are folded in registration order: each solver receives
//! the to-rail's pending voltage as produced by the previous one and raises
//! it where needed. The update engine never lets the fold end below the
//! rail's own clock demand.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::rail::RailId;

/// Voltages of a rail at one instant
///
/// While a rail is mid-transition, `millivolts` is the value currently on
/// the regulator and `new_millivolts` the value about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailSnapshot {
    pub millivolts: i32,
    pub new_millivolts: i32,
    pub min_millivolts: i32,
    pub max_millivolts: i32,
    pub nominal_millivolts: i32,
}

impl RailSnapshot {
    /// Highest voltage the rail holds across an in-flight step
    pub fn peak(&self) -> i32 {
        self.millivolts.max(self.new_millivolts)
    }
}

/// Solver for one relationship edge
pub trait Relationship: Send + Sync + fmt::Debug {
    /// Voltage the to-rail should hold given both snapshots
    fn solve(&self, from: &RailSnapshot, to: &RailSnapshot) -> i32;
}

/// Keep the to-rail within `max_diff` below the from-rail
///
/// Typical for a logic rail that must not drop too far below the rail
/// feeding the same cluster.
#[derive(Debug, Clone, Copy)]
pub struct TrackingFloor {
    pub max_diff: i32,
}

impl Relationship for TrackingFloor {
    fn solve(&self, from: &RailSnapshot, to: &RailSnapshot) -> i32 {
        let floor = from.peak() - self.max_diff;
        to.new_millivolts.max(floor).min(to.max_millivolts)
    }
}

/// Keep the to-rail at least `offset` above the from-rail
#[derive(Debug, Clone, Copy)]
pub struct OffsetFloor {
    pub offset: i32,
}

impl Relationship for OffsetFloor {
    fn solve(&self, from: &RailSnapshot, to: &RailSnapshot) -> i32 {
        let floor = from.peak() + self.offset;
        to.new_millivolts.max(floor).min(to.max_millivolts)
    }
}

/// Serializable solver selection for board descriptions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverSpec {
    TrackingFloor { max_diff: i32 },
    OffsetFloor { offset: i32 },
}

impl SolverSpec {
    pub fn into_solver(self) -> Box<dyn Relationship> {
        match self {
            SolverSpec::TrackingFloor { max_diff } => Box::new(TrackingFloor { max_diff }),
            SolverSpec::OffsetFloor { offset } => Box::new(OffsetFloor { offset }),
        }
    }
}

/// Handle of a registered relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationshipId(pub(crate) usize);

/// A relationship to be registered
pub struct RelationshipDef {
    pub from: RailId,
    pub to: RailId,
    pub solver: Box<dyn Relationship>,
    /// The to-rail is safe at its nominal level whatever the from-rail does,
    /// so suspend ordering may ignore this edge
    pub solved_at_nominal: bool,
}

impl RelationshipDef {
    pub fn new(from: RailId, to: RailId, solver: Box<dyn Relationship>) -> Self {
        Self { from, to, solver, solved_at_nominal: false }
    }

    pub fn solved_at_nominal(mut self, solved: bool) -> Self {
        self.solved_at_nominal = solved;
        self
    }
}

/// A registered relationship edge
#[derive(Debug)]
pub struct RelationshipEdge {
    pub(crate) from: RailId,
    pub(crate) to: RailId,
    pub(crate) solver: Box<dyn Relationship>,
    pub(crate) solved_at_nominal: bool,
}

impl RelationshipEdge {
    pub fn from(&self) -> RailId {
        self.from
    }

    pub fn to(&self) -> RailId {
        self.to
    }

    pub fn solve(&self, from: &RailSnapshot, to: &RailSnapshot) -> i32 {
        self.solver.solve(from, to)
    }
}

impl From<RelationshipDef> for RelationshipEdge {
    fn from(def: RelationshipDef) -> Self {
        Self {
            from: def.from,
            to: def.to,
            solver: def.solver,
            solved_at_nominal: def.solved_at_nominal,
        }
    }
}
