//! Rail registry
//!
//! Owns every rail, relationship edge and clock binding. Rails and edges are
//! created once at init and never removed, so their indices are stable
//! handles. The registry itself is not synchronized; [`crate::DvfsController`]
//! wraps it in the single lock that serializes all voltage decisions.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::data::{validate_rail_spec, RailSpec};
use crate::error::{DvfsError, Result};
use crate::hw::{ClockProvider, RegulatorHandle, RegulatorService};

use super::binding::{ClockDvfs, ClockId};
use super::rail::{Rail, RailId};
use super::relationship::{RelationshipDef, RelationshipEdge, RelationshipId};

/// Owned collection of rails, relationships and clock bindings
pub struct Registry {
    pub(crate) rails: Vec<Rail>,
    pub(crate) relationships: Vec<RelationshipEdge>,
    pub(crate) clocks: Vec<ClockDvfs>,
    pub(crate) regulator: Arc<dyn RegulatorService>,
    pub(crate) started: bool,
}

impl Registry {
    pub fn new(regulator: Arc<dyn RegulatorService>) -> Self {
        Self {
            rails: Vec::new(),
            relationships: Vec::new(),
            clocks: Vec::new(),
            regulator,
            started: false,
        }
    }

    // ============================================================================
    // Registration
    // ============================================================================

    /// Register a batch of rails
    ///
    /// A rail whose name is already registered keeps its existing identity.
    pub fn init_rails(&mut self, specs: &[RailSpec]) -> Result<Vec<RailId>> {
        for spec in specs {
            validate_rail_spec(spec)?;
        }

        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            if let Some(id) = self.rail_by_name(&spec.name) {
                debug!("rail {} already registered", spec.name);
                ids.push(id);
                continue;
            }
            let id = RailId(self.rails.len());
            self.rails.push(Rail::from_spec(spec));
            self.init_therm_limits(id);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Register a batch of relationships, appending to both adjacency lists
    pub fn add_relationships(&mut self, defs: Vec<RelationshipDef>) -> Result<Vec<RelationshipId>> {
        for def in &defs {
            self.rail(def.from)?;
            self.rail(def.to)?;
            if def.from == def.to {
                return Err(DvfsError::invalid_config(
                    format!("{}.relationships", self.rails[def.from.0].name),
                    "a rail cannot depend on itself",
                ));
            }
        }

        let mut ids = Vec::with_capacity(defs.len());
        for def in defs {
            let id = RelationshipId(self.relationships.len());
            self.rails[def.to.0].relationships_from.push(id);
            self.rails[def.from.0].relationships_to.push(id);
            self.relationships.push(def.into());
            ids.push(id);
        }
        Ok(ids)
    }

    // ============================================================================
    // Lookup
    // ============================================================================

    pub fn rail_by_name(&self, name: &str) -> Option<RailId> {
        self.rails.iter().position(|r| r.name == name).map(RailId)
    }

    /// Binding for a clock; linear scan over every rail's clocks
    pub fn clock_by_name(&self, clock: &str) -> Option<ClockId> {
        self.rails
            .iter()
            .flat_map(|r| r.clocks.iter())
            .copied()
            .find(|id| self.clocks[id.0].clock == clock)
    }

    pub fn rail(&self, id: RailId) -> Result<&Rail> {
        self.rails
            .get(id.0)
            .ok_or_else(|| DvfsError::UnknownRail(format!("#{}", id.0)))
    }

    pub fn binding(&self, id: ClockId) -> Result<&ClockDvfs> {
        self.clocks
            .get(id.0)
            .ok_or_else(|| DvfsError::UnknownClock(format!("#{}", id.0)))
    }

    pub(crate) fn binding_mut(&mut self, id: ClockId) -> Result<&mut ClockDvfs> {
        self.clocks
            .get_mut(id.0)
            .ok_or_else(|| DvfsError::UnknownClock(format!("#{}", id.0)))
    }

    pub fn rail_ids(&self) -> impl Iterator<Item = RailId> {
        (0..self.rails.len()).map(RailId)
    }

    pub fn rails(&self) -> &[Rail] {
        &self.rails
    }

    pub fn relationships(&self) -> &[RelationshipEdge] {
        &self.relationships
    }

    pub fn bindings(&self) -> &[ClockDvfs] {
        &self.clocks
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ============================================================================
    // Regulator connection
    // ============================================================================

    /// Name to connect if the rail has no regulator handle yet
    pub(crate) fn needs_connect(&self, id: RailId) -> Option<String> {
        let rail = &self.rails[id.0];
        rail.regulator.is_none().then(|| rail.name.clone())
    }

    /// Finish connecting a rail once a handle is available
    ///
    /// Another caller may have connected the rail while the lock was
    /// released; the first handle wins. Switches the supply on unless the
    /// rail is power-managed in band, reads back the voltage, fills in the
    /// minimum from the regulator constraints and starts the histogram.
    pub(crate) fn finish_connect(&mut self, id: RailId, handle: Option<RegulatorHandle>) -> Result<()> {
        if self.rails[id.0].regulator.is_none() {
            self.rails[id.0].regulator = handle;
        }
        let rail = &self.rails[id.0];
        let handle = rail.regulator.ok_or_else(|| DvfsError::NotConnected(rail.name.clone()))?;

        if !rail.in_band_pm {
            self.regulator.enable(handle).map_err(|e| {
                error!("failed on enabling regulator {}: {}", rail.name, e);
                DvfsError::RegulatorEnable {
                    rail: rail.name.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        let mv = crate::hw::get_millivolts(&*self.regulator, handle, &rail.name).map_err(|e| {
            error!("failed initial get {} voltage", rail.name);
            e
        })?;

        let range = self.regulator.supported_range(handle);
        let rail = &mut self.rails[id.0];
        if rail.min_millivolts == 0 {
            if let Some((min_uv, _)) = range {
                rail.min_millivolts = min_uv / crate::constants::units::UV_PER_MV;
            }
        }

        rail.millivolts = mv;
        rail.new_millivolts = mv;
        let (min, max) = (rail.min_millivolts, rail.max_millivolts);
        rail.stats.init(&rail.name, min, max, mv, Instant::now());
        Ok(())
    }

    /// Seed every binding on the rail from the clocks that are running
    pub(crate) fn config_rail_clocks(&mut self, id: RailId, clocks: &dyn ClockProvider) {
        for i in 0..self.rails[id.0].clocks.len() {
            let clock = self.rails[id.0].clocks[i];
            let binding = &mut self.clocks[clock.0];
            if clocks.is_active(&binding.clock) {
                let rate = clocks.rate(&binding.clock);
                binding.seed(rate);
                debug!("{}: seeded at {} Hz, {} mV", binding.clock, rate, binding.cur_millivolts);
            }
        }
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
        for rail in &mut self.rails {
            rail.is_ready = true;
        }
    }
}
