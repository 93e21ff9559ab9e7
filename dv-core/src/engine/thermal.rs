//! Thermal floor and cap tables
//!
//! Each rail may carry a floor table (minimum voltage per temperature band)
//! and a cap table (maximum voltage per band). The active band is chosen by an
//! external temperature governor through an index; the engine never samples
//! temperature itself.
//!
//! Floor index `i` selects `floors[i]`; an index past the end means no floor.
//! Cap index `i > 0` selects `caps[i - 1]`; index 0 means no cap.

use tracing::warn;

use crate::data::{thermal_limits_size, ThermalKind, ThermalLimit};
use crate::error::{DvfsError, Result};

use super::rail::RailId;
use super::registry::Registry;

/// Validated thermal tables and the active indices for one rail
#[derive(Debug, Clone, Default)]
pub struct ThermalLimits {
    floors: Option<Vec<ThermalLimit>>,
    caps: Option<Vec<ThermalLimit>>,
    floor_idx: usize,
    cap_idx: usize,
    /// Raw tables from the rail description, validated by `init`
    pending_floors: Vec<ThermalLimit>,
    pending_caps: Vec<ThermalLimit>,
}

impl ThermalLimits {
    pub fn new(floors: Vec<ThermalLimit>, caps: Vec<ThermalLimit>) -> Self {
        Self {
            pending_floors: floors,
            pending_caps: caps,
            ..Self::default()
        }
    }

    /// Validate both tables; an invalid table is dropped as a whole
    pub fn init(&mut self, rail: &str, min_millivolts: i32, nominal_millivolts: i32) {
        self.floors = None;
        self.caps = None;
        self.floor_idx = 0;
        self.cap_idx = 0;

        if !self.pending_floors.is_empty() {
            self.init_floors(rail, min_millivolts, nominal_millivolts);
        }
        if !self.pending_caps.is_empty() {
            self.init_caps(rail, min_millivolts, nominal_millivolts);
        }
    }

    fn init_floors(&mut self, rail: &str, min_millivolts: i32, nominal_millivolts: i32) {
        match thermal_limits_size(rail, ThermalKind::Floor, &self.pending_floors, min_millivolts, nominal_millivolts) {
            Ok(size) => self.floors = Some(self.pending_floors[..size].to_vec()),
            Err(e) => warn!("{}: invalid Vmin thermal floors: {}", rail, e),
        }
    }

    fn init_caps(&mut self, rail: &str, min_millivolts: i32, nominal_millivolts: i32) {
        match thermal_limits_size(rail, ThermalKind::Cap, &self.pending_caps, min_millivolts, nominal_millivolts) {
            Ok(size) => {
                self.caps = Some(self.pending_caps[..size].to_vec());
                self.cap_idx = size;
            }
            Err(e) => warn!("{}: invalid Vmax thermal caps: {}", rail, e),
        }
    }

    /// Floor voltage for the active band
    pub fn floor(&self) -> Option<i32> {
        self.floors
            .as_ref()
            .and_then(|f| f.get(self.floor_idx))
            .map(|l| l.millivolts)
    }

    /// Cap voltage for the active band
    pub fn cap(&self) -> Option<i32> {
        if self.cap_idx == 0 {
            return None;
        }
        self.caps
            .as_ref()
            .and_then(|c| c.get(self.cap_idx - 1))
            .map(|l| l.millivolts)
    }

    /// Number of entries in a table, 0 if it was rejected
    pub fn size(&self, kind: ThermalKind) -> usize {
        let table = match kind {
            ThermalKind::Floor => &self.floors,
            ThermalKind::Cap => &self.caps,
        };
        table.as_ref().map_or(0, Vec::len)
    }

    pub fn index(&self, kind: ThermalKind) -> usize {
        match kind {
            ThermalKind::Floor => self.floor_idx,
            ThermalKind::Cap => self.cap_idx,
        }
    }

    /// Store a new index; returns true if it changed
    pub fn set_index(&mut self, kind: ThermalKind, index: usize) -> bool {
        let slot = match kind {
            ThermalKind::Floor => &mut self.floor_idx,
            ThermalKind::Cap => &mut self.cap_idx,
        };
        if *slot == index {
            return false;
        }
        *slot = index;
        true
    }

    pub fn table(&self, kind: ThermalKind) -> Option<&[ThermalLimit]> {
        match kind {
            ThermalKind::Floor => self.floors.as_deref(),
            ThermalKind::Cap => self.caps.as_deref(),
        }
    }
}

impl Registry {
    /// Validate the rail's thermal tables and reset the active indices
    pub fn init_therm_limits(&mut self, id: RailId) {
        let rail = &mut self.rails[id.0];
        let (min, nominal) = (rail.min_millivolts, rail.nominal_millivolts);
        rail.thermal.init(&rail.name, min, nominal);
    }

    fn ready_rail(&self, id: RailId) -> Result<&super::rail::Rail> {
        let rail = self.rail(id)?;
        if !rail.is_ready {
            return Err(DvfsError::RailNotReady(rail.name.clone()));
        }
        Ok(rail)
    }

    /// Number of thermal states the governor can select
    pub fn count_thermal_states(&self, id: RailId, kind: ThermalKind) -> Result<usize> {
        Ok(self.ready_rail(id)?.thermal.size(kind))
    }

    pub fn thermal_index(&self, id: RailId, kind: ThermalKind) -> Result<usize> {
        Ok(self.ready_rail(id)?.thermal.index(kind))
    }

    /// Select a new thermal band and re-evaluate the rail
    pub fn update_thermal_index(&mut self, id: RailId, kind: ThermalKind, index: usize) -> Result<()> {
        self.ready_rail(id)?;
        if self.rails[id.0].thermal.set_index(kind, index) {
            self.update_rail(id)?;
        }
        Ok(())
    }
}
