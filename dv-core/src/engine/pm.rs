//! Suspend, resume, disable and in-band power sequencing
//!
//! Suspend walks the rails in dependency order: a rail is only suspended
//! once every rail it depends on is suspended or disabled, unless the edge
//! is solved at nominal. Neither suspend nor disable ever lowers a rail.

use std::time::Instant;

use tracing::{error, info, warn};

use crate::error::{DvfsError, Result};

use super::rail::RailId;
use super::registry::Registry;

impl Registry {
    fn all_rails_suspended(&self) -> bool {
        self.rails.iter().all(|r| r.suspended || r.disabled)
    }

    fn from_rails_suspended_or_solved(&self, id: RailId) -> bool {
        self.rails[id.0].relationships_from.iter().all(|rel| {
            let edge = &self.relationships[rel.0];
            let from = &self.rails[edge.from.0];
            from.suspended || from.disabled || edge.solved_at_nominal
        })
    }

    /// Suspend the first eligible rail
    fn suspend_one(&mut self) -> Result<()> {
        let next = self.rail_ids().find(|&id| {
            let rail = &self.rails[id.0];
            !rail.suspended && !rail.disabled && self.from_rails_suspended_or_solved(id)
        });
        let id = next.ok_or(DvfsError::SuspendBlocked)?;

        let rail = &self.rails[id.0];
        let millivolts = rail.apply_limits(rail.suspend_level());
        if millivolts >= rail.millivolts {
            if let Err(e) = self.set_rail_voltage(id, millivolts) {
                let rail = &self.rails[id.0];
                error!("failed {} suspend at {}: {}", rail.name, rail.millivolts, e);
                return Err(e);
            }
        }

        self.rails[id.0].suspended = true;
        Ok(())
    }

    /// Park every rail at its suspend level
    ///
    /// On failure every rail is resumed again and the error is returned.
    pub fn suspend_all(&mut self) -> Result<()> {
        while !self.all_rails_suspended() {
            if let Err(e) = self.suspend_one() {
                self.resume_all();
                return Err(e);
            }
        }
        info!("dvfs suspended");
        Ok(())
    }

    /// Clear every suspend flag and re-evaluate all rails
    pub fn resume_all(&mut self) {
        for rail in &mut self.rails {
            rail.suspended = false;
        }
        for id in self.rail_ids().collect::<Vec<_>>() {
            if let Err(e) = self.update_rail(id) {
                warn!("{}: resume update failed: {}", self.rails[id.0].name, e);
            }
        }
        info!("dvfs resumed");
    }

    /// Hold a rail at its disable level and stop tracking its clocks
    ///
    /// The rail must not be below that level already; a rail under hardware
    /// control is only flagged.
    pub fn disable_rail(&mut self, id: RailId) -> Result<()> {
        let rail = self.rail(id)?;
        if rail.disabled {
            return Ok(());
        }
        if rail.hw_mode {
            self.rails[id.0].disabled = true;
            return Ok(());
        }

        let millivolts = rail.apply_limits(rail.disable_level());
        if millivolts < rail.millivolts {
            error!("failed to disable {} at {}", rail.name, rail.millivolts);
            return Err(DvfsError::DisableBelowCurrent {
                rail: rail.name.clone(),
                millivolts,
                current: rail.millivolts,
            });
        }

        if let Err(e) = self.set_rail_voltage(id, millivolts) {
            error!("failed to disable {} at {}", self.rails[id.0].name, self.rails[id.0].millivolts);
            return Err(e);
        }
        self.rails[id.0].disabled = true;
        Ok(())
    }

    pub fn enable_rail(&mut self, id: RailId) -> Result<()> {
        if !self.rail(id)?.disabled {
            return Ok(());
        }
        self.force_enable(id)
    }

    /// Clear the disabled flag and re-evaluate whatever the previous state
    pub(crate) fn force_enable(&mut self, id: RailId) -> Result<()> {
        self.rails[id.0].disabled = false;
        self.update_rail(id)
    }

    /// Rails without in-band power management are always up
    pub fn is_rail_up(&self, id: RailId) -> Result<bool> {
        let rail = self.rail(id)?;
        if !rail.in_band_pm {
            return Ok(true);
        }
        Ok(rail
            .regulator
            .map_or(false, |handle| self.regulator.is_enabled(handle)))
    }

    pub fn power_up(&mut self, id: RailId) -> Result<()> {
        self.set_power(id, true)
    }

    pub fn power_down(&mut self, id: RailId) -> Result<()> {
        self.set_power(id, false)
    }

    fn set_power(&mut self, id: RailId, on: bool) -> Result<()> {
        let rail = self.rail(id)?;
        if !rail.in_band_pm {
            return Err(DvfsError::NotInBandPm(rail.name.clone()));
        }
        let handle = rail
            .regulator
            .ok_or_else(|| DvfsError::NotConnected(rail.name.clone()))?;

        let result = if on {
            self.regulator.enable(handle)
        } else {
            self.regulator.disable(handle)
        };
        result.map_err(|e| DvfsError::RegulatorEnable {
            rail: rail.name.clone(),
            reason: e.to_string(),
        })?;

        let rail = &mut self.rails[id.0];
        let (min, mv) = (rail.min_millivolts, rail.millivolts);
        rail.stats.set_off(!on, min, mv, Instant::now());
        Ok(())
    }
}
