//! Rail update engine
//!
//! [`Registry::update_rail`] works out the voltage a rail needs from its
//! clocks, thermal band and incoming relationships, then walks the regulator
//! there in bounded steps. Every step re-evaluates the rails that depend on
//! this one, which is how a change propagates through the graph.
//!
//! Cycles are cut by the per-rail `resolving_to` flag: a rail that is already
//! stepping ignores nested update requests, and the fixpoint loop in
//! `update_rail` picks up whatever the nested pass left behind.

use std::time::Instant;

use tracing::{debug, error, warn};

use crate::error::{DvfsError, Result};

use super::rail::RailId;
use super::registry::Registry;

/// What the rail's clocks ask for
enum Demand {
    Voltage(i32),
    /// No clock needs the rail and it is powered down explicitly
    KeepOff,
    /// No clock needs the rail but it must stay powered
    Refused,
}

fn div_round_up(delta: i32, step: i32) -> i32 {
    let step = step.max(1);
    (delta.abs() + step - 1) / step
}

impl Registry {
    fn demand(&self, id: RailId) -> Demand {
        let rail = &self.rails[id.0];
        let millivolts = rail
            .clocks
            .iter()
            .map(|c| self.clocks[c.0].cur_millivolts)
            .max()
            .unwrap_or(0);

        if millivolts != 0 {
            Demand::Voltage(rail.apply_limits(millivolts))
        } else if rail.in_band_pm {
            Demand::KeepOff
        } else if !rail.jmp_to_zero {
            Demand::Refused
        } else {
            Demand::Voltage(0)
        }
    }

    /// Fold every incoming relationship over `millivolts`, then clamp
    ///
    /// Relationships only ever raise the rail; the result is never below the
    /// clock demand passed in.
    fn solve_incoming(&self, id: RailId, millivolts: i32) -> i32 {
        let rail = &self.rails[id.0];
        let mut to = rail.snapshot();
        to.new_millivolts = millivolts;

        for rel in &rail.relationships_from {
            let edge = &self.relationships[rel.0];
            let from = self.rails[edge.from.0].snapshot();
            to.new_millivolts = edge.solve(&from, &to).max(millivolts);
        }

        if to.new_millivolts == 0 {
            0
        } else {
            rail.clamp(to.new_millivolts)
        }
    }

    /// Bring a rail to the lowest voltage satisfying all its constraints
    ///
    /// Disabled, suspended, unconnected and currently-resolving rails are
    /// left alone; they are picked up again on enable, resume, connect or
    /// when the outer resolution finishes.
    pub fn update_rail(&mut self, id: RailId) -> Result<()> {
        let rail = self.rail(id)?;
        if rail.disabled || rail.suspended || rail.regulator.is_none() || rail.resolving_to {
            return Ok(());
        }

        let millivolts = match self.demand(id) {
            Demand::Voltage(mv) => mv,
            Demand::KeepOff => return Ok(()),
            Demand::Refused => {
                warn!("{}", DvfsError::CannotPowerOff(rail.name.clone()));
                return Ok(());
            }
        };

        // Circular dependencies may hold the target back for a few rounds
        let iterations = div_round_up(millivolts - rail.millivolts, rail.step) + 1;
        for _ in 0..iterations {
            let target = self.solve_incoming(id, millivolts);
            self.rails[id.0].new_millivolts = target;
            if target == self.rails[id.0].millivolts {
                return Ok(());
            }
            self.set_rail_voltage(id, target)?;
        }

        let target = self.solve_incoming(id, millivolts);
        let rail = &mut self.rails[id.0];
        rail.new_millivolts = rail.millivolts;
        if target != rail.millivolts {
            error!(
                "{}: no fixpoint after {} iterations ({} mV, wants {} mV)",
                rail.name, iterations, rail.millivolts, target
            );
            return Err(DvfsError::NotConverged {
                rail: rail.name.clone(),
                iterations,
                millivolts: rail.millivolts,
                pending: target,
            });
        }
        Ok(())
    }

    /// Move a rail to `millivolts` and update every rail that depends on it
    pub(crate) fn set_rail_voltage(&mut self, id: RailId, millivolts: i32) -> Result<()> {
        let rail = &mut self.rails[id.0];

        if rail.regulator.is_none() {
            if millivolts == rail.millivolts {
                return Ok(());
            }
            return Err(DvfsError::NotConnected(rail.name.clone()));
        }

        // The hardware controller owns the output; only track it
        if rail.hw_mode {
            rail.millivolts = millivolts;
            rail.new_millivolts = millivolts;
            let min = rail.min_millivolts;
            rail.stats.record(min, millivolts, Instant::now());
            return Ok(());
        }

        if rail.disabled {
            return Ok(());
        }

        rail.resolving_to = true;
        let result = self.step_voltage(id, millivolts);

        let rail = &mut self.rails[id.0];
        rail.resolving_to = false;
        if result.is_err() {
            rail.new_millivolts = rail.millivolts;
        }
        result
    }

    fn step_voltage(&mut self, id: RailId, millivolts: i32) -> Result<()> {
        let rail = &self.rails[id.0];
        let (step, offset) = if millivolts > rail.millivolts {
            (rail.step_up, rail.step_up)
        } else {
            (rail.step, -rail.step)
        };

        let jump = rail.jmp_to_zero && (millivolts == 0 || rail.millivolts == 0);
        let steps = if jump || (rail.in_band_pm && rail.stats.off) {
            1
        } else {
            div_round_up(millivolts - rail.millivolts, step)
        };

        for _ in 0..steps {
            let rail = &mut self.rails[id.0];
            rail.new_millivolts = if !jump && (millivolts - rail.millivolts).abs() > step {
                rail.millivolts + offset
            } else {
                millivolts
            };

            // Dependents see the old voltage as current and the next one as pending
            self.update_dependents(id)?;

            let rail = &self.rails[id.0];
            let handle = rail
                .regulator
                .ok_or_else(|| DvfsError::NotConnected(rail.name.clone()))?;
            crate::hw::set_millivolts(
                &*self.regulator,
                handle,
                &rail.name,
                rail.new_millivolts,
                rail.max_millivolts,
            )
            .map_err(|e| {
                error!("Failed to set dvfs regulator {}: {}", rail.name, e);
                e
            })?;

            let rail = &mut self.rails[id.0];
            rail.millivolts = rail.new_millivolts;
            let (min, mv) = (rail.min_millivolts, rail.millivolts);
            rail.stats.record(min, mv, Instant::now());
            debug!("{}: {} mV", rail.name, mv);

            self.update_dependents(id)?;
        }

        let rail = &self.rails[id.0];
        if rail.millivolts != millivolts {
            error!(
                "{}: rail didn't reach target {} in {} steps ({})",
                rail.name, millivolts, steps, rail.millivolts
            );
            return Err(DvfsError::TargetNotReached {
                rail: rail.name.clone(),
                target: millivolts,
                steps,
                millivolts: rail.millivolts,
            });
        }
        Ok(())
    }

    fn update_dependents(&mut self, id: RailId) -> Result<()> {
        for i in 0..self.rails[id.0].relationships_to.len() {
            let rel = self.rails[id.0].relationships_to[i];
            let to = self.relationships[rel.0].to;
            self.update_rail(to)?;
        }
        Ok(())
    }
}
