/*
 * This file is part of socdvfs.
 *
 * Copyright (C) 2025 socdvfs contributors
 *
 * socdvfs is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * socdvfs is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with socdvfs. If not, see <https://www.gnu.org/licenses/>.
 */

//! socdvfs - board description tooling for the DVFS rail coordinator
//!
//! Loads per-variant board descriptions, wires them to simulated regulator
//! and clock services, and replays event scripts against the engine in
//! `dv-core`.

pub mod config;
pub mod logger;
pub mod script;

pub use dv_core::hw::sim;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use dv_core::{DvfsController, Result};

use crate::config::{install_variant, prime_simulator, BoardVariant};
use crate::sim::{SimClocks, SimRegulator};

/// A started controller on simulated hardware
pub struct Simulation {
    pub dvfs: DvfsController,
    pub regulator: Arc<SimRegulator>,
    pub clocks: Arc<SimClocks>,
}

impl Simulation {
    /// Install `variant` on fresh simulated hardware without starting it
    pub fn new(variant: &BoardVariant) -> Result<Self> {
        let regulator = SimRegulator::new();
        let clocks = SimClocks::new();
        prime_simulator(variant, &regulator, &clocks);
        let dvfs = DvfsController::new(regulator.clone(), clocks.clone());
        install_variant(&dvfs, variant)?;
        Ok(Self { dvfs, regulator, clocks })
    }

    pub fn start(variant: &BoardVariant) -> Result<Self> {
        let sim = Self::new(variant)?;
        sim.dvfs.start()?;
        Ok(sim)
    }
}
