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

//! Board descriptions
//!
//! A board file lists one variant per hardware revision. The variant whose
//! `compatible` string matches is installed into a [`DvfsController`].

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use dv_core::{
    validate_rail_spec, ClockSpec, DvfsController, DvfsError, RailSpec, RelationshipDef, Result,
    SolverSpec,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sim::{SimClocks, SimRegulator};

/// A relationship edge between two rails, by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipSpec {
    pub from: String,
    pub to: String,
    pub solver: SolverSpec,
    #[serde(default)]
    pub solved_at_nominal: bool,
}

/// Boot state of a supply in the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplyBoot {
    pub name: String,
    pub millivolts: i32,
    /// Regulator constraint range in mV
    #[serde(default)]
    pub range: Option<(i32, i32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardVariant {
    pub compatible: String,
    pub rails: Vec<RailSpec>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSpec>,
    #[serde(default)]
    pub clocks: Vec<ClockSpec>,
    /// Simulator only: supply boot voltages
    #[serde(default)]
    pub supplies: Vec<SupplyBoot>,
    /// Simulator only: clock rates at boot, in Hz
    #[serde(default)]
    pub boot_rates: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    pub variants: Vec<BoardVariant>,
}

fn is_safe_name(s: &str) -> bool {
    if s.is_empty() || s.len() > 64 {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ','))
}

pub fn load_board_config(path: &Path) -> Result<BoardConfig> {
    let data = fs::read_to_string(path).map_err(|source| DvfsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: BoardConfig = serde_json::from_str(&data)?;
    validate_board_config(&cfg)?;
    debug!("loaded {} board variants from {}", cfg.variants.len(), path.display());
    Ok(cfg)
}

pub fn validate_board_config(cfg: &BoardConfig) -> Result<()> {
    if cfg.variants.is_empty() {
        return Err(DvfsError::config("board has no variants"));
    }
    let mut seen = HashSet::new();
    for (i, v) in cfg.variants.iter().enumerate() {
        if !is_safe_name(&v.compatible) {
            return Err(DvfsError::invalid_config(
                "compatible",
                format!("variant #{} has an invalid compatible string", i + 1),
            ));
        }
        if !seen.insert(v.compatible.as_str()) {
            return Err(DvfsError::invalid_config("compatible", format!("duplicate '{}'", v.compatible)));
        }
        validate_variant(v)?;
    }
    Ok(())
}

fn validate_variant(v: &BoardVariant) -> Result<()> {
    let mut rails = HashSet::new();
    for rail in &v.rails {
        if !is_safe_name(&rail.name) {
            return Err(DvfsError::invalid_config("rails", format!("invalid rail name '{}'", rail.name)));
        }
        if !rails.insert(rail.name.as_str()) {
            return Err(DvfsError::invalid_config("rails", format!("duplicate rail '{}'", rail.name)));
        }
        validate_rail_spec(rail)?;
    }

    for (i, r) in v.relationships.iter().enumerate() {
        for end in [&r.from, &r.to] {
            if !rails.contains(end.as_str()) {
                return Err(DvfsError::UnknownRail(end.clone()));
            }
        }
        if r.from == r.to {
            return Err(DvfsError::invalid_config(
                "relationships",
                format!("relationship #{} ties {} to itself", i + 1, r.from),
            ));
        }
    }

    let mut clocks = HashSet::new();
    for c in &v.clocks {
        if !is_safe_name(&c.clock) {
            return Err(DvfsError::invalid_config("clocks", format!("invalid clock name '{}'", c.clock)));
        }
        if !clocks.insert(c.clock.as_str()) {
            return Err(DvfsError::invalid_config("clocks", format!("duplicate clock '{}'", c.clock)));
        }
        if !rails.contains(c.rail.as_str()) {
            return Err(DvfsError::UnknownRail(c.rail.clone()));
        }
    }

    for s in &v.supplies {
        if !rails.contains(s.name.as_str()) {
            return Err(DvfsError::UnknownRail(s.name.clone()));
        }
        if let Some((lo, hi)) = s.range {
            if lo <= 0 || lo > hi {
                return Err(DvfsError::invalid_config("supplies", format!("{}: bad range {}..{}", s.name, lo, hi)));
            }
        }
    }
    for clock in v.boot_rates.keys() {
        if !clocks.contains(clock.as_str()) {
            return Err(DvfsError::UnknownClock(clock.clone()));
        }
    }
    Ok(())
}

/// Pick the variant matching `compatible`, or the first one when `None`
pub fn select_variant<'a>(cfg: &'a BoardConfig, compatible: Option<&str>) -> Result<&'a BoardVariant> {
    match compatible {
        Some(key) => cfg
            .variants
            .iter()
            .find(|v| v.compatible == key)
            .ok_or_else(|| DvfsError::config(format!("no variant compatible with '{}'", key))),
        None => cfg
            .variants
            .first()
            .ok_or_else(|| DvfsError::config("board has no variants")),
    }
}

/// Register the variant's rails, relationships and clock bindings
pub fn install_variant(dvfs: &DvfsController, variant: &BoardVariant) -> Result<()> {
    let ids = dvfs.init_rails(&variant.rails)?;

    let mut defs = Vec::with_capacity(variant.relationships.len());
    for r in &variant.relationships {
        let from = dvfs
            .rail_by_name(&r.from)
            .ok_or_else(|| DvfsError::UnknownRail(r.from.clone()))?;
        let to = dvfs
            .rail_by_name(&r.to)
            .ok_or_else(|| DvfsError::UnknownRail(r.to.clone()))?;
        defs.push(RelationshipDef::new(from, to, r.solver.into_solver()).solved_at_nominal(r.solved_at_nominal));
    }
    dvfs.add_relationships(defs)?;

    for c in &variant.clocks {
        dvfs.setup_dvfs(c)?;
    }
    info!(
        "installed variant {}: {} rails, {} relationships, {} clocks",
        variant.compatible,
        ids.len(),
        variant.relationships.len(),
        variant.clocks.len()
    );
    Ok(())
}

/// Seed the simulated hardware with the variant's boot state
pub fn prime_simulator(variant: &BoardVariant, regulator: &SimRegulator, clocks: &SimClocks) {
    for s in &variant.supplies {
        regulator.set_boot(&s.name, s.millivolts, s.range);
    }
    for (clock, &rate) in &variant.boot_rates {
        clocks.set(clock, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{board_of, cpu_core_variant, write_temp_file as write_temp};

    const BOARD: &str = r#"{
        "variants": [{
            "compatible": "vendor,soc-a",
            "rails": [
                { "name": "vdd-cpu", "nominal_millivolts": 1000, "min_millivolts": 700, "max_millivolts": 1200, "step": 50 },
                { "name": "vdd-core", "nominal_millivolts": 1000, "min_millivolts": 700, "max_millivolts": 1200, "step": 50 }
            ],
            "relationships": [
                { "from": "vdd-cpu", "to": "vdd-core", "solver": { "kind": "tracking_floor", "max_diff": 100 } }
            ],
            "clocks": [
                { "clock": "sclk", "rail": "vdd-core", "freqs": [102, 204], "freqs_mult": 1000000, "millivolts": [800, 900] }
            ],
            "supplies": [
                { "name": "vdd-core", "millivolts": 850, "range": [600, 1300] },
                { "name": "vdd-cpu", "millivolts": 850 }
            ],
            "boot_rates": { "sclk": 102000000 }
        }, {
            "compatible": "vendor,soc-b",
            "rails": [
                { "name": "vdd-core", "nominal_millivolts": 950, "max_millivolts": 1100 }
            ]
        }]
    }"#;

    #[test]
    fn test_load_board_config() {
        let file = write_temp(BOARD);
        let cfg = load_board_config(file.path()).unwrap();
        assert_eq!(cfg.variants.len(), 2);
        let a = &cfg.variants[0];
        assert_eq!(a.relationships[0].solver, SolverSpec::TrackingFloor { max_diff: 100 });
        assert_eq!(a.clocks[0].freqs_mult, 1_000_000);
        assert_eq!(a.supplies[0].range, Some((600, 1300)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_board_config(Path::new("/nonexistent/board.json")).unwrap_err();
        assert!(matches!(err, DvfsError::FileRead { .. }));
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let file = write_temp("{ \"variants\": [");
        assert!(matches!(load_board_config(file.path()), Err(DvfsError::JsonParse(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_temp(r#"{ "variants": [], "extra": 1 }"#);
        assert!(load_board_config(file.path()).is_err());
    }

    #[test]
    fn test_select_variant() {
        let cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        assert_eq!(select_variant(&cfg, Some("vendor,soc-b")).unwrap().rails[0].nominal_millivolts, 950);
        assert_eq!(select_variant(&cfg, None).unwrap().compatible, "vendor,soc-a");
        assert!(select_variant(&cfg, Some("vendor,soc-z")).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_rail_in_relationship() {
        let mut cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        cfg.variants[0].relationships[0].to = "vdd-gpu".to_string();
        assert!(matches!(validate_board_config(&cfg), Err(DvfsError::UnknownRail(r)) if r == "vdd-gpu"));
    }

    #[test]
    fn test_validate_rejects_self_relationship() {
        let mut cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        cfg.variants[0].relationships[0].to = "vdd-cpu".to_string();
        assert!(validate_board_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_compatible() {
        let mut cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        cfg.variants[1].compatible = "vendor,soc-a".to_string();
        assert!(validate_board_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_clock_on_unknown_rail() {
        let mut cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        cfg.variants[0].clocks[0].rail = "vdd-mem".to_string();
        assert!(validate_board_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let mut cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        cfg.variants[0].rails[0].name = "vdd cpu;rm".to_string();
        assert!(validate_board_config(&cfg).is_err());
    }

    #[test]
    fn test_built_variant_validates() {
        assert!(validate_board_config(&board_of(cpu_core_variant())).is_ok());
    }

    #[test]
    fn test_validate_rejects_boot_rate_for_unknown_clock() {
        let mut variant = cpu_core_variant();
        variant.boot_rates.insert("dsp".to_string(), 1);
        assert!(matches!(validate_board_config(&board_of(variant)), Err(DvfsError::UnknownClock(c)) if c == "dsp"));
    }

    #[test]
    fn test_validate_rejects_empty_board() {
        let cfg = BoardConfig { variants: Vec::new() };
        assert!(validate_board_config(&cfg).is_err());
    }

    #[test]
    fn test_install_variant() {
        let cfg: BoardConfig = serde_json::from_str(BOARD).unwrap();
        let variant = &cfg.variants[0];
        let regulator = SimRegulator::new();
        let clocks = SimClocks::new();
        prime_simulator(variant, &regulator, &clocks);
        let dvfs = DvfsController::new(regulator.clone(), clocks.clone());
        install_variant(&dvfs, variant).unwrap();
        dvfs.start().unwrap();

        assert_eq!(dvfs.get_rate("sclk").unwrap(), 102_000_000);
        assert_eq!(regulator.output("vdd-core"), Some(800));
        assert!(dvfs.rail_by_name("vdd-cpu").is_some());
    }
}
