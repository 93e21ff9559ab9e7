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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use socdvfs::config::{load_board_config, select_variant};
use socdvfs::logger::init_logging;
use socdvfs::script::{load_script, run_script};
use socdvfs::Simulation;

#[derive(Parser)]
#[command(name = "socdvfs")]
#[command(version)]
#[command(about = "Replay DVFS events against a board description")]
#[command(long_about = "Replay DVFS events against a board description

Loads a board JSON file, installs the selected variant on a simulated
regulator and clock framework, starts the rail engine and prints what it did.

EXAMPLES:
    socdvfs --board boards/tegra210.json check
    socdvfs --board boards/tegra210.json tree
    socdvfs --board boards/tegra210.json --compatible nvidia,tegra210b01 table
    socdvfs --board boards/tegra210.json run scenario.json --json

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Enable debug logging")]
#[command(propagate_version = true)]
struct Cli {
    /// Board description file
    #[arg(long, short)]
    board: PathBuf,

    /// Variant to install; defaults to the first one in the file
    #[arg(long, short)]
    compatible: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the board file and list its variants
    Check,
    /// Start the engine and print the rail tree
    Tree,
    /// Print the frequency/voltage tables
    Table,
    /// Start the engine and print the voltage histograms
    Stats,
    /// Start the engine and print a JSON status snapshot
    Status,
    /// Replay an event script, then print the rail tree
    Run {
        /// JSON array of script steps
        script: PathBuf,
        /// Print outcomes, regulator writes and final status as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let board = load_board_config(&cli.board)
        .with_context(|| format!("loading board {}", cli.board.display()))?;
    let variant = select_variant(&board, cli.compatible.as_deref())?;
    info!("using variant {}", variant.compatible);

    match cli.command {
        Commands::Check => {
            for v in &board.variants {
                println!(
                    "{}: {} rails, {} relationships, {} clocks",
                    v.compatible,
                    v.rails.len(),
                    v.relationships.len(),
                    v.clocks.len()
                );
            }
        }
        Commands::Table => {
            let sim = Simulation::new(variant)?;
            print!("{}", sim.dvfs.dump_table());
        }
        Commands::Tree => {
            let sim = Simulation::start(variant).context("starting dvfs")?;
            print!("{}", sim.dvfs.dump_tree());
        }
        Commands::Stats => {
            let sim = Simulation::start(variant).context("starting dvfs")?;
            print!("{}", sim.dvfs.dump_stats());
        }
        Commands::Status => {
            let sim = Simulation::start(variant).context("starting dvfs")?;
            println!("{}", dv_core::status_to_json(&sim.dvfs.status())?);
        }
        Commands::Run { script, json } => {
            let steps = load_script(&script)
                .with_context(|| format!("loading script {}", script.display()))?;
            let sim = Simulation::start(variant).context("starting dvfs")?;
            let outcomes = run_script(&sim.dvfs, &sim.clocks, &steps);

            if json {
                let report = serde_json::json!({
                    "steps": outcomes,
                    "writes": sim.regulator.writes(),
                    "status": sim.dvfs.status(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for o in &outcomes {
                    match &o.error {
                        Some(e) => println!("#{:<3} {:<14} FAILED: {}", o.index, o.op, e),
                        None => println!("#{:<3} {:<14} ok", o.index, o.op),
                    }
                }
                println!();
                print!("{}", sim.dvfs.dump_tree());
            }
        }
    }
    Ok(())
}
