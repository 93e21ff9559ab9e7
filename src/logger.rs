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

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `RUST_LOG` wins over `level`, which wins over the default
fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = level.unwrap_or(DEFAULT_LOG_LEVEL);
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber; later calls are ignored
pub fn init_logging(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level))
        .try_init();
}
