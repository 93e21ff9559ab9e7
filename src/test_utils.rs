/*
 * Test utilities for socdvfs
 *
 * Board builders and temp-file helpers shared by the unit tests.
 */

#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::io::Write;

    use dv_core::{ClockSpec, RailSpec, SolverSpec, ThermalLimit};
    use tempfile::NamedTempFile;

    use crate::config::{BoardConfig, BoardVariant, RelationshipSpec, SupplyBoot};

    pub const MHZ: u64 = 1_000_000;

    /// Writes `contents` to a fresh temp file
    pub fn write_temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// CPU and core rails, core tracking the CPU within 100 mV
    pub fn cpu_core_variant() -> BoardVariant {
        BoardVariant {
            compatible: "test,cpu-core".to_string(),
            rails: vec![
                RailSpec::new("vdd-cpu", 700, 1000, 1200).with_step(50),
                RailSpec::new("vdd-core", 700, 1000, 1200)
                    .with_step(50)
                    .with_thermal(vec![ThermalLimit::new(0, 900), ThermalLimit::new(60, 0)], Vec::new()),
            ],
            relationships: vec![RelationshipSpec {
                from: "vdd-cpu".to_string(),
                to: "vdd-core".to_string(),
                solver: SolverSpec::TrackingFloor { max_diff: 100 },
                solved_at_nominal: false,
            }],
            clocks: vec![
                ClockSpec {
                    freqs_mult: MHZ,
                    ..ClockSpec::new("cclk", "vdd-cpu", vec![500, 1000, 1500], vec![800, 900, 1000])
                },
                ClockSpec {
                    freqs_mult: MHZ,
                    ..ClockSpec::new("sclk", "vdd-core", vec![102, 204, 408], vec![800, 850, 950])
                },
            ],
            supplies: vec![
                SupplyBoot { name: "vdd-cpu".to_string(), millivolts: 800, range: None },
                SupplyBoot { name: "vdd-core".to_string(), millivolts: 800, range: Some((600, 1300)) },
            ],
            boot_rates: HashMap::from([("cclk".to_string(), 500 * MHZ), ("sclk".to_string(), 102 * MHZ)]),
        }
    }

    pub fn board_of(variant: BoardVariant) -> BoardConfig {
        BoardConfig { variants: vec![variant] }
    }
}
