//! Constants and configuration values for the DVFS engine
//!
//! Centralizes table limits, rail voltage bounds and histogram geometry.
//! Add new magic numbers here instead of inlining them in the engine.

/// Rail usage histogram geometry
pub mod stats {
    /// Default histogram bin width in microvolts (12.5 mV)
    pub const BIN_UV: i32 = 12_500;

    /// Index of the highest histogram bin; bin 0 counts time spent off
    pub const TOP_BIN: usize = 100;

    /// Voltage span covered above the rail minimum before samples are squashed
    /// into the top bin, in millivolts, for a given bin width.
    pub const fn range_mv(bin_uv: i32) -> i32 {
        (TOP_BIN as i32 - 1) * bin_uv / 1000
    }
}

/// Table size limits
pub mod tables {
    /// Maximum number of frequency/voltage pairs per clock binding
    pub const MAX_FREQS: usize = 40;

    /// Maximum number of entries in a thermal floor or cap table
    pub const MAX_THERMAL_LIMITS: usize = 8;
}

/// Regulator unit conversions
pub mod units {
    /// Microvolts per millivolt
    pub const UV_PER_MV: i32 = 1000;

    /// Hz per 0.1 MHz, used by the table dump
    pub const HZ_PER_DECI_MHZ: u64 = 100_000;
}

/// Rail voltage bounds
pub mod rails {
    /// Highest `max_millivolts` a rail description may declare
    ///
    /// Keeps every rail voltage representable in microvolts as an `i32`.
    pub const MAX_MILLIVOLTS: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_range_default_bin() {
        // 99 bins of 12.5 mV
        assert_eq!(stats::range_mv(stats::BIN_UV), 1237);
    }

    #[test]
    fn test_rail_ceiling_fits_microvolts() {
        assert!(rails::MAX_MILLIVOLTS.checked_mul(units::UV_PER_MV).is_some());
    }
}
