//! Validation for rail, clock and thermal tables
//!
//! Tables are all-or-nothing: a table that fails any check is rejected as a
//! whole and never partially applied.

use crate::constants::{rails, tables};
use crate::data::{RailSpec, ThermalKind, ThermalLimit};
use crate::error::{DvfsError, Result};

/// Validates a rail description before registration
pub fn validate_rail_spec(spec: &RailSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(DvfsError::invalid_config("rail.name", "rail name cannot be empty"));
    }

    if spec.max_millivolts <= 0 || spec.max_millivolts > rails::MAX_MILLIVOLTS {
        return Err(DvfsError::invalid_config(
            format!("{}.max_millivolts", spec.name),
            format!("{} mV must be within (0, {}] mV", spec.max_millivolts, rails::MAX_MILLIVOLTS),
        ));
    }

    if spec.nominal_millivolts <= 0 || spec.nominal_millivolts > spec.max_millivolts {
        return Err(DvfsError::invalid_config(
            format!("{}.nominal_millivolts", spec.name),
            format!(
                "{} mV must be within (0, {}] mV",
                spec.nominal_millivolts, spec.max_millivolts
            ),
        ));
    }

    if spec.min_millivolts < 0 || spec.min_millivolts > spec.nominal_millivolts {
        return Err(DvfsError::invalid_config(
            format!("{}.min_millivolts", spec.name),
            format!("{} mV exceeds nominal {} mV", spec.min_millivolts, spec.nominal_millivolts),
        ));
    }

    if spec.step < 0 || spec.step_up < 0 {
        return Err(DvfsError::invalid_config(
            format!("{}.step", spec.name),
            "step sizes cannot be negative",
        ));
    }

    Ok(())
}

/// Validates thermal floors or caps and returns the usable table size
///
/// Valid limits:
/// - temperatures strictly increase
/// - voltages never increase with temperature
/// - the lowest limit is not below the rail minimum
/// - floors start at or below nominal, caps never exceed nominal
pub fn thermal_limits_size(
    rail: &str,
    kind: ThermalKind,
    limits: &[ThermalLimit],
    min_millivolts: i32,
    nominal_millivolts: i32,
) -> Result<usize> {
    let invalid = |reason: &str| DvfsError::InvalidThermalLimits {
        rail: rail.to_string(),
        kind: kind.as_str(),
        reason: reason.to_string(),
    };

    // A zero voltage terminates the table
    let size = limits
        .iter()
        .position(|l| l.millivolts == 0)
        .unwrap_or(limits.len());

    if size == 0 {
        return Err(invalid("missing thermal limits"));
    }
    if size > tables::MAX_THERMAL_LIMITS {
        return Err(invalid("too many thermal limits"));
    }

    let limits = &limits[..size];
    for window in limits.windows(2) {
        if window[0].temperature >= window[1].temperature || window[0].millivolts < window[1].millivolts {
            return Err(invalid("unordered thermal limits"));
        }
    }

    if limits[size - 1].millivolts < min_millivolts {
        return Err(invalid("thermal limits below minimum voltage"));
    }

    if limits[0].millivolts > nominal_millivolts {
        return Err(invalid("thermal limits above nominal voltage"));
    }

    Ok(size)
}

/// Normalizes a clock's frequency/voltage table
///
/// The voltage table ends at its first zero entry. Frequencies are scaled by
/// `freqs_mult` (when non-zero) and trailing zero frequencies repeat the
/// previous entry. Real entries must be strictly ascending; only the padded
/// tail may repeat a rate.
pub fn cleanup_freq_table(
    clock: &str,
    freqs: &[u64],
    millivolts: &[i32],
    freqs_mult: u64,
) -> Result<(Vec<u64>, Vec<i32>)> {
    let num = millivolts
        .iter()
        .position(|&mv| mv == 0)
        .unwrap_or(millivolts.len())
        .min(tables::MAX_FREQS);

    if num == 0 {
        return Err(DvfsError::invalid_config(
            format!("{}.millivolts", clock),
            "voltage table is empty",
        ));
    }

    if freqs.len() < num {
        return Err(DvfsError::invalid_config(
            format!("{}.freqs", clock),
            format!("{} frequencies for {} voltages", freqs.len(), num),
        ));
    }

    let mut cleaned: Vec<u64> = Vec::with_capacity(num);
    let mut padded_from = None;
    for (i, &freq) in freqs.iter().take(num).enumerate() {
        let freq = if freqs_mult != 0 {
            freq.checked_mul(freqs_mult).ok_or_else(|| {
                DvfsError::invalid_config(
                    format!("{}.freqs", clock),
                    format!("{} x {} overflows", freq, freqs_mult),
                )
            })?
        } else {
            freq
        };

        if freq == 0 && i > 0 {
            padded_from.get_or_insert(i);
            let prev = cleaned[i - 1];
            cleaned.push(prev);
            continue;
        }
        if padded_from.is_some() {
            return Err(DvfsError::invalid_config(
                format!("{}.freqs", clock),
                "zero frequency before the end of the table",
            ));
        }
        cleaned.push(freq);
    }

    if cleaned[0] == 0 {
        return Err(DvfsError::invalid_config(
            format!("{}.freqs", clock),
            "first frequency is zero",
        ));
    }

    let real = &cleaned[..padded_from.unwrap_or(num)];
    if real.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DvfsError::invalid_config(
            format!("{}.freqs", clock),
            "frequencies must be sorted by ascending rate",
        ));
    }

    if millivolts[..num].iter().any(|&mv| mv < 0) {
        return Err(DvfsError::invalid_config(
            format!("{}.millivolts", clock),
            "negative voltage entry",
        ));
    }

    Ok((cleaned, millivolts[..num].to_vec()))
}

/// Validates a voltage table that must line up with an existing frequency table
pub fn validate_parallel_table(clock: &str, table: &str, millivolts: &[i32], num_freqs: usize) -> Result<Vec<i32>> {
    if millivolts.len() < num_freqs {
        return Err(DvfsError::invalid_config(
            format!("{}.{}", clock, table),
            format!("{} entries for {} frequencies", millivolts.len(), num_freqs),
        ));
    }
    Ok(millivolts[..num_freqs].to_vec())
}
