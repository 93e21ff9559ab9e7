//! Regulator service interface
//!
//! The engine never touches hardware directly. Every voltage write, read and
//! supply switch goes through a [`RegulatorService`] supplied by the host.
//!
//! # Units
//!
//! Like the kernel regulator API, the service works in microvolts. The
//! engine converts to and from millivolts at this boundary.

use crate::constants::units::UV_PER_MV;
use crate::error::{DvfsError, Result};

/// Opaque handle returned by [`RegulatorService::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegulatorHandle(pub u32);

/// Hardware voltage service
///
/// Implementations may block; `connect` is always called without the
/// registry lock held.
#[cfg_attr(test, mockall::automock)]
pub trait RegulatorService: Send + Sync {
    /// Look up the regulator feeding `supply`
    fn connect(&self, supply: &str) -> Result<RegulatorHandle>;

    /// Request a voltage within `[min_uv, max_uv]`
    fn set_voltage(&self, handle: RegulatorHandle, min_uv: i32, max_uv: i32) -> Result<()>;

    /// Current output voltage in microvolts
    fn get_voltage(&self, handle: RegulatorHandle) -> Result<i32>;

    fn enable(&self, handle: RegulatorHandle) -> Result<()>;

    fn disable(&self, handle: RegulatorHandle) -> Result<()>;

    fn is_enabled(&self, handle: RegulatorHandle) -> bool;

    /// Constraint range `(min_uv, max_uv)` if the regulator reports one
    fn supported_range(&self, handle: RegulatorHandle) -> Option<(i32, i32)>;
}

fn to_microvolts(rail: &str, millivolts: i32) -> Result<i32> {
    millivolts.checked_mul(UV_PER_MV).ok_or_else(|| {
        DvfsError::invalid_config(
            format!("{}.millivolts", rail),
            format!("{} mV does not fit in microvolts", millivolts),
        )
    })
}

/// Program `millivolts` with `max_millivolts` as the ceiling
pub(crate) fn set_millivolts(
    service: &dyn RegulatorService,
    handle: RegulatorHandle,
    rail: &str,
    millivolts: i32,
    max_millivolts: i32,
) -> Result<()> {
    let min_uv = to_microvolts(rail, millivolts)?;
    let max_uv = to_microvolts(rail, max_millivolts)?;
    service
        .set_voltage(handle, min_uv, max_uv)
        .map_err(|e| DvfsError::RegulatorSet {
            rail: rail.to_string(),
            millivolts,
            reason: e.to_string(),
        })
}

/// Read the regulator output in millivolts
pub(crate) fn get_millivolts(service: &dyn RegulatorService, handle: RegulatorHandle, rail: &str) -> Result<i32> {
    let uv = service.get_voltage(handle).map_err(|e| DvfsError::RegulatorGet {
        rail: rail.to_string(),
        reason: e.to_string(),
    })?;
    if uv < 0 {
        return Err(DvfsError::RegulatorGet {
            rail: rail.to_string(),
            reason: format!("negative reading {} uV", uv),
        });
    }
    Ok(uv / UV_PER_MV)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_set_millivolts_converts_units() {
        let mut mock = MockRegulatorService::new();
        mock.expect_set_voltage()
            .with(eq(RegulatorHandle(3)), eq(950_000), eq(1_200_000))
            .times(1)
            .returning(|_, _, _| Ok(()));
        assert!(set_millivolts(&mock, RegulatorHandle(3), "vdd-core", 950, 1200).is_ok());
    }

    #[test]
    fn test_set_millivolts_wraps_failure() {
        let mut mock = MockRegulatorService::new();
        mock.expect_set_voltage()
            .returning(|_, _, _| Err(DvfsError::regulator("i2c timeout")));
        let err = set_millivolts(&mock, RegulatorHandle(0), "vdd-cpu", 900, 1200).unwrap_err();
        match err {
            DvfsError::RegulatorSet { rail, millivolts, reason } => {
                assert_eq!(rail, "vdd-cpu");
                assert_eq!(millivolts, 900);
                assert!(reason.contains("i2c timeout"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_set_millivolts_rejects_unrepresentable_voltage() {
        // No expectation: the service must not be called
        let mock = MockRegulatorService::new();
        let err = set_millivolts(&mock, RegulatorHandle(0), "vdd-cpu", 900, i32::MAX / 10).unwrap_err();
        assert!(matches!(err, DvfsError::InvalidConfig { ref field, .. } if field == "vdd-cpu.millivolts"));
    }

    #[test]
    fn test_get_millivolts_rejects_negative() {
        let mut mock = MockRegulatorService::new();
        mock.expect_get_voltage().returning(|_| Ok(-5));
        assert!(get_millivolts(&mock, RegulatorHandle(0), "vdd-cpu").is_err());
    }
}
