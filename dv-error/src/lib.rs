//! Unified error handling for socdvfs
//!
//! This crate provides the single error type used by the rail engine and the
//! board tooling. It uses thiserror for Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using DvfsError
pub type Result<T> = std::result::Result<T, DvfsError>;

/// Unified error type for all DVFS operations
#[derive(thiserror::Error, Debug)]
pub enum DvfsError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Unknown rail: {0}")]
    UnknownRail(String),

    #[error("No dvfs binding for clock {0}")]
    UnknownClock(String),

    #[error("Clock {clock} has no {table} table")]
    MissingTable {
        clock: String,
        table: &'static str,
    },

    #[error("Rate {rate} Hz too high for dvfs on {clock} (max {max} Hz)")]
    RateTooHigh {
        clock: String,
        rate: u64,
        max: u64,
    },

    #[error("Voltage {millivolts} mV too high for dvfs on {clock} (cap {cap} mV)")]
    VoltageAboveCap {
        clock: String,
        millivolts: i32,
        cap: i32,
    },

    #[error("Invalid thermal {kind} for {rail}: {reason}")]
    InvalidThermalLimits {
        rail: String,
        kind: &'static str,
        reason: String,
    },

    #[error("Unknown hardware-mode range {0}")]
    InvalidRange(i32),

    // ============================================================================
    // Policy Violations
    // ============================================================================
    #[error("Rail {0} cannot be turned off by dvfs")]
    CannotPowerOff(String),

    #[error("Rail {rail}: disable level {millivolts} mV is below current {current} mV")]
    DisableBelowCurrent {
        rail: String,
        millivolts: i32,
        current: i32,
    },

    #[error("Rail {0} does not use in-band power management")]
    NotInBandPm(String),

    #[error("Rail {0} is not ready")]
    RailNotReady(String),

    #[error("Clock {0} has no alternate frequency table")]
    NoAltFreqs(String),

    #[error("No rail can be suspended: dependency order is blocked")]
    SuspendBlocked,

    // ============================================================================
    // Hardware Errors
    // ============================================================================
    #[error("Rail {0} is not connected to a regulator")]
    NotConnected(String),

    #[error("Failed to connect {rail} rail: {reason}")]
    RegulatorConnect {
        rail: String,
        reason: String,
    },

    #[error("Failed to set {rail} to {millivolts} mV: {reason}")]
    RegulatorSet {
        rail: String,
        millivolts: i32,
        reason: String,
    },

    #[error("Failed to read {rail} voltage: {reason}")]
    RegulatorGet {
        rail: String,
        reason: String,
    },

    #[error("Failed to switch {rail} supply: {reason}")]
    RegulatorEnable {
        rail: String,
        reason: String,
    },

    #[error("Regulator error: {0}")]
    Regulator(String),

    // ============================================================================
    // Convergence Errors
    // ============================================================================
    #[error("Rail {rail} didn't reach target {target} mV in {steps} steps ({millivolts} mV)")]
    TargetNotReached {
        rail: String,
        target: i32,
        steps: i32,
        millivolts: i32,
    },

    #[error("Rail {rail} did not settle after {iterations} iterations ({millivolts} mV, wants {pending} mV)")]
    NotConverged {
        rail: String,
        iterations: i32,
        millivolts: i32,
        pending: i32,
    },
}

impl DvfsError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a regulator service error from a string
    pub fn regulator(msg: impl Into<String>) -> Self {
        Self::Regulator(msg.into())
    }
}
