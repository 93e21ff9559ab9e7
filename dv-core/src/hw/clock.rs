//! Clock framework interface and rate-change events
//!
//! The host forwards clock notifications as [`RateChange`] values. Voltage
//! is raised before an upward rate change and lowered only after a downward
//! change has completed, so a clock never runs under-volted.

/// Read-only view of the clock framework
#[cfg_attr(test, mockall::automock)]
pub trait ClockProvider: Send + Sync {
    /// Clock is prepared or enabled, so its rate matters for the rail
    fn is_active(&self, clock: &str) -> bool;

    /// Current clock rate in Hz
    fn rate(&self, clock: &str) -> u64;
}

/// Phase of a clock rate change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePhase {
    Pre,
    Post,
    Abort,
}

/// A clock rate change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateChange {
    pub phase: RatePhase,
    pub old_rate: u64,
    pub new_rate: u64,
}

impl RateChange {
    pub fn pre(old_rate: u64, new_rate: u64) -> Self {
        Self { phase: RatePhase::Pre, old_rate, new_rate }
    }

    pub fn post(old_rate: u64, new_rate: u64) -> Self {
        Self { phase: RatePhase::Post, old_rate, new_rate }
    }

    /// Rate the rail must be sized for at this point, if it changes
    ///
    /// Upward changes act in the pre phase, downward changes in the post phase.
    pub fn voltage_rate(&self) -> Option<u64> {
        match self.phase {
            RatePhase::Pre if self.old_rate < self.new_rate => Some(self.new_rate),
            RatePhase::Post if self.old_rate > self.new_rate => Some(self.new_rate),
            _ => None,
        }
    }
}

/// System power-state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmEvent {
    SuspendPrepare,
    PostSuspend,
}

/// Reboot notifier events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    Restart,
    Halt,
    PowerOff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upward_change_acts_before() {
        assert_eq!(RateChange::pre(100, 200).voltage_rate(), Some(200));
        assert_eq!(RateChange::post(100, 200).voltage_rate(), None);
    }

    #[test]
    fn test_downward_change_acts_after() {
        assert_eq!(RateChange::pre(200, 100).voltage_rate(), None);
        assert_eq!(RateChange::post(200, 100).voltage_rate(), Some(100));
    }

    #[test]
    fn test_abort_is_ignored() {
        let change = RateChange { phase: RatePhase::Abort, old_rate: 100, new_rate: 200 };
        assert_eq!(change.voltage_rate(), None);
    }
}
