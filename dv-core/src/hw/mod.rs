//! Hardware service interfaces
//!
//! The regulator and clock frameworks are external collaborators; the engine
//! only sees them through these traits.

mod clock;
mod regulator;
pub mod sim;

pub use clock::{ClockProvider, PmEvent, RateChange, RatePhase, ShutdownKind};
pub use regulator::{RegulatorHandle, RegulatorService};
pub(crate) use regulator::{get_millivolts, set_millivolts};
pub use sim::{SimClocks, SimRegulator, VoltageWrite};

#[cfg(test)]
pub use clock::MockClockProvider;
#[cfg(test)]
pub use regulator::MockRegulatorService;
