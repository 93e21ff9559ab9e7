//! Locked entry points
//!
//! [`DvfsController`] owns the registry behind one mutex. Every public
//! operation takes the lock for its whole critical section; the only
//! exception is regulator lookup during [`DvfsController::start`], which may
//! block and runs with the lock released.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::data::{ClockSpec, RailSpec, ThermalKind};
use crate::display::{self, DvfsStatus};
use crate::engine::{ClockId, RailId, Registry, RelationshipDef, RelationshipId};
use crate::error::{DvfsError, Result};
use crate::hw::{ClockProvider, PmEvent, RateChange, RegulatorService, ShutdownKind};

/// Thread-safe DVFS coordinator
pub struct DvfsController {
    registry: Mutex<Registry>,
    regulator: Arc<dyn RegulatorService>,
    clocks: Arc<dyn ClockProvider>,
}

impl DvfsController {
    pub fn new(regulator: Arc<dyn RegulatorService>, clocks: Arc<dyn ClockProvider>) -> Self {
        Self {
            registry: Mutex::new(Registry::new(regulator.clone())),
            regulator,
            clocks,
        }
    }

    /// Run `f` with shared access to the registry under the lock
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.registry.lock())
    }

    // ============================================================================
    // Topology
    // ============================================================================

    pub fn init_rails(&self, specs: &[RailSpec]) -> Result<Vec<RailId>> {
        self.registry.lock().init_rails(specs)
    }

    pub fn add_relationships(&self, defs: Vec<RelationshipDef>) -> Result<Vec<RelationshipId>> {
        self.registry.lock().add_relationships(defs)
    }

    pub fn setup_dvfs(&self, spec: &ClockSpec) -> Result<ClockId> {
        self.registry.lock().setup_dvfs(spec)
    }

    pub fn add_alt_freqs(&self, clock: &str, freqs: &[u64], freqs_mult: u64) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.add_alt_freqs(id, freqs, freqs_mult)
    }

    pub fn rail_by_name(&self, name: &str) -> Option<RailId> {
        self.registry.lock().rail_by_name(name)
    }

    fn rail_id(reg: &Registry, name: &str) -> Result<RailId> {
        reg.rail_by_name(name)
            .ok_or_else(|| DvfsError::UnknownRail(name.to_string()))
    }

    fn clock_id(reg: &Registry, clock: &str) -> Result<ClockId> {
        reg.clock_by_name(clock)
            .ok_or_else(|| DvfsError::UnknownClock(clock.to_string()))
    }

    // ============================================================================
    // Start-up
    // ============================================================================

    /// Connect every rail, seed the bindings and bring the rails up
    ///
    /// A rail that fails to connect is put through the disable sequence and
    /// start-up stops there.
    pub fn start(&self) -> Result<()> {
        let mut reg = self.registry.lock();

        let ids: Vec<RailId> = reg.rail_ids().collect();
        for &id in &ids {
            let handle = match reg.needs_connect(id) {
                Some(name) => {
                    // Regulator lookup may block
                    let connected = parking_lot::MutexGuard::unlocked(&mut reg, || self.regulator.connect(&name));
                    match connected {
                        Ok(handle) => Some(handle),
                        Err(e) => {
                            error!("failed to connect {} rail: {}", name, e);
                            Self::abort_start(&mut reg, id);
                            return Err(e);
                        }
                    }
                }
                None => None,
            };

            if let Err(e) = reg.finish_connect(id, handle) {
                Self::abort_start(&mut reg, id);
                return Err(e);
            }
        }

        for &id in &ids {
            reg.config_rail_clocks(id, &*self.clocks);
            if let Err(e) = reg.force_enable(id) {
                warn!("{}: initial update failed: {}", reg.rails()[id.index()].name(), e);
            }
        }

        reg.mark_started();
        info!("dvfs started with {} rails", ids.len());
        Ok(())
    }

    fn abort_start(reg: &mut Registry, id: RailId) {
        if let Err(e) = reg.disable_rail(id) {
            debug!("{}: disable after failed connect: {}", reg.rails()[id.index()].name(), e);
        }
    }

    pub fn is_started(&self) -> bool {
        self.registry.lock().is_started()
    }

    // ============================================================================
    // Clock rates
    // ============================================================================

    /// Re-evaluate the clock's rail for a new rate; ignored before start
    pub fn set_rate(&self, clock: &str, rate: u64) -> Result<()> {
        let mut reg = self.registry.lock();
        if !reg.is_started() {
            return Ok(());
        }
        let id = Self::clock_id(&reg, clock)?;
        reg.set_rate(id, rate)
    }

    /// Clock rate-change notification
    ///
    /// Voltage goes up before a rate increase and down only after a rate
    /// decrease has completed. Unmanaged and idle clocks are ignored.
    pub fn on_rate_change(&self, clock: &str, change: &RateChange) -> Result<()> {
        let Some(rate) = change.voltage_rate() else {
            return Ok(());
        };
        if !self.clocks.is_active(clock) {
            return Ok(());
        }

        let mut reg = self.registry.lock();
        if !reg.is_started() {
            return Ok(());
        }
        let Some(id) = reg.clock_by_name(clock) else {
            return Ok(());
        };
        reg.set_rate(id, rate)
    }

    /// Rate used for the clock's voltage; 0 before start
    pub fn get_rate(&self, clock: &str) -> Result<u64> {
        let reg = self.registry.lock();
        if !reg.is_started() {
            return Ok(0);
        }
        let id = Self::clock_id(&reg, clock)?;
        Ok(reg.binding(id)?.cur_rate())
    }

    /// Safe voltage for running `clock` at `rate`
    pub fn predict_millivolts(&self, clock: &str, rate: u64) -> Result<i32> {
        let reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.binding(id)?.predict(rate)
    }

    /// Frequency table in effect
    pub fn freqs(&self, clock: &str) -> Result<Vec<u64>> {
        let reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        Ok(reg.binding(id)?.active_freqs().to_vec())
    }

    pub fn max_rate(&self, clock: &str) -> Result<u64> {
        let reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        Ok(reg.binding(id)?.max_rate())
    }

    pub fn round_rate(&self, clock: &str, rate: u64) -> Result<u64> {
        let reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        Ok(reg.binding(id)?.round_rate(rate))
    }

    pub fn use_alt_freqs(&self, clock: &str, use_alt: bool) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.use_alt_freqs(id, use_alt)
    }

    // ============================================================================
    // Hardware-controlled mode
    // ============================================================================

    pub fn is_hw_range(&self, clock: &str, rate: u64) -> Result<bool> {
        let reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        Ok(reg.binding(id)?.is_hw_range(rate))
    }

    pub fn set_hw_range(&self, clock: &str, range: i32) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.set_hw_range(id, range)
    }

    pub fn hw_threshold(&self, clock: &str) -> Result<Option<u64>> {
        let reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.hw_threshold(id)
    }

    pub fn hw_mode_set(&self, clock: &str, rate: u64) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.hw_mode_set(id, rate)
    }

    pub fn hw_mode_clear(&self, clock: &str, rate: u64) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::clock_id(&reg, clock)?;
        reg.hw_mode_clear(id, rate)
    }

    // ============================================================================
    // Thermal limits
    // ============================================================================

    pub fn count_thermal_states(&self, rail: &str, kind: ThermalKind) -> Result<usize> {
        let reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.count_thermal_states(id, kind)
    }

    pub fn thermal_index(&self, rail: &str, kind: ThermalKind) -> Result<usize> {
        let reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.thermal_index(id, kind)
    }

    /// Select a new thermal band on behalf of the temperature governor
    pub fn update_thermal_index(&self, rail: &str, kind: ThermalKind, index: usize) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.update_thermal_index(id, kind, index)
    }

    // ============================================================================
    // Rail power
    // ============================================================================

    pub fn enable_rail(&self, rail: &str) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.enable_rail(id)
    }

    pub fn disable_rail(&self, rail: &str) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.disable_rail(id)
    }

    pub fn is_rail_up(&self, rail: &str) -> Result<bool> {
        let reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.is_rail_up(id)
    }

    pub fn power_up(&self, rail: &str) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.power_up(id)
    }

    pub fn power_down(&self, rail: &str) -> Result<()> {
        let mut reg = self.registry.lock();
        let id = Self::rail_id(&reg, rail)?;
        reg.power_down(id)
    }

    // ============================================================================
    // System power events
    // ============================================================================

    pub fn suspend(&self) -> Result<()> {
        self.registry.lock().suspend_all()
    }

    pub fn resume(&self) {
        self.registry.lock().resume_all();
    }

    /// Suspend-prepare fails if the rails cannot be parked
    pub fn on_pm_event(&self, event: PmEvent) -> Result<()> {
        match event {
            PmEvent::SuspendPrepare => self.suspend(),
            PmEvent::PostSuspend => {
                self.resume();
                Ok(())
            }
        }
    }

    /// Park the rails before the system goes down
    pub fn on_shutdown(&self, kind: ShutdownKind) {
        info!("dvfs shutdown: {:?}", kind);
        if let Err(e) = self.suspend() {
            warn!("suspend on shutdown failed: {}", e);
        }
    }

    // ============================================================================
    // Debug
    // ============================================================================

    pub fn dump_tree(&self) -> String {
        display::dump_tree(&self.registry.lock())
    }

    pub fn dump_table(&self) -> String {
        display::dump_table(&self.registry.lock())
    }

    pub fn dump_stats(&self) -> String {
        display::dump_stats(&mut self.registry.lock())
    }

    pub fn status(&self) -> DvfsStatus {
        display::status(&self.registry.lock())
    }
}
