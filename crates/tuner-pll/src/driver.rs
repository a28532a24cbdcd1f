//! Generic PLL tuner driver
//!
//! `set_channel` only stages registers; nothing reaches the bus until
//! `start`, which writes the auxiliary byte (if the band has one), then the
//! divider/control/bandswitch group, then polls the status byte for lock.
//! Dropping a driver that has a channel staged puts the module in standby.

use tracing::{debug, trace, warn};
use tuner_core::{
    poll_until_locked, AnalogChannel, AnalogTuner, DelayNs, DigitalChannel, DigitalTuner,
    InterfaceNegotiation, Lifecycle, LockState, Result, StdDelay, Transport, TunerError,
    LOCK_POLL_INTERVAL_MS,
};

use crate::band::{self, PllRegisters, LOCK_BIT};
use crate::chips::{BandPlan, PllModel, Tuning};

/// Driver for a table-driven PLL tuner module
#[derive(Debug)]
pub struct PllDriver<T: Transport, P: BandPlan = PllModel, D: DelayNs = StdDelay> {
    bus: T,
    plan: P,
    delay: D,
    state: LockState,
    frequency_hz: u32,
    staged: Option<PllRegisters>,
}

impl<T: Transport, P: BandPlan> PllDriver<T, P, StdDelay> {
    /// Create a driver that sleeps the calling thread between polls
    pub fn new(bus: T, plan: P) -> Self {
        Self::with_delay(bus, plan, StdDelay)
    }
}

impl<T: Transport, P: BandPlan, D: DelayNs> PllDriver<T, P, D> {
    pub fn with_delay(bus: T, plan: P, delay: D) -> Self {
        Self {
            bus,
            plan,
            delay,
            state: LockState::Unconfigured,
            frequency_hz: 0,
            staged: None,
        }
    }

    pub fn plan(&self) -> &P {
        &self.plan
    }

    /// Registers that the next `start` will write
    pub fn staged(&self) -> Option<&PllRegisters> {
        self.staged.as_ref()
    }

    /// Frequency of the staged channel, 0 when unconfigured
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    fn stage(&mut self, frequency_hz: u32, regs: PllRegisters) {
        if self.state != LockState::Unconfigured
            && self.frequency_hz == frequency_hz
            && self.staged == Some(regs)
        {
            trace!("{}: {} Hz already staged", self.plan.name(), frequency_hz);
            return;
        }

        debug!(
            "{}: staged {} Hz as {:02X?} aux {:02X?}",
            self.plan.name(),
            frequency_hz,
            regs.bytes(),
            regs.aux_bytes()
        );
        self.staged = Some(regs);
        self.frequency_hz = frequency_hz;
        self.state = LockState::Configured;
    }

    fn staged_or_not_ready(&self) -> Result<PllRegisters> {
        self.staged.ok_or_else(|| {
            TunerError::NotReady(format!("{}: no channel staged", self.plan.name()))
        })
    }
}

impl<T: Transport, P: BandPlan, D: DelayNs> Lifecycle for PllDriver<T, P, D> {
    fn name(&self) -> &'static str {
        self.plan.name()
    }

    fn state(&self) -> LockState {
        self.state
    }

    fn start(&mut self, timeout_ms: u32) -> Result<()> {
        if self.state.check_start(self.plan.name())? {
            return Ok(());
        }
        let regs = self.staged_or_not_ready()?;

        if let Some(aux) = regs.aux_bytes() {
            self.bus.write(&aux)?;
        }
        self.bus.write(&regs.bytes())?;

        let bus = &mut self.bus;
        let locked = || -> Result<bool> {
            let mut status = [0u8; 1];
            bus.read(&mut status)?;
            trace!("pll status {:#04x}", status[0]);
            Ok(status[0] & LOCK_BIT != 0)
        };
        match poll_until_locked(&mut self.delay, timeout_ms, LOCK_POLL_INTERVAL_MS, locked) {
            Ok(waited_ms) => {
                debug!("{}: locked after {}ms", self.plan.name(), waited_ms);
                self.state = LockState::Locked;
                Ok(())
            }
            Err(e) => {
                warn!("{}: start failed: {}", self.plan.name(), e);
                Err(e)
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.state == LockState::Unconfigured {
            return Ok(());
        }
        let regs = self.staged_or_not_ready()?;
        self.bus.write(&regs.standby_bytes())?;
        self.state = LockState::Configured;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let stopped = self.stop();
        self.state = LockState::Unconfigured;
        self.frequency_hz = 0;
        self.staged = None;
        stopped
    }
}

impl<T: Transport, P: BandPlan, D: DelayNs> Drop for PllDriver<T, P, D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}: standby on drop failed: {}", self.plan.name(), e);
        }
    }
}

impl<T: Transport, P: BandPlan, D: DelayNs> DigitalTuner for PllDriver<T, P, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let frequency_hz = channel.frequency_hz();
        let regs = resolve(self.plan.digital(channel)?, frequency_hz)?;
        self.stage(frequency_hz, regs);
        Ok(InterfaceNegotiation::default())
    }
}

impl<T: Transport, P: BandPlan, D: DelayNs> AnalogTuner for PllDriver<T, P, D> {
    fn set_channel(&mut self, channel: &AnalogChannel) -> Result<()> {
        let frequency_hz = u32::try_from(channel.frequency_hz).map_err(|_| {
            TunerError::InvalidArgument(format!("{} Hz is out of range", channel.frequency_hz))
        })?;
        let regs = resolve(self.plan.analog(channel)?, frequency_hz)?;
        self.stage(frequency_hz, regs);
        Ok(())
    }
}

/// Look up the band and apply the plan's bandswitch adjustments
fn resolve(tuning: Tuning<'_>, frequency_hz: u32) -> Result<PllRegisters> {
    let band = band::lookup(tuning.bands, frequency_hz)?;
    let mut regs = PllRegisters::for_band(band, tuning.ifreq_hz, frequency_hz)?;
    regs.bandswitch = (regs.bandswitch | tuning.set_bandswitch) & !tuning.clear_bandswitch;
    Ok(regs)
}
