//! TDA18271 driver
//!
//! Construction detects the silicon revision and runs the image-rejection
//! calibration; the second revision also measures its RF tracking-filter
//! curve and die temperature. Tuning calls program the chip immediately, so
//! `start` only confirms that a channel has been set.

use std::fmt;

use tracing::{debug, info, warn};
use tuner_core::{
    AnalogChannel, AnalogTuner, DelayNs, DigitalChannel, DigitalTuner, InterfaceNegotiation,
    Lifecycle, LockState, Modulation, Result, StdDelay, Transport, TunerError, VideoFormat,
};

use crate::curve::FilterCurve;
use crate::regs::{Reg, RegisterFile};
use crate::tables::RF_BANDS;

const NAME: &str = "TDA18271";

/// Silicon revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    V1,
    V2,
}

impl Version {
    /// Decode the ID register
    pub fn from_id(id: u8) -> Result<Self> {
        match id & 0x7F {
            0x03 => Ok(Version::V1),
            0x04 => Ok(Version::V2),
            other => Err(TunerError::DeviceNotFound(format!(
                "{NAME}: unknown chip ID {other:#04x}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Version::V1 => "v1",
            Version::V2 => "v2",
        }
    }
}

/// Role of this tuner when two share a reference crystal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    #[default]
    Single,
    /// Drives the crystal output for a slave
    Master,
    /// Runs the main synthesizer from the calibration PLL
    Slave,
}

/// IF output programming for one channel
///
/// Filled from the channel's standard and bandwidth, then handed to the
/// board hook (if any) for adjustment before it reaches the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IfSettings {
    pub ifreq_hz: u32,
    /// Standard code, 3 bits
    pub std: u8,
    /// AGC mode, 2 bits
    pub agc_mode: u8,
    /// IF output level, 3 bits
    pub if_level: u8,
    pub fm_rfn: bool,
    pub if_notch: bool,
    /// RF AGC take-over point, 7 bits
    pub rf_agc_top: u8,
}

impl IfSettings {
    /// Settings for a digital channel
    pub fn digital(version: Version, channel: &DigitalChannel) -> Result<Self> {
        let v1 = version == Version::V1;
        let (ifreq_hz, std) = match (channel.modulation(), channel.bandwidth_hz()) {
            (Modulation::Vsb8 | Modulation::Vsb16, _) => (3_250_000, 0x04),
            (Modulation::Ofdm, 6_000_000) => (3_300_000, 0x04),
            (Modulation::Ofdm, 7_000_000) if v1 => (3_800_000, 0x05),
            (Modulation::Ofdm, 7_000_000) => (3_500_000, 0x04),
            (Modulation::Ofdm, 8_000_000) if v1 => (4_300_000, 0x06),
            (Modulation::Ofdm, 8_000_000) => (4_000_000, 0x05),
            (m, 6_000_000) if m.is_qam() => (4_000_000, 0x05),
            (m, 8_000_000) if m.is_qam() => (5_000_000, 0x07),
            (m, bw) => {
                return Err(TunerError::InvalidArgument(format!(
                    "{NAME}: {m} at {bw} Hz bandwidth is not supported"
                )))
            }
        };
        Ok(Self {
            ifreq_hz,
            std,
            agc_mode: 3,
            if_level: 1,
            fm_rfn: false,
            if_notch: true,
            rf_agc_top: 0x37,
        })
    }

    /// Settings for an analog television or FM radio channel
    pub fn analog(version: Version, channel: &AnalogChannel) -> Result<Self> {
        let v1 = version == Version::V1;
        let tv = |v1_if: u32, v1_std: u8, v2_if: u32, v2_std: u8| {
            let (ifreq_hz, std) = if v1 { (v1_if, v1_std) } else { (v2_if, v2_std) };
            Self {
                ifreq_hz,
                std,
                agc_mode: 1,
                if_level: 0,
                fm_rfn: false,
                if_notch: false,
                rf_agc_top: 0x2C,
            }
        };
        let settings = match channel.video {
            VideoFormat::NtscM
            | VideoFormat::NtscN
            | VideoFormat::NtscJ
            | VideoFormat::PalN
            | VideoFormat::PalNc
            | VideoFormat::PalM => tv(5_750_000, 0x05, 5_400_000, 0x04),
            VideoFormat::PalB | VideoFormat::SecamB => tv(6_750_000, 0x06, 6_000_000, 0x05),
            VideoFormat::PalD
            | VideoFormat::PalD1
            | VideoFormat::PalK
            | VideoFormat::SecamD
            | VideoFormat::SecamK
            | VideoFormat::SecamK1
            | VideoFormat::SecamL => tv(7_750_000, 0x07, 6_900_000, 0x06),
            VideoFormat::PalG | VideoFormat::PalH | VideoFormat::SecamG | VideoFormat::SecamH => {
                tv(7_750_000, 0x07, 7_100_000, 0x06)
            }
            VideoFormat::PalI => tv(7_750_000, 0x07, 7_250_000, 0x06),
            VideoFormat::SecamLc => tv(1_250_000, 0x07, 1_250_000, 0x06),
            VideoFormat::None if channel.audio.is_fm_radio() => Self {
                ifreq_hz: 1_250_000,
                std: 0x00,
                agc_mode: 3,
                if_level: 0,
                fm_rfn: true,
                if_notch: false,
                rf_agc_top: 0x2C,
            },
            other => {
                return Err(TunerError::InvalidArgument(format!(
                    "{NAME}: {other:?} with {:?} audio is not supported",
                    channel.audio
                )))
            }
        };
        Ok(settings)
    }
}

/// Board hook that may adjust the IF settings for a channel
pub type IfHook<C> = Box<dyn FnMut(&C, &mut IfSettings) -> Result<()> + Send>;

/// Driver for one TDA18271 tuner
pub struct Tda18271<T: Transport, D: DelayNs = StdDelay> {
    pub(crate) bus: T,
    pub(crate) delay: D,
    pub(crate) version: Version,
    pub(crate) mode: Mode,
    pub(crate) regs: RegisterFile,
    pub(crate) curve: [FilterCurve; RF_BANDS.len()],
    /// Die temperature when the curve was measured
    pub(crate) cal_temp_c: u8,
    /// Set once the ID register named a known revision
    pub(crate) present: bool,
    calibrated: bool,
    state: LockState,
    tuned: Option<(u32, IfSettings)>,
    analog_hook: Option<IfHook<AnalogChannel>>,
    digital_hook: Option<IfHook<DigitalChannel>>,
}

impl<T: Transport, D: DelayNs> fmt::Debug for Tda18271<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tda18271")
            .field("version", &self.version)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("calibrated", &self.calibrated)
            .field("tuned", &self.tuned)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Tda18271<T, StdDelay> {
    /// Identify and calibrate the chip, sleeping the calling thread between steps
    pub fn new(bus: T, mode: Mode) -> Result<Self> {
        Self::with_delay(bus, StdDelay, mode)
    }
}

impl<T: Transport, D: DelayNs> Tda18271<T, D> {
    /// Identify and calibrate the chip
    ///
    /// Fails with `DeviceNotFound` when the ID register names neither
    /// revision.
    pub fn with_delay(bus: T, delay: D, mode: Mode) -> Result<Self> {
        let mut tuner = Self {
            bus,
            delay,
            version: Version::V1,
            mode,
            regs: RegisterFile::new(),
            curve: [FilterCurve::default(); RF_BANDS.len()],
            cal_temp_c: 0,
            present: false,
            calibrated: false,
            state: LockState::Unconfigured,
            tuned: None,
            analog_hook: None,
            digital_hook: None,
        };
        tuner.initialize()?;
        Ok(tuner)
    }

    /// Install a hook run on the IF settings of every analog channel
    pub fn with_analog_hook(
        mut self,
        hook: impl FnMut(&AnalogChannel, &mut IfSettings) -> Result<()> + Send + 'static,
    ) -> Self {
        self.analog_hook = Some(Box::new(hook));
        self
    }

    /// Install a hook run on the IF settings of every digital channel
    pub fn with_digital_hook(
        mut self,
        hook: impl FnMut(&DigitalChannel, &mut IfSettings) -> Result<()> + Send + 'static,
    ) -> Self {
        self.digital_hook = Some(Box::new(hook));
        self
    }

    pub fn get_version(&self) -> Version {
        self.version
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Fitted tracking-filter curve per RF sub-band (second revision only)
    pub fn filter_curve(&self) -> &[FilterCurve] {
        &self.curve
    }

    /// Die temperature recorded at calibration, in °C
    pub fn calibration_temperature(&self) -> u8 {
        self.cal_temp_c
    }

    /// Shadow register file
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Frequency of the last successful tuning call, 0 when unconfigured
    pub fn frequency_hz(&self) -> u32 {
        self.tuned.map_or(0, |(f, _)| f)
    }

    fn initialize(&mut self) -> Result<()> {
        self.calibrated = false;
        self.curve = [FilterCurve::default(); RF_BANDS.len()];
        self.cal_temp_c = 0;

        self.init_regs()?;
        if self.version == Version::V2 {
            self.calc_rf_filter_curve()?;
            self.power_on_reset()?;
        }
        self.calibrated = true;
        info!("{} {} calibrated", NAME, self.version.name());
        Ok(())
    }

    fn tune(&mut self, frequency_hz: u32, ifc: IfSettings) -> Result<()> {
        if !self.calibrated {
            return Err(TunerError::NotReady(format!(
                "{NAME}: calibration failed, reset required"
            )));
        }
        if self.state != LockState::Unconfigured && self.tuned == Some((frequency_hz, ifc)) {
            debug!("{}: {} Hz already tuned", NAME, frequency_hz);
            return Ok(());
        }
        self.tuned = None;
        self.state = LockState::Unconfigured;
        self.set_rf(frequency_hz, &ifc)?;
        self.tuned = Some((frequency_hz, ifc));
        self.state = LockState::Configured;
        Ok(())
    }

    /// Program the tracking filter, IF stage and synthesizer for `frequency_hz`
    fn set_rf(&mut self, frequency_hz: u32, ifc: &IfSettings) -> Result<()> {
        debug!(
            "{}: tuning {} Hz, IF {} Hz std {:#x}",
            NAME, frequency_hz, ifc.ifreq_hz, ifc.std
        );
        match self.version {
            Version::V1 => self.rf_tracking_filter_calibration(frequency_hz)?,
            Version::V2 => self.rf_tracking_filter_correction(frequency_hz)?,
        }

        let regs = &mut self.regs;
        regs[Reg::EasyProg3] = (regs[Reg::EasyProg3] & 0xE0) | ((ifc.agc_mode & 0x03) << 3) | (ifc.std & 0x07);
        if self.version == Version::V2 {
            regs[Reg::EasyProg3] &= 0xFB;
        }
        regs[Reg::EasyProg4] =
            (regs[Reg::EasyProg4] & 0x60) | (u8::from(ifc.fm_rfn) << 7) | ((ifc.if_level & 0x07) << 2);
        regs[Reg::Ext22] = ifc.rf_agc_top & 0x7F;
        regs.write_one(&mut self.bus, Reg::Ext22)?;
        self.regs[Reg::EasyProg1] |= 0x40;
        self.regs[Reg::Thermo] &= 0xE0;

        self.update_ir_measure(frequency_hz)?;
        self.update_bp_filter(frequency_hz)?;
        self.update_rf_band(frequency_hz)?;
        self.update_gain_taper(frequency_hz)?;

        self.regs[Reg::Ext1] &= 0xF8;
        if self.mode != Mode::Slave {
            self.regs[Reg::Ext1] |= 0x04;
        }
        self.regs.write_one(&mut self.bus, Reg::Ext1)?;

        let pll_hz = ifc.ifreq_hz.checked_add(frequency_hz).ok_or_else(|| {
            TunerError::InvalidArgument(format!("{NAME}: {frequency_hz} Hz is out of range"))
        })?;
        self.regs[Reg::PostDiv] = u8::from(ifc.if_notch) << 7;
        // The slave runs its mixer from the calibration PLL and pulses EXT7;
        // everyone else uses the main PLL and pulses EXT4.
        let pulse = if self.mode == Mode::Slave {
            self.calc_cal_pll(pll_hz)?;
            self.regs[Reg::PostDiv] |= self.regs[Reg::CalPostDiv] & 0x7F;
            self.regs.write_one(&mut self.bus, Reg::PostDiv)?;
            Reg::Ext7
        } else {
            self.calc_main_pll(pll_hz)?;
            Reg::Ext4
        };
        self.regs.write(&mut self.bus, Reg::Thermo, Reg::EasyProg5)?;
        self.regs[pulse] |= 0x20;
        self.regs.write_one(&mut self.bus, pulse)?;
        self.delay.delay_ms(1);
        self.regs[pulse] &= 0xDF;
        self.regs.write_one(&mut self.bus, pulse)?;
        self.delay.delay_ms(20);

        if self.version == Version::V2 {
            self.regs[Reg::EasyProg3] &= 0xFB;
            if !ifc.fm_rfn {
                self.regs[Reg::EasyProg3] |= 0x04;
            }
            self.regs.write_one(&mut self.bus, Reg::EasyProg3)?;
        }
        Ok(())
    }

    /// Put the chip into standby with the given EP3 mode bits
    fn standby(&mut self, bits: u8) -> Result<()> {
        self.regs[Reg::EasyProg3] = (self.regs[Reg::EasyProg3] & 0x1F) | bits;
        self.regs.write_one(&mut self.bus, Reg::EasyProg3)
    }
}

impl<T: Transport, D: DelayNs> Drop for Tda18271<T, D> {
    fn drop(&mut self) {
        if !self.present {
            return;
        }
        if let Err(e) = self.standby(0xC0) {
            warn!("{}: power down failed: {}", NAME, e);
        }
    }
}

impl<T: Transport, D: DelayNs> Lifecycle for Tda18271<T, D> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> LockState {
        self.state
    }

    fn start(&mut self, _timeout_ms: u32) -> Result<()> {
        if self.state.check_start(NAME)? {
            return Ok(());
        }
        // The synthesizer settles inside set_rf; there is no lock flag to poll.
        self.state = LockState::Locked;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.state == LockState::Unconfigured {
            return Ok(());
        }
        self.standby(0x80)?;
        self.state = LockState::Configured;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let stopped = self.stop();
        self.state = LockState::Unconfigured;
        self.tuned = None;
        if let Err(e) = self.initialize() {
            warn!("{}: recalibration failed: {}", NAME, e);
            return Err(e);
        }
        stopped
    }
}

impl<T: Transport, D: DelayNs> DigitalTuner for Tda18271<T, D> {
    fn set_channel(&mut self, channel: &DigitalChannel) -> Result<InterfaceNegotiation> {
        let mut ifc = IfSettings::digital(self.version, channel)?;
        if let Some(hook) = self.digital_hook.as_mut() {
            hook(channel, &mut ifc)?;
        }
        self.tune(channel.frequency_hz(), ifc)?;
        Ok(InterfaceNegotiation::default())
    }
}

impl<T: Transport, D: DelayNs> AnalogTuner for Tda18271<T, D> {
    fn set_channel(&mut self, channel: &AnalogChannel) -> Result<()> {
        let frequency_hz = u32::try_from(channel.frequency_hz).map_err(|_| {
            TunerError::InvalidArgument(format!("{} Hz is out of range", channel.frequency_hz))
        })?;
        let mut ifc = IfSettings::analog(self.version, channel)?;
        if let Some(hook) = self.analog_hook.as_mut() {
            hook(channel, &mut ifc)?;
        }
        self.tune(frequency_hz, ifc)
    }
}
