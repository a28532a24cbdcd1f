//! Frequency band tables
//!
//! A PLL chip divides `(IF + RF) / step` down to its reference and needs the
//! band's control and bandswitch bytes alongside the divider. Tables are
//! sorted by upper bound, each band starting where the previous one ends; a
//! frequency on a shared boundary belongs to the lower band.

use tuner_core::{Result, TunerError};

/// Largest divider the synthesizer's 15-bit register can hold
pub const MAX_DIVIDER: u32 = 0x7FFF;

/// Control-byte mask kept when addressing the auxiliary register
const AUX_CONTROL_MASK: u8 = 0xC7;

/// Control-byte bits selecting the auxiliary register
const AUX_SELECT: u8 = 0x18;

/// Control-byte bit that puts the synthesizer in standby
pub const STANDBY_BIT: u8 = 0x01;

/// Status-byte bit reporting phase lock
pub const LOCK_BIT: u8 = 0x40;

/// One entry of a band table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyBand {
    pub min_hz: u32,
    pub max_hz: u32,
    pub step_hz: u32,
    pub control: u8,
    pub bandswitch: u8,
    /// Auxiliary register value, written ahead of the divider when present
    pub aux: Option<u8>,
}

impl FrequencyBand {
    pub const fn new(min_hz: u32, max_hz: u32, step_hz: u32, control: u8, bandswitch: u8) -> Self {
        Self {
            min_hz,
            max_hz,
            step_hz,
            control,
            bandswitch,
            aux: None,
        }
    }

    pub const fn with_aux(mut self, aux: u8) -> Self {
        self.aux = Some(aux);
        self
    }

    /// True when `frequency_hz` lies in `[min_hz, max_hz]`
    pub fn contains(&self, frequency_hz: u32) -> bool {
        (self.min_hz..=self.max_hz).contains(&frequency_hz)
    }

    /// Divider for `frequency_hz` with intermediate frequency `ifreq_hz`
    pub fn divider(&self, ifreq_hz: u32, frequency_hz: u32) -> Result<u16> {
        let divider = (u64::from(ifreq_hz) + u64::from(frequency_hz)) / u64::from(self.step_hz.max(1));
        if divider > u64::from(MAX_DIVIDER) {
            return Err(TunerError::InvalidArgument(format!(
                "divider {divider} for {frequency_hz} Hz exceeds {MAX_DIVIDER}"
            )));
        }
        Ok(divider as u16)
    }
}

/// Check a table is non-empty, ascending and gap-free
pub fn validate(bands: &[FrequencyBand]) -> Result<()> {
    if bands.is_empty() {
        return Err(TunerError::InvalidArgument("empty band table".to_string()));
    }
    for band in bands {
        if band.min_hz > band.max_hz || band.step_hz == 0 {
            return Err(TunerError::InvalidArgument(format!(
                "malformed band {}-{} Hz step {}",
                band.min_hz, band.max_hz, band.step_hz
            )));
        }
    }
    for pair in bands.windows(2) {
        if pair[1].min_hz != pair[0].max_hz {
            return Err(TunerError::InvalidArgument(format!(
                "band table not contiguous at {} Hz",
                pair[0].max_hz
            )));
        }
    }
    Ok(())
}

/// Find the band for `frequency_hz`
pub fn lookup(bands: &[FrequencyBand], frequency_hz: u32) -> Result<&FrequencyBand> {
    bands
        .iter()
        .find(|band| frequency_hz <= band.max_hz)
        .filter(|band| frequency_hz >= band.min_hz)
        .ok_or_else(|| {
            TunerError::InvalidArgument(format!("{frequency_hz} Hz is outside every band"))
        })
}

/// Register image staged by `set_channel` and committed by `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllRegisters {
    pub divider: u16,
    pub control: u8,
    pub bandswitch: u8,
    pub aux: Option<u8>,
}

impl PllRegisters {
    /// Registers for `frequency_hz` in `band`
    pub fn for_band(band: &FrequencyBand, ifreq_hz: u32, frequency_hz: u32) -> Result<Self> {
        Ok(Self {
            divider: band.divider(ifreq_hz, frequency_hz)?,
            control: band.control,
            bandswitch: band.bandswitch,
            aux: band.aux,
        })
    }

    /// Divider, control and bandswitch bytes in bus order
    pub fn bytes(&self) -> [u8; 4] {
        let [hi, lo] = self.divider.to_be_bytes();
        [hi, lo, self.control, self.bandswitch]
    }

    /// Same bytes with the standby bit set in the control byte
    pub fn standby_bytes(&self) -> [u8; 4] {
        let mut bytes = self.bytes();
        bytes[2] |= STANDBY_BIT;
        bytes
    }

    /// Auxiliary register write, if the band has one
    pub fn aux_bytes(&self) -> Option<[u8; 2]> {
        self.aux
            .map(|aux| [(self.control & AUX_CONTROL_MASK) | AUX_SELECT, aux])
    }
}
