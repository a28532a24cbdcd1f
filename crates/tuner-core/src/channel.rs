//! Channel requests and the records drivers hand back
//!
//! A channel request is built by the caller and never mutated by a driver.
//! Digital requests carry a settings variant tagged by modulation, so a QAM
//! channel can only carry QAM parameters.

use crate::error::{Result, TunerError};

/// Digital modulation schemes
///
/// The ordinal of each variant is fixed; firmware capability masks are built
/// as `1 << ordinal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modulation {
    /// 8-level vestigial sideband (ATSC)
    Vsb8,
    /// 16-level vestigial sideband
    Vsb16,
    /// 16-QAM
    Qam16,
    /// 32-QAM
    Qam32,
    /// 64-QAM
    Qam64,
    /// 128-QAM
    Qam128,
    /// 256-QAM
    Qam256,
    /// QAM with automatic constellation detection
    QamAuto,
    /// Quadrature phase-shift keying (satellite)
    Qpsk,
    /// Coded OFDM (DVB-T)
    Ofdm,
}

impl Modulation {
    /// All modulations in ordinal order
    pub const ALL: [Modulation; 10] = [
        Modulation::Vsb8,
        Modulation::Vsb16,
        Modulation::Qam16,
        Modulation::Qam32,
        Modulation::Qam64,
        Modulation::Qam128,
        Modulation::Qam256,
        Modulation::QamAuto,
        Modulation::Qpsk,
        Modulation::Ofdm,
    ];

    /// Returns a human-readable name for the modulation
    pub fn name(&self) -> &'static str {
        match self {
            Modulation::Vsb8 => "8-VSB",
            Modulation::Vsb16 => "16-VSB",
            Modulation::Qam16 => "QAM-16",
            Modulation::Qam32 => "QAM-32",
            Modulation::Qam64 => "QAM-64",
            Modulation::Qam128 => "QAM-128",
            Modulation::Qam256 => "QAM-256",
            Modulation::QamAuto => "QAM-AUTO",
            Modulation::Qpsk => "QPSK",
            Modulation::Ofdm => "OFDM",
        }
    }

    /// Fixed ordinal, starting at 1 (0 is reserved for "unknown")
    pub fn ordinal(&self) -> u8 {
        match self {
            Modulation::Vsb8 => 1,
            Modulation::Vsb16 => 2,
            Modulation::Qam16 => 3,
            Modulation::Qam32 => 4,
            Modulation::Qam64 => 5,
            Modulation::Qam128 => 6,
            Modulation::Qam256 => 7,
            Modulation::QamAuto => 8,
            Modulation::Qpsk => 9,
            Modulation::Ofdm => 10,
        }
    }

    /// Capability bit used in firmware modulation masks
    pub fn capability(&self) -> u32 {
        1 << self.ordinal()
    }

    /// True for the VSB family
    pub fn is_vsb(&self) -> bool {
        matches!(self, Modulation::Vsb8 | Modulation::Vsb16)
    }

    /// True for the QAM family, including automatic detection
    pub fn is_qam(&self) -> bool {
        matches!(
            self,
            Modulation::Qam16
                | Modulation::Qam32
                | Modulation::Qam64
                | Modulation::Qam128
                | Modulation::Qam256
                | Modulation::QamAuto
        )
    }
}

impl std::fmt::Display for Modulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Spectral inversion handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Inversion {
    /// Spectrum is not inverted
    #[default]
    Off,
    /// Spectrum is inverted
    On,
    /// Let the demodulator detect inversion
    Auto,
}

/// Forward error correction code rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodeRate {
    #[default]
    Auto,
    Rate1_2,
    Rate2_3,
    Rate3_4,
    Rate5_6,
    Rate7_8,
}

/// ITU-T J.83 annex for cable QAM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QamAnnex {
    A,
    #[default]
    B,
    C,
}

/// OFDM sub-carrier constellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OfdmConstellation {
    #[default]
    Auto,
    Qpsk,
    Qam16,
    Qam64,
}

/// OFDM FFT size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransmissionMode {
    #[default]
    Auto,
    Mode2k,
    Mode8k,
}

/// OFDM guard interval as a fraction of the symbol length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuardInterval {
    #[default]
    Auto,
    Guard1_32,
    Guard1_16,
    Guard1_8,
    Guard1_4,
}

/// OFDM hierarchical modulation alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hierarchy {
    #[default]
    Auto,
    None,
    Alpha1,
    Alpha2,
    Alpha4,
}

/// Cable QAM parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QamSettings {
    /// Symbol rate in symbols per second, 0 for automatic
    pub symbol_rate: u32,
    pub annex: QamAnnex,
}

/// Satellite QPSK parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QpskSettings {
    /// Symbol rate in symbols per second
    pub symbol_rate: u32,
    pub fec_inner: CodeRate,
}

/// Terrestrial OFDM parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OfdmSettings {
    pub code_rate_hp: CodeRate,
    pub code_rate_lp: CodeRate,
    pub constellation: OfdmConstellation,
    pub transmission_mode: TransmissionMode,
    pub guard_interval: GuardInterval,
    pub hierarchy: Hierarchy,
}

/// Modulation-specific parameters, one variant per modulation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModulationSettings {
    /// VSB carries no extra parameters
    #[default]
    None,
    Qam(QamSettings),
    Qpsk(QpskSettings),
    Ofdm(OfdmSettings),
}

impl ModulationSettings {
    /// Default settings for a modulation
    pub fn default_for(modulation: Modulation) -> Self {
        match modulation {
            Modulation::Vsb8 | Modulation::Vsb16 => ModulationSettings::None,
            Modulation::Qpsk => ModulationSettings::Qpsk(QpskSettings::default()),
            Modulation::Ofdm => ModulationSettings::Ofdm(OfdmSettings::default()),
            _ => ModulationSettings::Qam(QamSettings::default()),
        }
    }

    /// True if this variant belongs to the given modulation
    pub fn matches(&self, modulation: Modulation) -> bool {
        match self {
            ModulationSettings::None => modulation.is_vsb(),
            ModulationSettings::Qam(_) => modulation.is_qam(),
            ModulationSettings::Qpsk(_) => modulation == Modulation::Qpsk,
            ModulationSettings::Ofdm(_) => modulation == Modulation::Ofdm,
        }
    }
}

/// A digital channel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DigitalChannel {
    modulation: Modulation,
    frequency_hz: u32,
    bandwidth_hz: u32,
    inversion: Inversion,
    settings: ModulationSettings,
}

impl DigitalChannel {
    /// Create a request with default settings for the modulation
    pub fn new(modulation: Modulation, frequency_hz: u32, bandwidth_hz: u32) -> Self {
        Self {
            modulation,
            frequency_hz,
            bandwidth_hz,
            inversion: Inversion::default(),
            settings: ModulationSettings::default_for(modulation),
        }
    }

    /// Replace the modulation-specific settings
    ///
    /// Fails with `InvalidArgument` when the settings variant does not
    /// belong to this channel's modulation.
    pub fn with_settings(mut self, settings: ModulationSettings) -> Result<Self> {
        if !settings.matches(self.modulation) {
            return Err(TunerError::InvalidArgument(format!(
                "{:?} settings do not apply to {}",
                settings, self.modulation
            )));
        }
        self.settings = settings;
        Ok(self)
    }

    /// Set spectral inversion handling
    pub fn with_inversion(mut self, inversion: Inversion) -> Self {
        self.inversion = inversion;
        self
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    pub fn bandwidth_hz(&self) -> u32 {
        self.bandwidth_hz
    }

    pub fn inversion(&self) -> Inversion {
        self.inversion
    }

    pub fn settings(&self) -> &ModulationSettings {
        &self.settings
    }
}

/// Analog video standards
///
/// Ordinals match analog firmware video masks (`1 << ordinal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VideoFormat {
    /// No video carrier (FM radio)
    None,
    NtscM,
    NtscN,
    NtscJ,
    Ntsc443,
    PalB,
    PalD,
    PalD1,
    PalG,
    PalH,
    PalI,
    PalK,
    PalN,
    PalNc,
    PalM,
    Pal60,
    SecamL,
    SecamLc,
    SecamB,
    SecamD,
    SecamG,
    SecamH,
    SecamK,
    SecamK1,
    SecamK3,
}

impl VideoFormat {
    /// Fixed ordinal used in firmware masks
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Capability bit used in firmware video masks
    pub fn capability(&self) -> u32 {
        1 << self.ordinal()
    }

    /// True for the 525-line standards that share NTSC timing
    pub fn is_525_line(&self) -> bool {
        matches!(
            self,
            VideoFormat::NtscM
                | VideoFormat::NtscN
                | VideoFormat::NtscJ
                | VideoFormat::Ntsc443
                | VideoFormat::PalM
                | VideoFormat::PalN
                | VideoFormat::PalNc
        )
    }
}

/// Analog audio standards
///
/// Ordinals match analog firmware audio masks (`1 << ordinal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AudioFormat {
    None,
    Auto,
    Btsc,
    Eiaj,
    A2,
    Nicam,
    FmMono,
    FmMonoNonUsa,
    FmMonoUsa,
    FmStereo,
    FmStereoNonUsa,
    FmStereoUsa,
    AmMono,
    AmStereo,
    BtscSap,
    EiajSap,
    A2Sap,
    NicamSap,
}

impl AudioFormat {
    /// Fixed ordinal used in firmware masks
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Capability bit used in firmware audio masks
    pub fn capability(&self) -> u32 {
        1 << self.ordinal()
    }

    /// True for FM broadcast radio formats
    pub fn is_fm_radio(&self) -> bool {
        matches!(
            self,
            AudioFormat::FmMono
                | AudioFormat::FmMonoNonUsa
                | AudioFormat::FmMonoUsa
                | AudioFormat::FmStereo
                | AudioFormat::FmStereoNonUsa
                | AudioFormat::FmStereoUsa
        )
    }
}

/// An analog channel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalogChannel {
    pub frequency_hz: u64,
    pub bandwidth_hz: u32,
    pub video: VideoFormat,
    pub audio: AudioFormat,
    /// Audio subcarrier offset from the video carrier
    pub audio_offset_hz: i32,
}

impl AnalogChannel {
    /// Create a television channel request
    pub fn tv(frequency_hz: u64, bandwidth_hz: u32, video: VideoFormat, audio: AudioFormat) -> Self {
        Self {
            frequency_hz,
            bandwidth_hz,
            video,
            audio,
            audio_offset_hz: 0,
        }
    }

    /// Create an FM radio request
    pub fn fm_radio(frequency_hz: u64, audio: AudioFormat) -> Self {
        Self {
            frequency_hz,
            bandwidth_hz: 200_000,
            video: VideoFormat::None,
            audio,
            audio_offset_hz: 0,
        }
    }

    /// True when this request selects FM radio rather than television
    pub fn is_fm_radio(&self) -> bool {
        self.video == VideoFormat::None && self.audio.is_fm_radio()
    }
}

/// Clocking of the transport stream interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClockMode {
    #[default]
    Normal,
    Punctured,
}

/// Clock edge on which data is valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClockPolarity {
    #[default]
    Negative,
    Positive,
}

/// Bit order on the transport stream interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitOrder {
    #[default]
    LsbFirst,
    MsbFirst,
}

/// Electrical contract between a demodulator and the capture hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterfaceNegotiation {
    pub input_width_bits: u8,
    pub clock: ClockMode,
    pub polarity: ClockPolarity,
    pub bit_order: BitOrder,
}

impl Default for InterfaceNegotiation {
    fn default() -> Self {
        Self {
            input_width_bits: 8,
            clock: ClockMode::Normal,
            polarity: ClockPolarity::Negative,
            bit_order: BitOrder::LsbFirst,
        }
    }
}

/// Signal quality, read live from the hardware on every call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalQuality {
    pub locked: bool,
    /// Strength in percent
    pub strength: f64,
    /// Signal-to-noise ratio in dB
    pub snr: f64,
    /// Bit error rate
    pub ber: f64,
    pub uncorrected_blocks: u32,
}
