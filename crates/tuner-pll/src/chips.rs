//! Band plans for the supported PLL tuner modules
//!
//! A plan turns a channel request into the table, intermediate frequency and
//! bandswitch adjustments the driver stages. Modules differ only here.

use tuner_core::{AnalogChannel, DigitalChannel, Modulation, Result, TunerError, VideoFormat};

use crate::band::{self, FrequencyBand};

/// What a plan resolved a channel request to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning<'a> {
    pub bands: &'a [FrequencyBand],
    pub ifreq_hz: u32,
    /// Bits OR'd into the bandswitch byte after lookup
    pub set_bandswitch: u8,
    /// Bits cleared from the bandswitch byte after lookup
    pub clear_bandswitch: u8,
}

impl<'a> Tuning<'a> {
    pub fn new(bands: &'a [FrequencyBand], ifreq_hz: u32) -> Self {
        Self {
            bands,
            ifreq_hz,
            set_bandswitch: 0,
            clear_bandswitch: 0,
        }
    }

    fn set(mut self, bits: u8) -> Self {
        self.set_bandswitch |= bits;
        self
    }

    fn clear(mut self, bits: u8) -> Self {
        self.clear_bandswitch |= bits;
        self
    }
}

/// Maps channel requests onto a module's band tables
pub trait BandPlan {
    /// Short module name for logs
    fn name(&self) -> &'static str;

    fn digital(&self, channel: &DigitalChannel) -> Result<Tuning<'_>>;

    fn analog(&self, channel: &AnalogChannel) -> Result<Tuning<'_>>;
}

const MHZ: u32 = 1_000_000;
const IF_44_MHZ: u32 = 44 * MHZ;
const IF_36_125_MHZ: u32 = 36_125_000;
const IF_36_167_MHZ: u32 = 36_166_667;
const IF_FM_RADIO: u32 = 41_300_000;

const TUV1236D_DIGITAL: [FrequencyBand; 3] = [
    FrequencyBand::new(54_000_000, 157_250_000, 62_500, 0xC6, 0x41),
    FrequencyBand::new(157_250_000, 454_000_000, 62_500, 0xC6, 0x42),
    FrequencyBand::new(454_000_000, 895_000_000, 62_500, 0xC6, 0x44),
];

const TUV1236D_ANALOG: [FrequencyBand; 3] = [
    FrequencyBand::new(54_000_000, 157_250_000, 62_500, 0xCE, 0x01),
    FrequencyBand::new(157_250_000, 454_000_000, 62_500, 0xCE, 0x02),
    FrequencyBand::new(454_000_000, 895_000_000, 62_500, 0xCE, 0x04),
];

const FMD1216ME_DIGITAL: [FrequencyBand; 7] = [
    FrequencyBand::new(50_870_000, 143_870_000, 166_667, 0xBC, 0x41).with_aux(0xA0),
    FrequencyBand::new(143_870_000, 158_870_000, 166_667, 0xF4, 0x41).with_aux(0xA0),
    FrequencyBand::new(158_870_000, 329_870_000, 166_667, 0xBC, 0x42).with_aux(0xA0),
    FrequencyBand::new(329_870_000, 441_870_000, 166_667, 0xF4, 0x42).with_aux(0xA0),
    FrequencyBand::new(441_870_000, 625_870_000, 166_667, 0xBC, 0x44).with_aux(0xA0),
    FrequencyBand::new(625_870_000, 803_870_000, 166_667, 0xF4, 0x44).with_aux(0xA0),
    FrequencyBand::new(803_870_000, 858_000_000, 166_667, 0xFC, 0x44).with_aux(0xA0),
];

const FMD1216ME_FM: [FrequencyBand; 1] =
    [FrequencyBand::new(50_870_000, 858_000_000, 50_000, 0x80, 0x99)];

const FMD1216ME_ANALOG: [FrequencyBand; 3] = [
    FrequencyBand::new(50_870_000, 158_870_000, 62_500, 0x8E, 0x01),
    FrequencyBand::new(158_870_000, 441_870_000, 62_500, 0x8E, 0x02),
    FrequencyBand::new(441_870_000, 858_000_000, 62_500, 0x8E, 0x04),
];

/// FMD1216ME channels of 8 MHz at or above this frequency use the wide filter
const FMD1216ME_WIDE_FROM_HZ: u32 = 158_870_000;

const DTT7612: [FrequencyBand; 3] = [
    FrequencyBand::new(57_000_000, 147_000_000, 62_500, 0x8E, 0x39).with_aux(0x50),
    FrequencyBand::new(147_000_000, 417_000_000, 62_500, 0x8E, 0x3A).with_aux(0x50),
    FrequencyBand::new(417_000_000, 863_000_000, 62_500, 0x8E, 0x3C).with_aux(0x50),
];

const DTT7612_FM: [FrequencyBand; 3] = [
    FrequencyBand::new(57_000_000, 147_000_000, 50_000, 0x88, 0x39).with_aux(0x50),
    FrequencyBand::new(147_000_000, 417_000_000, 50_000, 0x88, 0x3A).with_aux(0x50),
    FrequencyBand::new(417_000_000, 863_000_000, 50_000, 0x88, 0x3C).with_aux(0x50),
];

const LGH064F: [FrequencyBand; 3] = [
    FrequencyBand::new(54_000_000, 165_000_000, 62_500, 0xCE, 0x01).with_aux(0x50),
    FrequencyBand::new(165_000_000, 450_000_000, 62_500, 0xCE, 0x02).with_aux(0x50),
    FrequencyBand::new(450_000_000, 863_000_000, 62_500, 0xCE, 0x04).with_aux(0x50),
];

const DTT75105: [FrequencyBand; 5] = [
    FrequencyBand::new(177_000_000, 264_000_000, 166_667, 0xB4, 0x02),
    FrequencyBand::new(264_000_000, 470_000_000, 166_667, 0xBC, 0x02),
    FrequencyBand::new(470_000_000, 735_000_000, 166_667, 0xBC, 0x08),
    FrequencyBand::new(735_000_000, 835_000_000, 166_667, 0xF4, 0x08),
    FrequencyBand::new(835_000_000, 896_000_000, 166_667, 0xFC, 0x08),
];

const DTT7579: [FrequencyBand; 4] = [
    FrequencyBand::new(177_000_000, 443_250_000, 166_667, 0xB4, 0x02),
    FrequencyBand::new(443_250_000, 542_000_000, 166_667, 0xB4, 0x08),
    FrequencyBand::new(542_000_000, 771_000_000, 166_667, 0xBC, 0x08),
    FrequencyBand::new(771_000_000, 858_000_000, 166_667, 0xF4, 0x08),
];

/// Supported PLL tuner modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PllModel {
    /// Philips TUV1236D ATSC/NTSC
    Tuv1236d,
    /// Philips FMD1216ME hybrid with FM radio
    Fmd1216me,
    /// Thomson DTT7612 with FM radio
    Dtt7612,
    /// LG TDVS-H064F
    Lgh064f,
    /// Thomson DTT75105 DVB-T
    Dtt75105,
    /// Thomson DTT7579 DVB-T
    Dtt7579,
}

impl PllModel {
    pub const ALL: [PllModel; 6] = [
        PllModel::Tuv1236d,
        PllModel::Fmd1216me,
        PllModel::Dtt7612,
        PllModel::Lgh064f,
        PllModel::Dtt75105,
        PllModel::Dtt7579,
    ];

    /// Every band table this module uses
    pub fn tables(&self) -> &'static [&'static [FrequencyBand]] {
        const TUV1236D: &[&[FrequencyBand]] = &[&TUV1236D_DIGITAL, &TUV1236D_ANALOG];
        const FMD1216ME: &[&[FrequencyBand]] =
            &[&FMD1216ME_DIGITAL, &FMD1216ME_FM, &FMD1216ME_ANALOG];
        const DTT7612_ALL: &[&[FrequencyBand]] = &[&DTT7612, &DTT7612_FM];
        match self {
            PllModel::Tuv1236d => TUV1236D,
            PllModel::Fmd1216me => FMD1216ME,
            PllModel::Dtt7612 => DTT7612_ALL,
            PllModel::Lgh064f => &[&LGH064F],
            PllModel::Dtt75105 => &[&DTT75105],
            PllModel::Dtt7579 => &[&DTT7579],
        }
    }
}

fn fmd1216me_wide(bandwidth_hz: u32, frequency_hz: u64) -> u8 {
    if bandwidth_hz == 8 * MHZ && frequency_hz >= u64::from(FMD1216ME_WIDE_FROM_HZ) {
        0x08
    } else {
        0
    }
}

fn dtt75105_narrow(bandwidth_hz: u32) -> u8 {
    if bandwidth_hz == 7 * MHZ {
        0x10
    } else {
        0
    }
}

impl BandPlan for PllModel {
    fn name(&self) -> &'static str {
        match self {
            PllModel::Tuv1236d => "TUV1236D",
            PllModel::Fmd1216me => "FMD1216ME",
            PllModel::Dtt7612 => "DTT7612",
            PllModel::Lgh064f => "LGH064F",
            PllModel::Dtt75105 => "DTT75105",
            PllModel::Dtt7579 => "DTT7579",
        }
    }

    fn digital(&self, channel: &DigitalChannel) -> Result<Tuning<'_>> {
        let tuning = match self {
            PllModel::Tuv1236d => {
                let tuning = Tuning::new(&TUV1236D_DIGITAL, IF_44_MHZ);
                if channel.modulation() == Modulation::Vsb8 {
                    tuning.clear(0x08)
                } else {
                    tuning.set(0x08)
                }
            }
            PllModel::Fmd1216me => Tuning::new(&FMD1216ME_DIGITAL, IF_36_125_MHZ).set(
                fmd1216me_wide(channel.bandwidth_hz(), u64::from(channel.frequency_hz())),
            ),
            PllModel::Dtt7612 => Tuning::new(&DTT7612, IF_44_MHZ),
            PllModel::Lgh064f => Tuning::new(&LGH064F, IF_44_MHZ),
            PllModel::Dtt75105 => {
                Tuning::new(&DTT75105, IF_36_167_MHZ).set(dtt75105_narrow(channel.bandwidth_hz()))
            }
            PllModel::Dtt7579 => Tuning::new(&DTT7579, IF_36_167_MHZ),
        };
        Ok(tuning)
    }

    fn analog(&self, channel: &AnalogChannel) -> Result<Tuning<'_>> {
        let tuning = match self {
            PllModel::Tuv1236d => Tuning::new(&TUV1236D_ANALOG, IF_44_MHZ),
            PllModel::Fmd1216me if channel.is_fm_radio() => Tuning::new(&FMD1216ME_FM, IF_FM_RADIO),
            PllModel::Fmd1216me => {
                let ifreq_hz = match channel.video {
                    VideoFormat::NtscM
                    | VideoFormat::NtscN
                    | VideoFormat::Ntsc443
                    | VideoFormat::PalM
                    | VideoFormat::PalNc => IF_44_MHZ,
                    _ => IF_36_125_MHZ,
                };
                Tuning::new(&FMD1216ME_ANALOG, ifreq_hz)
                    .set(fmd1216me_wide(channel.bandwidth_hz, channel.frequency_hz))
            }
            PllModel::Dtt7612 if channel.is_fm_radio() => Tuning::new(&DTT7612_FM, IF_FM_RADIO),
            PllModel::Dtt7612 => Tuning::new(&DTT7612, IF_44_MHZ),
            PllModel::Lgh064f => Tuning::new(&LGH064F, IF_44_MHZ),
            PllModel::Dtt75105 => {
                Tuning::new(&DTT75105, IF_36_167_MHZ).set(dtt75105_narrow(channel.bandwidth_hz))
            }
            PllModel::Dtt7579 => Tuning::new(&DTT7579, IF_36_167_MHZ),
        };
        Ok(tuning)
    }
}

/// A single-table plan for boards not covered by [`PllModel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPlan {
    name: &'static str,
    bands: Vec<FrequencyBand>,
    ifreq_hz: u32,
}

impl FixedPlan {
    /// Build a plan, rejecting unsorted or gapped tables
    pub fn new(name: &'static str, bands: Vec<FrequencyBand>, ifreq_hz: u32) -> Result<Self> {
        band::validate(&bands)?;
        Ok(Self {
            name,
            bands,
            ifreq_hz,
        })
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }
}

impl BandPlan for FixedPlan {
    fn name(&self) -> &'static str {
        self.name
    }

    fn digital(&self, _channel: &DigitalChannel) -> Result<Tuning<'_>> {
        Ok(Tuning::new(&self.bands, self.ifreq_hz))
    }

    fn analog(&self, channel: &AnalogChannel) -> Result<Tuning<'_>> {
        if channel.is_fm_radio() {
            return Err(TunerError::Unsupported(format!(
                "{}: no FM radio band",
                self.name
            )));
        }
        Ok(Tuning::new(&self.bands, self.ifreq_hz))
    }
}
