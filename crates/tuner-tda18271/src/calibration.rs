//! Chip-level calibration routines
//!
//! Each routine edits the shadow register file and writes the affected
//! range; dependent writes are separated by the settling delays the chip
//! needs. The first bus error aborts the routine.

use tracing::{debug, info, trace};
use tuner_core::{DelayNs, Result, Transport, TunerError};

use crate::curve::{self, Anchor, FilterCurve};
use crate::driver::{Tda18271, Version};
use crate::regs::{Reg, RegisterFile};
use crate::tables::{self, ByteEntry, CidTarget, PllEntry};

/// Powerscan sweep step
const SWEEP_STEP_KHZ: u32 = 200;

/// Offset of the main PLL above the frequency under measurement
const MEASURE_OFFSET_HZ: u32 = 1_000_000;

/// Highest frequency the first revision recalibrates with a factory code
const V1_LOW_BAND_MAX_HZ: u32 = 61_100_000;

/// Register values for one image-rejection calibration band
struct ImageRejectionBand {
    name: &'static str,
    /// EP5, CAL_POSTDIV, CAL_DIV1, CAL_DIV2, POSTDIV, DIV1, DIV2
    prepare: [u8; 7],
    /// EP5, CAL_POSTDIV, CAL_DIV1, CAL_DIV2
    launch: [u8; 4],
}

const IMAGE_REJECTION_BANDS: [ImageRejectionBand; 3] = [
    ImageRejectionBand {
        name: "low",
        prepare: [0x81, 0xCC, 0x6C, 0x00, 0xCD, 0x77, 0x08],
        launch: [0x85, 0xCB, 0x66, 0x70],
    },
    ImageRejectionBand {
        name: "mid",
        prepare: [0x82, 0xA8, 0x66, 0x00, 0xA9, 0x73, 0x1A],
        launch: [0x86, 0xA8, 0x66, 0xA0],
    },
    ImageRejectionBand {
        name: "high",
        prepare: [0x83, 0x98, 0x65, 0x00, 0x99, 0x71, 0xCD],
        launch: [0x87, 0x98, 0x65, 0x50],
    },
];

fn out_of_range(what: &str, frequency_hz: u32) -> TunerError {
    TunerError::InvalidArgument(format!(
        "TDA18271: {frequency_hz} Hz is outside the {what} table"
    ))
}

fn byte_or_invalid(table: &[ByteEntry], what: &str, frequency_hz: u32) -> Result<u8> {
    tables::byte_for(table, frequency_hz).ok_or_else(|| out_of_range(what, frequency_hz))
}

/// Synthesizer divider register value for `frequency_hz`
pub(crate) fn pll_divider(entry: &PllEntry, frequency_hz: u32) -> u32 {
    (((u64::from(entry.div) * u64::from(frequency_hz / 1000)) << 7) / 125) as u32
}

impl<T: Transport, D: DelayNs> Tda18271<T, D> {
    fn write(&mut self, start: Reg, end: Reg) -> Result<()> {
        self.regs.write(&mut self.bus, start, end)
    }

    fn write_one(&mut self, reg: Reg) -> Result<()> {
        self.regs.write_one(&mut self.bus, reg)
    }

    fn read_one(&mut self, reg: Reg) -> Result<u8> {
        self.regs.read(&mut self.bus, reg, reg)?;
        Ok(self.regs[reg])
    }

    /// Detect the revision, load defaults and run the image-rejection calibration
    pub(crate) fn init_regs(&mut self) -> Result<()> {
        self.regs = RegisterFile::new();
        let id = self.read_one(Reg::Id)?;
        self.version = Version::from_id(id)?;
        self.present = true;
        info!("found TDA18271 {}", self.version.name());

        let r = &mut self.regs;
        r[Reg::Thermo] = 0x08;
        r[Reg::PowerLevel] = 0x80;
        r[Reg::EasyProg1] = 0xC6;
        r[Reg::EasyProg2] = 0xDF;
        r[Reg::EasyProg3] = 0x16;
        r[Reg::EasyProg4] = 0x60;
        r[Reg::EasyProg5] = 0x80;
        r[Reg::CalPostDiv] = 0x80;
        r[Reg::Ext1] = 0xFF;
        r[Reg::Ext2] = 0x01;
        r[Reg::Ext3] = 0x84;
        r[Reg::Ext4] = 0x41;
        r[Reg::Ext5] = 0x01;
        r[Reg::Ext6] = 0x84;
        r[Reg::Ext7] = 0x40;
        r[Reg::Ext8] = 0x07;
        r[Reg::Ext11] = 0x96;
        r[Reg::Ext12] = 0x0F;
        r[Reg::Ext13] = 0xC1;
        r[Reg::Ext15] = 0x8F;
        r[Reg::Ext20] = 0x20;
        r[Reg::Ext21] = 0x33;
        r[Reg::Ext22] = 0x48;
        r[Reg::Ext23] = 0xB0;
        if self.version == Version::V2 {
            r[Reg::Ext1] = 0xFC;
            r[Reg::Ext12] = 0x33;
            r[Reg::Ext18] = 0x8C;
            r[Reg::Ext21] = 0xB3;
        }
        self.write(Reg::Thermo, Reg::Ext23)?;

        // AGC1 gain sequence
        self.write_one(Reg::Ext17)?;
        for value in [0x03, 0x43, 0x4C] {
            self.regs[Reg::Ext17] = value;
            self.write_one(Reg::Ext17)?;
        }
        if self.version == Version::V1 {
            // AGC2 gain sequence
            for value in [0xA0, 0xA7, 0xE7, 0xEC] {
                self.regs[Reg::Ext20] = value;
                self.write_one(Reg::Ext20)?;
            }
        }

        self.regs[Reg::EasyProg3] = 0x1F;
        self.regs[Reg::EasyProg4] = 0x66;
        for (i, band) in IMAGE_REJECTION_BANDS.iter().enumerate() {
            trace!("image rejection calibration, {} band", band.name);
            let [ep5, cal_postdiv, cal_div1, cal_div2, postdiv, div1, div2] = band.prepare;
            let r = &mut self.regs;
            r[Reg::EasyProg5] = ep5;
            r[Reg::CalPostDiv] = cal_postdiv;
            r[Reg::CalDiv1] = cal_div1;
            r[Reg::CalDiv2] = cal_div2;
            r[Reg::PostDiv] = postdiv;
            r[Reg::Div1] = div1;
            r[Reg::Div2] = div2;
            self.write(Reg::EasyProg3, Reg::Div3)?;
            if i == 0 && self.version == Version::V2 {
                // cycle the main charge pump
                self.regs[Reg::Ext4] = 0x61;
                self.write_one(Reg::Ext4)?;
                self.delay.delay_ms(1);
                self.regs[Reg::Ext4] = 0x41;
                self.write_one(Reg::Ext4)?;
            }
            self.delay.delay_ms(5);

            self.write_one(Reg::EasyProg1)?;
            self.delay.delay_ms(5);
            let [ep5, cal_postdiv, cal_div1, cal_div2] = band.launch;
            let r = &mut self.regs;
            r[Reg::EasyProg5] = ep5;
            r[Reg::CalPostDiv] = cal_postdiv;
            r[Reg::CalDiv1] = cal_div1;
            r[Reg::CalDiv2] = cal_div2;
            self.write(Reg::EasyProg3, Reg::CalDiv3)?;
            self.delay.delay_ms(5);
            self.write_one(Reg::EasyProg2)?;
            self.delay.delay_ms(30);
        }

        // back to normal mode
        self.regs[Reg::EasyProg4] = 0x64;
        self.write_one(Reg::EasyProg4)?;
        self.write_one(Reg::EasyProg1)
    }

    /// Measure the tracking-filter curve of every RF sub-band
    pub(crate) fn calc_rf_filter_curve(&mut self) -> Result<()> {
        self.delay.delay_ms(200);
        self.powerscan_init()?;
        for (i, band) in tables::RF_BANDS.iter().enumerate() {
            let mut anchors = Vec::with_capacity(3);
            for default_hz in band.anchors_hz.into_iter().take_while(|&hz| hz != 0) {
                let found = self.powerscan(default_hz)?;
                let frequency_hz = found.unwrap_or(default_hz);
                let factory = self.get_rf_cal(frequency_hz)?;
                let measured = match found {
                    Some(_) => self.calibrate_rf(frequency_hz)?,
                    None => factory,
                };
                anchors.push(Anchor {
                    frequency_hz,
                    factory,
                    measured,
                });
            }
            self.curve[i] = FilterCurve::from_anchors(&anchors);
            debug!("rf band {}: {:?}", i, self.curve[i]);
        }
        self.cal_temp_c = self.temperature()?;
        Ok(())
    }

    fn powerscan_init(&mut self) -> Result<()> {
        self.regs.update(Reg::EasyProg3, 0x1F, 0x12);
        self.regs[Reg::EasyProg4] &= 0xE0;
        self.write(Reg::EasyProg3, Reg::EasyProg4)?;
        self.regs[Reg::Ext18] &= 0x1C;
        self.write_one(Reg::Ext18)?;
        self.regs[Reg::Ext21] = (self.regs[Reg::Ext21] & 0x1C) | 0x06;
        self.write(Reg::Ext21, Reg::Ext23)
    }

    pub(crate) fn calc_main_pll(&mut self, frequency_hz: u32) -> Result<()> {
        let table: &[PllEntry] = match self.version {
            Version::V1 => &tables::MAIN_PLL_V1,
            Version::V2 => &tables::MAIN_PLL_V2,
        };
        let entry = *tables::pll_entry(table, frequency_hz)
            .ok_or_else(|| out_of_range("main PLL", frequency_hz))?;
        let div = pll_divider(&entry, frequency_hz);
        let r = &mut self.regs;
        r.update(Reg::PostDiv, 0x7F, entry.postdiv);
        r[Reg::Div1] = ((div >> 16) & 0x7F) as u8;
        r[Reg::Div2] = (div >> 8) as u8;
        r[Reg::Div3] = div as u8;
        self.write(Reg::PostDiv, Reg::Div3)
    }

    pub(crate) fn calc_cal_pll(&mut self, frequency_hz: u32) -> Result<()> {
        let table: &[PllEntry] = match self.version {
            Version::V1 => &tables::CAL_PLL_V1,
            Version::V2 => &tables::CAL_PLL_V2,
        };
        let entry = *tables::pll_entry(table, frequency_hz)
            .ok_or_else(|| out_of_range("calibration PLL", frequency_hz))?;
        let div = pll_divider(&entry, frequency_hz);
        let r = &mut self.regs;
        r[Reg::CalPostDiv] = entry.postdiv;
        r[Reg::CalDiv1] = ((div >> 16) & 0x7F) as u8;
        r[Reg::CalDiv2] = (div >> 8) as u8;
        r[Reg::CalDiv3] = div as u8;
        self.write(Reg::CalPostDiv, Reg::CalDiv3)
    }

    pub(crate) fn update_rf_band(&mut self, frequency_hz: u32) -> Result<()> {
        let band = tables::index_for(tables::RF_BANDS.iter().map(|b| b.max_hz), frequency_hz)
            .ok_or_else(|| out_of_range("RF band", frequency_hz))?;
        self.regs.update(Reg::EasyProg2, 0xE0, (band as u8) << 5);
        Ok(())
    }

    pub(crate) fn update_gain_taper(&mut self, frequency_hz: u32) -> Result<()> {
        let taper = byte_or_invalid(&tables::GAIN_TAPER, "gain taper", frequency_hz)?;
        self.regs.update(Reg::EasyProg2, 0x1F, taper);
        Ok(())
    }

    pub(crate) fn update_bp_filter(&mut self, frequency_hz: u32) -> Result<()> {
        let filter = tables::index_for(tables::BP_FILTER, frequency_hz)
            .ok_or_else(|| out_of_range("band-pass filter", frequency_hz))?;
        self.regs.update(Reg::EasyProg1, 0x07, filter as u8);
        Ok(())
    }

    pub(crate) fn update_ir_measure(&mut self, frequency_hz: u32) -> Result<()> {
        let measure = byte_or_invalid(&tables::IR_MEASURE, "IR measure", frequency_hz)?;
        self.regs.update(Reg::EasyProg5, 0x07, measure);
        Ok(())
    }

    fn update_rfc_km(&mut self, frequency_hz: u32) -> Result<()> {
        let table: &[ByteEntry] = match self.version {
            Version::V1 => &tables::RFC_KM_V1,
            Version::V2 => &tables::RFC_KM_V2,
        };
        let km = byte_or_invalid(table, "RF calibration K/M", frequency_hz)?;
        self.regs.update(Reg::Ext13, 0x7C, km);
        Ok(())
    }

    /// Factory capacitor code for `frequency_hz`
    fn get_rf_cal(&self, frequency_hz: u32) -> Result<u8> {
        let table: &[ByteEntry] = match self.version {
            Version::V1 => &tables::RF_CAL_V1,
            Version::V2 => &tables::RF_CAL_V2,
        };
        byte_or_invalid(table, "RF calibration", frequency_hz)
    }

    fn cid_target(&self, frequency_hz: u32) -> Result<CidTarget> {
        tables::CID_TARGETS
            .iter()
            .find(|c| frequency_hz <= c.max_hz)
            .copied()
            .ok_or_else(|| out_of_range("carrier-detect target", frequency_hz))
    }

    /// Sweep the main PLL around `frequency_hz` until the carrier-detect
    /// metric reaches its target
    ///
    /// The sweep goes up first, then down, in fixed steps; the first step in
    /// each direction gets a longer settling delay. Returns the frequency
    /// the target was reached at, or `None` when the budget ran out.
    fn powerscan(&mut self, frequency_hz: u32) -> Result<Option<u32>> {
        self.update_rf_band(frequency_hz)?;
        self.update_gain_taper(frequency_hz)?;
        self.write_one(Reg::EasyProg2)?;
        self.regs[Reg::Ext14] = self.get_rf_cal(frequency_hz)?;
        self.write_one(Reg::Ext14)?;

        let cid = self.cid_target(frequency_hz)?;
        self.regs.update(Reg::EasyProg4, 0x03, 0x01);
        self.write_one(Reg::EasyProg4)?;

        let mut downward = false;
        let mut offset_khz = 0u32;
        let mut settle = true;
        loop {
            let offset_hz = offset_khz * 1000;
            let swept_hz = if downward {
                frequency_hz - offset_hz
            } else {
                frequency_hz + offset_hz
            };
            let trial_hz = swept_hz + MEASURE_OFFSET_HZ;
            self.calc_main_pll(trial_hz)?;
            self.delay.delay_us(if settle { 5000 } else { 100 });
            settle = false;
            self.write_one(Reg::EasyProg2)?;
            let metric = self.read_one(Reg::Ext10)? & 0x3F;
            if metric >= cid.target {
                trace!("powerscan {} Hz: target reached at {} Hz", frequency_hz, swept_hz);
                return Ok(Some(swept_hz));
            }

            offset_khz += SWEEP_STEP_KHZ;
            if offset_khz > cid.sweep_limit_khz {
                if downward {
                    break;
                }
                downward = true;
                offset_khz = SWEEP_STEP_KHZ;
                settle = true;
            }
        }
        debug!("powerscan {} Hz: carrier-detect target not reached", frequency_hz);
        Ok(None)
    }

    /// Run one hardware RF calibration cycle at `frequency_hz`
    fn calibrate_rf(&mut self, frequency_hz: u32) -> Result<u8> {
        self.regs[Reg::EasyProg4] &= 0xFC;
        self.write_one(Reg::EasyProg4)?;
        self.regs[Reg::Ext18] |= 0x03;
        self.write_one(Reg::Ext18)?;
        self.regs[Reg::EasyProg3] |= 0x40;
        self.update_bp_filter(frequency_hz)?;
        self.update_gain_taper(frequency_hz)?;
        self.update_rf_band(frequency_hz)?;
        self.write(Reg::EasyProg1, Reg::EasyProg3)?;
        self.update_rfc_km(frequency_hz)?;
        self.write_one(Reg::Ext13)?;
        self.regs[Reg::Ext4] |= 0x20;
        self.write_one(Reg::Ext4)?;
        self.regs[Reg::Ext7] |= 0x20;
        self.write_one(Reg::Ext7)?;
        self.regs[Reg::Ext14] = 0x00;
        self.write_one(Reg::Ext14)?;
        self.regs[Reg::Ext20] &= 0xDF;
        self.write_one(Reg::Ext20)?;
        self.regs[Reg::EasyProg4] |= 0x03;
        self.write(Reg::EasyProg4, Reg::EasyProg5)?;

        self.calc_cal_pll(frequency_hz)?;
        self.calc_main_pll(frequency_hz + MEASURE_OFFSET_HZ)?;
        self.delay.delay_ms(5);
        for _ in 0..2 {
            self.write_one(Reg::EasyProg2)?;
            self.write_one(Reg::EasyProg1)?;
        }

        self.regs[Reg::Ext4] &= 0xDF;
        self.write_one(Reg::Ext4)?;
        self.regs[Reg::Ext7] &= 0xDF;
        self.write_one(Reg::Ext7)?;
        self.delay.delay_ms(10);

        self.regs[Reg::Ext20] |= 0x20;
        self.write_one(Reg::Ext20)?;
        self.delay.delay_ms(60);

        self.regs[Reg::Ext18] &= 0xFC;
        self.write_one(Reg::Ext18)?;
        self.regs[Reg::EasyProg3] &= 0xBF;
        self.regs[Reg::EasyProg4] &= 0xFC;
        self.write(Reg::EasyProg3, Reg::EasyProg4)?;
        self.write_one(Reg::EasyProg1)?;

        self.read_one(Reg::Ext14)
    }

    /// Read the die temperature in °C
    ///
    /// The sensor has two ranges; a reading pinned at the edge of the
    /// current range flips to the other one and reads again.
    pub(crate) fn temperature(&mut self) -> Result<u8> {
        self.regs[Reg::Thermo] |= 0x10;
        self.write_one(Reg::Thermo)?;
        let mut thermo = self.read_one(Reg::Thermo)?;
        let high_range = thermo & 0x20 != 0;
        let code = thermo & 0x0F;
        if (high_range && code == 0x00) || (!high_range && code == 0x08) {
            self.regs[Reg::Thermo] ^= 0x20;
            self.write_one(Reg::Thermo)?;
            self.delay.delay_ms(10);
            thermo = self.read_one(Reg::Thermo)?;
        }
        self.regs[Reg::Thermo] &= 0xEF;
        self.write_one(Reg::Thermo)?;
        self.regs[Reg::EasyProg4] &= 0xFC;
        self.write_one(Reg::EasyProg4)?;
        Ok(celsius(thermo))
    }

    pub(crate) fn power_on_reset(&mut self) -> Result<()> {
        self.regs[Reg::Ext12] &= 0xDF;
        self.write_one(Reg::Ext12)?;
        self.regs[Reg::Ext18] &= 0x7C;
        self.write_one(Reg::Ext18)?;
        self.regs.update(Reg::EasyProg3, 0xE0, 0x80);
        self.write_one(Reg::EasyProg3)?;
        self.regs[Reg::Ext21] |= 0x03;
        self.regs[Reg::Ext23] &= 0xF9;
        self.write(Reg::Ext21, Reg::Ext23)
    }

    /// Calibrate the tracking filter at `frequency_hz` (first revision)
    pub(crate) fn rf_tracking_filter_calibration(&mut self, frequency_hz: u32) -> Result<()> {
        self.update_bp_filter(frequency_hz)?;
        self.write_one(Reg::EasyProg1)?;
        self.regs.update(Reg::Ext4, 0xF8, 0x60);
        self.write_one(Reg::Ext4)?;
        self.regs[Reg::Ext7] = 0x60;
        self.write_one(Reg::Ext7)?;
        self.regs[Reg::Ext14] = 0x00;
        self.write_one(Reg::Ext14)?;
        self.regs[Reg::Ext20] = 0xCC;
        self.write_one(Reg::Ext20)?;
        self.regs[Reg::EasyProg4] |= 0x03;
        self.write(Reg::EasyProg3, Reg::EasyProg5)?;
        self.calc_cal_pll(frequency_hz)?;
        self.calc_main_pll(frequency_hz + MEASURE_OFFSET_HZ)?;
        self.delay.delay_ms(5);
        self.update_rfc_km(frequency_hz)?;
        self.write_one(Reg::Ext13)?;
        self.update_rf_band(frequency_hz)?;
        self.update_gain_taper(frequency_hz)?;
        for _ in 0..2 {
            self.write_one(Reg::EasyProg2)?;
            self.write_one(Reg::EasyProg1)?;
        }
        self.regs.update(Reg::Ext4, 0xF8, 0x40);
        self.write_one(Reg::Ext4)?;
        self.regs[Reg::Ext7] = 0x40;
        self.write_one(Reg::Ext7)?;
        self.delay.delay_ms(10);
        self.regs[Reg::Ext20] = 0xEC;
        self.write_one(Reg::Ext20)?;
        self.delay.delay_ms(60);
        self.regs[Reg::EasyProg4] &= 0xFC;
        self.write_one(Reg::EasyProg4)?;
        self.write_one(Reg::EasyProg1)?;
        if frequency_hz <= V1_LOW_BAND_MAX_HZ {
            self.regs[Reg::Ext14] = self.get_rf_cal(frequency_hz)?;
            self.write_one(Reg::Ext14)?;
        }
        Ok(())
    }

    /// Program the tracking filter from the fitted curve (second revision)
    pub(crate) fn rf_tracking_filter_correction(&mut self, frequency_hz: u32) -> Result<()> {
        self.regs[Reg::EasyProg3] &= 0x1F;
        self.write_one(Reg::EasyProg3)?;
        let factory = self.get_rf_cal(frequency_hz)?;
        let band = tables::index_for(tables::RF_BANDS.iter().map(|b| b.max_hz), frequency_hz)
            .ok_or_else(|| out_of_range("RF band", frequency_hz))?;
        let code = self.curve[band].capacitor(frequency_hz, factory);
        let coefficient = byte_or_invalid(&tables::RFC_TEMP_COEFF, "temperature coefficient", frequency_hz)?;
        let now_c = self.temperature()?;
        self.regs[Reg::Ext14] = curve::temperature_adjust(code, now_c, self.cal_temp_c, coefficient);
        trace!(
            "rf correction {} Hz: code {:#04x} at {}°C (calibrated at {}°C)",
            frequency_hz,
            self.regs[Reg::Ext14],
            now_c,
            self.cal_temp_c
        );
        self.write_one(Reg::Ext14)
    }
}

/// Convert a THERMO register value to °C
pub(crate) fn celsius(thermo: u8) -> u8 {
    let range = usize::from((thermo & 0x20) >> 5);
    tables::THERMOMETER[usize::from(thermo & 0x0F)][range]
}
