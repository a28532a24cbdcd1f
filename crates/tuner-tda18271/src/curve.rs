//! RF tracking-filter calibration curve
//!
//! Each sub-band is calibrated at up to three anchor frequencies. At every
//! anchor the chip's factory capacitor code is compared with a measured one;
//! the curve stores the offset at the first two anchors and the slope of the
//! offset between consecutive anchors. At tuning time the offset is
//! interpolated and added to the factory code for the target frequency.

/// Factory and measured capacitor codes at one anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Frequency the measurement was taken at
    pub frequency_hz: u32,
    pub factory: u8,
    pub measured: u8,
}

impl Anchor {
    fn offset(&self) -> f64 {
        f64::from(self.measured) - f64::from(self.factory)
    }
}

/// Offset line(s) for one sub-band
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterCurve {
    /// Anchor frequencies, 0 where the sub-band has fewer anchors
    pub anchors_hz: [u32; 3],
    /// Slope below the second anchor, per kHz
    pub a1: f64,
    /// Offset at the first anchor
    pub b1: f64,
    /// Slope from the second anchor on, per kHz
    pub a2: f64,
    /// Offset at the second anchor
    pub b2: f64,
}

fn slope(from: &Anchor, to: &Anchor) -> f64 {
    let span_khz = (i64::from(to.frequency_hz) - i64::from(from.frequency_hz)) / 1000;
    if span_khz == 0 {
        return 0.0;
    }
    (to.offset() - from.offset()) / span_khz as f64
}

impl FilterCurve {
    /// Fit the curve through up to three anchors, in ascending order
    pub fn from_anchors(anchors: &[Anchor]) -> Self {
        let mut curve = FilterCurve::default();
        for (slot, anchor) in curve.anchors_hz.iter_mut().zip(anchors) {
            *slot = anchor.frequency_hz;
        }
        match anchors {
            [] => {}
            [first] => curve.b1 = first.offset(),
            [first, second] => {
                curve.b1 = first.offset();
                curve.a1 = slope(first, second);
            }
            [first, second, third, ..] => {
                curve.b1 = first.offset();
                curve.a1 = slope(first, second);
                curve.b2 = second.offset();
                curve.a2 = slope(second, third);
            }
        }
        curve
    }

    /// Expected capacitor code at `frequency_hz`, given the factory code there
    pub fn capacitor(&self, frequency_hz: u32, factory: u8) -> u8 {
        let [rf1, rf2, rf3] = self.anchors_hz;
        let khz_from = |anchor: u32| ((i64::from(frequency_hz) - i64::from(anchor)) / 1000) as f64;
        let estimate = if rf3 == 0 || frequency_hz < rf2 {
            self.a1 * khz_from(rf1) + self.b1
        } else {
            self.a2 * khz_from(rf2) + self.b2
        } + f64::from(factory);
        clamp_byte(estimate.round() as i64)
    }
}

/// Shift a capacitor code for the die temperature drift since calibration
///
/// `coefficient` is the code change per degree, in thousandths.
pub fn temperature_adjust(code: u8, now_c: u8, calibrated_c: u8, coefficient: u8) -> u8 {
    let drift = (i64::from(now_c) - i64::from(calibrated_c)) * i64::from(coefficient) / 1000;
    clamp_byte(i64::from(code) + drift)
}

fn clamp_byte(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}
