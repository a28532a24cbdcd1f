//! Flat split-transfer images
//!
//! ```text
//! offset 0   u32 LE   size of segment A
//! offset 4   u32 LE   size of segment B
//! offset 8   segment A bytes
//!            segment B bytes
//! ```
//!
//! Both segments are written in transaction-sized pieces with a short settle
//! between them. The chip-specific handshake that follows runs through a
//! caller-supplied closure.

use tracing::{debug, info};
use tuner_core::{write_chunked, DelayNs, Result, Transport, TunerError};

use crate::image::FirmwareImage;

/// Size of the two-length header
pub const SPLIT_HEADER_LEN: usize = 8;

/// Settle time after each segment
pub const SEGMENT_SETTLE_MS: u32 = 1;

/// The two segments of a flat image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitImage<'a> {
    pub first: &'a [u8],
    pub second: &'a [u8],
}

impl<'a> SplitImage<'a> {
    /// Split `bytes` by its size header
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < SPLIT_HEADER_LEN {
            return Err(TunerError::InvalidFormat(format!(
                "split image header needs {SPLIT_HEADER_LEN} bytes, file has {}",
                bytes.len()
            )));
        }
        let size_a = read_u32_le(&bytes[0..4]) as usize;
        let size_b = read_u32_le(&bytes[4..8]) as usize;
        let body = &bytes[SPLIT_HEADER_LEN..];
        let total = size_a.checked_add(size_b).ok_or_else(|| {
            TunerError::InvalidFormat("split image segment sizes overflow".to_string())
        })?;
        if total > body.len() {
            return Err(TunerError::InvalidFormat(format!(
                "split image segments need {} bytes, file has {}",
                total,
                body.len()
            )));
        }
        let (first, rest) = body.split_at(size_a);
        Ok(Self {
            first,
            second: &rest[..size_b],
        })
    }

    /// Write both segments
    pub fn transfer<T, D>(&self, bus: &mut T, delay: &mut D) -> Result<()>
    where
        T: Transport + ?Sized,
        D: DelayNs + ?Sized,
    {
        debug!(
            "writing split image: {} + {} bytes",
            self.first.len(),
            self.second.len()
        );
        if !self.first.is_empty() {
            write_chunked(bus, self.first)?;
        }
        delay.delay_ms(SEGMENT_SETTLE_MS);
        if !self.second.is_empty() {
            write_chunked(bus, self.second)?;
        }
        delay.delay_ms(SEGMENT_SETTLE_MS);
        Ok(())
    }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Transfer `image`, run `handshake`, then record the transfer
///
/// The sidecar is only updated when both the transfer and the handshake
/// succeed.
pub fn load_split<T, D, F, R>(
    image: &mut FirmwareImage,
    bus: &mut T,
    delay: &mut D,
    handshake: F,
) -> Result<R>
where
    T: Transport + ?Sized,
    D: DelayNs + ?Sized,
    F: FnOnce(&mut T, &mut D) -> Result<R>,
{
    info!("loading firmware {}", image.path().display());
    SplitImage::parse(image.bytes())?.transfer(bus, delay)?;
    let outcome = handshake(bus, delay)?;
    image.update()?;
    Ok(outcome)
}
