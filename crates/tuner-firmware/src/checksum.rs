//! Checksummed burst uploads
//!
//! Some demodulators take their microcontroller image through a single
//! register. The payload goes out in bursts of at most [`MAX_BURST`] bytes,
//! each prefixed with the register address, and the upload ends by writing
//! the payload's CRC-16/XMODEM (polynomial 0x1021, zero initial value) to the
//! same register, high byte first.

use crc::{Crc, CRC_16_XMODEM};
use tracing::{debug, trace};
use tuner_core::{Result, Transport};

/// Longest burst the upload register accepts
pub const MAX_BURST: usize = 255;

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM of `bytes`
pub fn crc16(bytes: &[u8]) -> u16 {
    CCITT.checksum(bytes)
}

/// Upload `payload` through `register` and finish with its checksum
///
/// Bursts shrink to fit the transport's transaction limit. Returns the
/// checksum that was written.
pub fn upload<T: Transport + ?Sized>(bus: &mut T, register: u8, payload: &[u8]) -> Result<u16> {
    let burst = MAX_BURST
        .min(bus.max_transaction().saturating_sub(1))
        .max(1);
    let mut digest = CCITT.digest();
    let mut frame = Vec::with_capacity(burst + 1);
    for chunk in payload.chunks(burst) {
        frame.clear();
        frame.push(register);
        frame.extend_from_slice(chunk);
        bus.write(&frame)?;
        digest.update(chunk);
        trace!("burst of {} bytes to {:#04x}", chunk.len(), register);
    }
    let crc = digest.finalize();
    let [hi, lo] = crc.to_be_bytes();
    bus.write(&[register, hi, lo])?;
    debug!(
        "uploaded {} bytes to {:#04x}, crc {:#06x}",
        payload.len(),
        register,
        crc
    );
    Ok(crc)
}
