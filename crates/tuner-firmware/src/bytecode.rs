//! Length-prefixed firmware byte-code
//!
//! A stream is a sequence of records, each introduced by a big-endian `u16`:
//!
//! | header            | meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `0x0000`          | invoke the caller's reset hook            |
//! | `0xFFFF`          | end of stream                             |
//! | `0x8000 \| n`     | sleep `n` milliseconds                    |
//! | `n` (1..=0x7FFF)  | write the next `n` bytes to the bus       |
//!
//! Running off the end without an end marker is accepted, as is a single
//! trailing pad byte.

use tracing::{debug, trace};
use tuner_core::{write_chunked, DelayNs, Result, Transport, TunerError};

/// Header value that terminates a stream
pub const END_OF_STREAM: u16 = 0xFFFF;

/// Header value that requests a reset
pub const RESET: u16 = 0x0000;

/// Header bit marking a sleep record
pub const SLEEP_FLAG: u16 = 0x8000;

/// Reset hook invoked for `0x0000` records
pub type ResetHook = Box<dyn FnMut() -> Result<()> + Send>;

/// One decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    Reset,
    Sleep(u32),
    Write(&'a [u8]),
    End,
}

/// Iterator over the records of a stream
#[derive(Debug, Clone)]
pub struct Records<'a> {
    code: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Records<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset + 2 > self.code.len() {
            return None;
        }
        let header = u16::from_be_bytes([self.code[self.offset], self.code[self.offset + 1]]);
        self.offset += 2;

        let record = match header {
            END_OF_STREAM => {
                self.done = true;
                Record::End
            }
            RESET => Record::Reset,
            h if h & SLEEP_FLAG != 0 => Record::Sleep(u32::from(h & !SLEEP_FLAG)),
            len => {
                let len = usize::from(len);
                let remaining = self.code.len() - self.offset;
                if len > remaining {
                    self.done = true;
                    return Some(Err(TunerError::InvalidFormat(format!(
                        "byte-code run of {} bytes at offset {} extends past end ({} left)",
                        len,
                        self.offset - 2,
                        remaining
                    ))));
                }
                let run = &self.code[self.offset..self.offset + len];
                self.offset += len;
                Record::Write(run)
            }
        };
        Some(Ok(record))
    }
}

/// Execute a byte-code stream against the bus
///
/// Literal runs are split to the transport's transaction limit. A bus error
/// or a reset hook error stops the stream.
pub fn run<T, D, F>(code: &[u8], bus: &mut T, delay: &mut D, mut reset: F) -> Result<()>
where
    T: Transport + ?Sized,
    D: DelayNs + ?Sized,
    F: FnMut() -> Result<()>,
{
    let mut written = 0usize;
    for record in Records::new(code) {
        match record? {
            Record::End => break,
            Record::Reset => {
                debug!("byte-code reset");
                reset()?;
            }
            Record::Sleep(ms) => {
                trace!("byte-code sleep {}ms", ms);
                delay.delay_ms(ms);
            }
            Record::Write(run) => {
                write_chunked(bus, run)?;
                written += run.len();
            }
        }
    }
    debug!("byte-code stream wrote {} bytes", written);
    Ok(())
}
