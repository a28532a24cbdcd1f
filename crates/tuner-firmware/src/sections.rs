//! Multi-section versioned firmware blobs
//!
//! All fields are little-endian. The blob starts with a version, followed by
//! typed sections and finally the raw image every entry points into:
//!
//! ```text
//! u16 version
//! repeat:
//!   u16 type, u16 count          type 4 (main) ends the header
//!   count entries of the type's layout
//! raw image
//! ```
//!
//! | type | section   | entry layout                                        |
//! |------|-----------|-----------------------------------------------------|
//! | 0    | base      | `u32 offset, u32 size, u16 flags`                   |
//! | 1    | digital   | `u32 offset, u32 size, u16 modulation mask, u16 flags` |
//! | 2    | analog    | `u32 offset, u32 size, u32 video mask, u32 audio mask, u16 flags` |
//! | 3    | scan code | `u32 offset, u32 size, u16 IF kHz, u16 flags`       |
//!
//! Offsets are relative to the start of the raw image. Base, digital and
//! analog payloads are byte-code streams (see [`crate::bytecode`]). A
//! scan-code payload is a set of sixteen tables, either 12 bytes each or 14
//! bytes with a 2-byte prefix, of which one is sent raw.

use tracing::{debug, info};
use tuner_core::{DelayNs, Result, Transport, TunerError};

use crate::bytecode;
use crate::image::FirmwareImage;

/// Base firmware for 8 MHz channels
pub const BASE_8MHZ: u16 = 1 << 0;
/// Base firmware for FM radio
pub const BASE_FM: u16 = 1 << 1;
/// Base firmware using the first RF input
pub const BASE_INPUT1: u16 = 1 << 2;
/// Base firmware with multi-channel TV sound
pub const BASE_MTS: u16 = 1 << 3;

pub const DIGITAL_6MHZ: u16 = 1 << 0;
pub const DIGITAL_7MHZ: u16 = 1 << 1;
pub const DIGITAL_8MHZ: u16 = 1 << 2;
/// 7 MHz VHF with 8 MHz UHF
pub const DIGITAL_78MHZ: u16 = 1 << 3;
pub const DIGITAL_D2620: u16 = 1 << 4;
pub const DIGITAL_D2633: u16 = 1 << 5;

pub const ANALOG_MTS: u16 = 1 << 0;
pub const ANALOG_LCD: u16 = 1 << 1;
pub const ANALOG_NOGD: u16 = 1 << 2;

pub const SCODE_MONO: u16 = 1 << 0;
pub const SCODE_ATSC: u16 = 1 << 1;
pub const SCODE_IF: u16 = 1 << 2;
pub const SCODE_LG60: u16 = 1 << 3;
pub const SCODE_ATI638: u16 = 1 << 4;
pub const SCODE_OREN538: u16 = 1 << 5;
pub const SCODE_OREN36: u16 = 1 << 6;
pub const SCODE_TOYOTA388: u16 = 1 << 7;
pub const SCODE_TOYOTA794: u16 = 1 << 8;
pub const SCODE_DIBCOM52: u16 = 1 << 9;
pub const SCODE_ZARLINK456: u16 = 1 << 10;
pub const SCODE_CHINA: u16 = 1 << 11;
pub const SCODE_F6MHZ: u16 = 1 << 12;
pub const SCODE_INPUT2: u16 = 1 << 13;

/// Tables in one scan-code image
pub const SCODE_TABLES: usize = 16;
/// Bytes of a scan-code table sent to the chip
pub const SCODE_TABLE_LEN: usize = 12;

/// First firmware version taking the newer scan-code preamble
const SCODE_PREAMBLE_VERSION: u16 = 0x0202;

/// Section types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectionKind {
    Base,
    Digital,
    Analog,
    ScanCode,
    Main,
}

impl SectionKind {
    /// Decode a section type field
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(SectionKind::Base),
            1 => Some(SectionKind::Digital),
            2 => Some(SectionKind::Analog),
            3 => Some(SectionKind::ScanCode),
            4 => Some(SectionKind::Main),
            _ => None,
        }
    }

    /// Returns a human-readable name for the section
    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Base => "base",
            SectionKind::Digital => "digital",
            SectionKind::Analog => "analog",
            SectionKind::ScanCode => "scan code",
            SectionKind::Main => "main",
        }
    }

    fn slot(&self) -> usize {
        match self {
            SectionKind::Base => 0,
            SectionKind::Digital => 1,
            SectionKind::Analog => 2,
            SectionKind::ScanCode | SectionKind::Main => 3,
        }
    }
}

/// Location of a sub-image inside the raw image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaseEntry {
    pub span: Span,
    pub flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DigitalEntry {
    pub span: Span,
    /// Bit `1 << ordinal` per supported modulation
    pub modulation_mask: u16,
    pub flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalogEntry {
    pub span: Span,
    pub video_mask: u32,
    pub audio_mask: u32,
    pub flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanCodeEntry {
    pub span: Span,
    pub ifreq_khz: u16,
    pub flags: u16,
}

/// Parsed header of a multi-section blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionIndex {
    pub version: u16,
    pub base: Vec<BaseEntry>,
    pub digital: Vec<DigitalEntry>,
    pub analog: Vec<AnalogEntry>,
    pub scan_code: Vec<ScanCodeEntry>,
    /// Offset of the raw image within the blob
    pub raw_offset: usize,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.bytes.len() - self.pos < n {
            return Err(TunerError::InvalidFormat(format!(
                "{} at offset {} extends past end of file ({} bytes)",
                what,
                self.pos,
                self.bytes.len()
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn span(&mut self, what: &str) -> Result<Span> {
        Ok(Span {
            offset: self.u32(what)?,
            size: self.u32(what)?,
        })
    }
}

impl SectionIndex {
    /// Parse the header of `bytes`, checking every entry lies inside the raw image
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader { bytes, pos: 0 };
        let mut index = SectionIndex {
            version: r.u16("version")?,
            ..Default::default()
        };

        loop {
            let kind_raw = r.u16("section header")?;
            let count = r.u16("section header")?;
            let kind = SectionKind::from_u16(kind_raw).ok_or_else(|| {
                TunerError::InvalidFormat(format!(
                    "unknown section type {} at offset {}",
                    kind_raw,
                    r.pos - 4
                ))
            })?;
            let what = kind.name();
            for _ in 0..count {
                match kind {
                    SectionKind::Base => index.base.push(BaseEntry {
                        span: r.span(what)?,
                        flags: r.u16(what)?,
                    }),
                    SectionKind::Digital => index.digital.push(DigitalEntry {
                        span: r.span(what)?,
                        modulation_mask: r.u16(what)?,
                        flags: r.u16(what)?,
                    }),
                    SectionKind::Analog => index.analog.push(AnalogEntry {
                        span: r.span(what)?,
                        video_mask: r.u32(what)?,
                        audio_mask: r.u32(what)?,
                        flags: r.u16(what)?,
                    }),
                    SectionKind::ScanCode => index.scan_code.push(ScanCodeEntry {
                        span: r.span(what)?,
                        ifreq_khz: r.u16(what)?,
                        flags: r.u16(what)?,
                    }),
                    SectionKind::Main => break,
                }
            }
            if kind == SectionKind::Main {
                break;
            }
        }
        index.raw_offset = r.pos;

        let raw_len = bytes.len() - index.raw_offset;
        let spans = index
            .base
            .iter()
            .map(|e| (SectionKind::Base, e.span))
            .chain(index.digital.iter().map(|e| (SectionKind::Digital, e.span)))
            .chain(index.analog.iter().map(|e| (SectionKind::Analog, e.span)))
            .chain(index.scan_code.iter().map(|e| (SectionKind::ScanCode, e.span)));
        for (kind, span) in spans {
            let end = u64::from(span.offset) + u64::from(span.size);
            if end > raw_len as u64 {
                return Err(TunerError::InvalidFormat(format!(
                    "{} sub-image at {}+{} extends past end of image ({} bytes)",
                    kind.name(),
                    span.offset,
                    span.size,
                    raw_len
                )));
            }
        }

        debug!(
            "firmware v{:#06x}: {} base, {} digital, {} analog, {} scan code images",
            index.version,
            index.base.len(),
            index.digital.len(),
            index.analog.len(),
            index.scan_code.len()
        );
        Ok(index)
    }

    /// First base image carrying every flag in `flags`
    pub fn select_base(&self, flags: u16) -> Option<usize> {
        self.base.iter().position(|e| e.flags & flags == flags)
    }

    /// First digital image for one of `modulations` carrying every flag in `flags`
    pub fn select_digital(&self, modulations: u32, flags: u16) -> Option<usize> {
        self.digital
            .iter()
            .position(|e| e.flags & flags == flags && u32::from(e.modulation_mask) & modulations != 0)
    }

    /// First analog image matching the video and audio masks and `flags`
    pub fn select_analog(&self, video: u32, audio: u32, flags: u16) -> Option<usize> {
        self.analog.iter().position(|e| {
            e.flags & flags == flags && e.video_mask & video != 0 && e.audio_mask & audio != 0
        })
    }

    /// First scan-code image for `ifreq_khz` carrying every flag in `flags`
    ///
    /// An `ifreq_khz` of 0 matches any IF.
    pub fn select_scan_code(&self, ifreq_khz: u16, flags: u16) -> Option<usize> {
        self.scan_code
            .iter()
            .position(|e| e.flags & flags == flags && (ifreq_khz == 0 || e.ifreq_khz == ifreq_khz))
    }

    fn span(&self, kind: SectionKind, index: usize) -> Option<Span> {
        match kind {
            SectionKind::Base => self.base.get(index).map(|e| e.span),
            SectionKind::Digital => self.digital.get(index).map(|e| e.span),
            SectionKind::Analog => self.analog.get(index).map(|e| e.span),
            SectionKind::ScanCode => self.scan_code.get(index).map(|e| e.span),
            SectionKind::Main => None,
        }
    }
}

/// Loads sub-images of one blob, skipping ones already on the chip
///
/// Loading a different base image invalidates the other sections, since the
/// chip forgets them when its base firmware changes.
#[derive(Debug)]
pub struct SectionedLoader {
    image: FirmwareImage,
    index: SectionIndex,
    current: [Option<usize>; 4],
    scan_table: Option<u8>,
}

impl SectionedLoader {
    /// Parse `image` into a loader with nothing loaded
    pub fn new(image: FirmwareImage) -> Result<Self> {
        let index = SectionIndex::parse(image.bytes())?;
        Ok(Self {
            image,
            index,
            current: [None; 4],
            scan_table: None,
        })
    }

    pub fn version(&self) -> u16 {
        self.index.version
    }

    pub fn index(&self) -> &SectionIndex {
        &self.index
    }

    /// Index of the loaded sub-image in `kind`, if any
    pub fn current(&self, kind: SectionKind) -> Option<usize> {
        match kind {
            SectionKind::Main => None,
            _ => self.current[kind.slot()],
        }
    }

    /// Table of the loaded scan-code image, if any
    pub fn current_scan_table(&self) -> Option<u8> {
        self.current[SectionKind::ScanCode.slot()].and(self.scan_table)
    }

    /// Forget what is loaded, e.g. after the chip was reset
    pub fn invalidate(&mut self) {
        self.current = [None; 4];
        self.scan_table = None;
    }

    /// Load the matching base image; returns whether anything was written
    pub fn load_base<T, D, F>(&mut self, bus: &mut T, delay: &mut D, flags: u16, reset: F) -> Result<bool>
    where
        T: Transport + ?Sized,
        D: DelayNs + ?Sized,
        F: FnMut() -> Result<()>,
    {
        let selected = self.index.select_base(flags).ok_or_else(|| {
            TunerError::NotFound(format!("no base firmware with flags {flags:#06x}"))
        })?;
        if self.current[SectionKind::Base.slot()] == Some(selected) {
            return Ok(false);
        }
        self.invalidate();
        self.transfer(SectionKind::Base, selected, bus, delay, reset)?;
        self.image.update()?;
        Ok(true)
    }

    /// Load the matching digital image; returns whether anything was written
    pub fn load_digital<T, D, F>(
        &mut self,
        bus: &mut T,
        delay: &mut D,
        modulations: u32,
        flags: u16,
        reset: F,
    ) -> Result<bool>
    where
        T: Transport + ?Sized,
        D: DelayNs + ?Sized,
        F: FnMut() -> Result<()>,
    {
        let selected = self.index.select_digital(modulations, flags).ok_or_else(|| {
            TunerError::NotFound(format!(
                "no digital firmware for modulations {modulations:#x} with flags {flags:#06x}"
            ))
        })?;
        self.load_selected(SectionKind::Digital, selected, bus, delay, reset)
    }

    /// Load the matching analog image; returns whether anything was written
    pub fn load_analog<T, D, F>(
        &mut self,
        bus: &mut T,
        delay: &mut D,
        video: u32,
        audio: u32,
        flags: u16,
        reset: F,
    ) -> Result<bool>
    where
        T: Transport + ?Sized,
        D: DelayNs + ?Sized,
        F: FnMut() -> Result<()>,
    {
        let selected = self.index.select_analog(video, audio, flags).ok_or_else(|| {
            TunerError::NotFound(format!(
                "no analog firmware for video {video:#x} audio {audio:#x} with flags {flags:#06x}"
            ))
        })?;
        self.load_selected(SectionKind::Analog, selected, bus, delay, reset)
    }

    /// Send table `table` of the matching scan-code image; returns whether
    /// anything was written
    pub fn load_scan_code<T>(
        &mut self,
        bus: &mut T,
        ifreq_khz: u16,
        flags: u16,
        table: u8,
    ) -> Result<bool>
    where
        T: Transport + ?Sized,
    {
        let selected = self.index.select_scan_code(ifreq_khz, flags).ok_or_else(|| {
            TunerError::NotFound(format!(
                "no scan-code firmware for IF {ifreq_khz} kHz with flags {flags:#06x}"
            ))
        })?;
        if self.current[SectionKind::Base.slot()].is_none() {
            return Err(TunerError::NotReady(
                "scan code requested before base firmware".to_string(),
            ));
        }
        let slot = SectionKind::ScanCode.slot();
        if self.current[slot] == Some(selected) && self.scan_table == Some(table) {
            return Ok(false);
        }

        let span = self.index.scan_code[selected].span;
        let start = self.index.raw_offset + span.offset as usize;
        let payload = &self.image.bytes()[start..start + span.size as usize];
        let stride = payload.len() / SCODE_TABLES;
        if payload.len() % SCODE_TABLES != 0 || stride < SCODE_TABLE_LEN {
            return Err(TunerError::InvalidFormat(format!(
                "scan-code image #{selected} is {} bytes, not {} tables",
                payload.len(),
                SCODE_TABLES
            )));
        }
        if usize::from(table) >= SCODE_TABLES {
            return Err(TunerError::InvalidArgument(format!(
                "scan-code table {table} out of range (0..{SCODE_TABLES})"
            )));
        }
        // 14-byte tables carry their IF in the first two bytes
        let begin = usize::from(table) * stride + (stride - SCODE_TABLE_LEN);
        let codes = &payload[begin..begin + SCODE_TABLE_LEN];

        self.current[slot] = None;
        self.scan_table = None;
        let preamble: [u8; 4] = if self.index.version < SCODE_PREAMBLE_VERSION {
            [0x20, 0x00, 0x00, 0x00]
        } else {
            [0xA0, 0x00, 0x00, 0x00]
        };
        bus.write(&preamble)?;
        bus.write(codes)?;
        bus.write(&[0x00, 0x8C])?;
        info!(
            "loaded scan-code firmware #{} table {} (IF {} kHz)",
            selected, table, self.index.scan_code[selected].ifreq_khz
        );
        self.current[slot] = Some(selected);
        self.scan_table = Some(table);
        Ok(true)
    }

    fn load_selected<T, D, F>(
        &mut self,
        kind: SectionKind,
        selected: usize,
        bus: &mut T,
        delay: &mut D,
        reset: F,
    ) -> Result<bool>
    where
        T: Transport + ?Sized,
        D: DelayNs + ?Sized,
        F: FnMut() -> Result<()>,
    {
        if self.current[SectionKind::Base.slot()].is_none() {
            return Err(TunerError::NotReady(format!(
                "{} firmware requested before base firmware",
                kind.name()
            )));
        }
        if self.current[kind.slot()] == Some(selected) {
            return Ok(false);
        }
        self.transfer(kind, selected, bus, delay, reset)?;
        Ok(true)
    }

    fn transfer<T, D, F>(
        &mut self,
        kind: SectionKind,
        selected: usize,
        bus: &mut T,
        delay: &mut D,
        reset: F,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
        D: DelayNs + ?Sized,
        F: FnMut() -> Result<()>,
    {
        let span = self.index.span(kind, selected).ok_or_else(|| {
            TunerError::NotFound(format!("{} firmware #{selected} does not exist", kind.name()))
        })?;
        let start = self.index.raw_offset + span.offset as usize;
        let payload = &self.image.bytes()[start..start + span.size as usize];
        info!(
            "loading {} firmware #{} ({} bytes)",
            kind.name(),
            selected,
            span.size
        );
        // A failed transfer leaves the chip in an unknown state.
        self.current[kind.slot()] = None;
        bytecode::run(payload, bus, delay, reset)?;
        self.current[kind.slot()] = Some(selected);
        Ok(())
    }
}
