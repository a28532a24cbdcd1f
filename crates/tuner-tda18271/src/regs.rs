//! Register map and shadow copy
//!
//! The chip is programmed by writing a contiguous run of registers after a
//! start address. Reads always start at register 0 and return either the
//! sixteen main registers or the whole map. The driver keeps a shadow of the
//! map and edits it before every write.

use std::ops::{Index, IndexMut};

use tracing::trace;
use tuner_core::{Result, Transport, TunerError};

/// Register addresses
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reg {
    Id = 0,
    Thermo,
    PowerLevel,
    EasyProg1,
    EasyProg2,
    EasyProg3,
    EasyProg4,
    EasyProg5,
    CalPostDiv,
    CalDiv1,
    CalDiv2,
    CalDiv3,
    PostDiv,
    Div1,
    Div2,
    Div3,
    Ext1,
    Ext2,
    Ext3,
    Ext4,
    Ext5,
    Ext6,
    Ext7,
    Ext8,
    Ext9,
    Ext10,
    Ext11,
    Ext12,
    Ext13,
    Ext14,
    Ext15,
    Ext16,
    Ext17,
    Ext18,
    Ext19,
    Ext20,
    Ext21,
    Ext22,
    Ext23,
}

/// Number of registers in the map
pub const NUM_REGS: usize = 39;

/// Registers returned by a read that stops before the extended block
pub const MAIN_REGS: usize = Reg::Ext1 as usize;

impl Reg {
    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// Shadow copy of the register map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u8; NUM_REGS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            regs: [0; NUM_REGS],
        }
    }
}

impl Index<Reg> for RegisterFile {
    type Output = u8;

    fn index(&self, reg: Reg) -> &u8 {
        &self.regs[reg as usize]
    }
}

impl IndexMut<Reg> for RegisterFile {
    fn index_mut(&mut self, reg: Reg) -> &mut u8 {
        &mut self.regs[reg as usize]
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shadow values for `start..=end`
    pub fn range(&self, start: Reg, end: Reg) -> &[u8] {
        &self.regs[start as usize..=end as usize]
    }

    /// Replace `reg`'s bits under `mask` with `value`
    pub fn update(&mut self, reg: Reg, mask: u8, value: u8) {
        let r = &mut self[reg];
        *r = (*r & !mask) | (value & mask);
    }

    /// Write the shadow values of `start..=end` in one transaction
    pub fn write<T: Transport + ?Sized>(&self, bus: &mut T, start: Reg, end: Reg) -> Result<()> {
        check_range(start, end)?;
        let mut buf = Vec::with_capacity(NUM_REGS + 1);
        buf.push(start.addr());
        buf.extend_from_slice(self.range(start, end));
        trace!("tda18271 write {:?}..={:?} {:02X?}", start, end, &buf[1..]);
        bus.write(&buf)?;
        Ok(())
    }

    /// Write a single register
    pub fn write_one<T: Transport + ?Sized>(&self, bus: &mut T, reg: Reg) -> Result<()> {
        self.write(bus, reg, reg)
    }

    /// Refresh `start..=end` from the chip
    pub fn read<T: Transport + ?Sized>(&mut self, bus: &mut T, start: Reg, end: Reg) -> Result<()> {
        check_range(start, end)?;
        let count = if end >= Reg::Ext1 { NUM_REGS } else { MAIN_REGS };
        let mut buf = [0u8; NUM_REGS];
        bus.transact(&[0x00], &mut buf[..count])?;
        let (s, e) = (start as usize, end as usize);
        self.regs[s..=e].copy_from_slice(&buf[s..=e]);
        trace!("tda18271 read {:?}..={:?} {:02X?}", start, end, &buf[s..=e]);
        Ok(())
    }
}

fn check_range(start: Reg, end: Reg) -> Result<()> {
    if end < start {
        return Err(TunerError::InvalidArgument(format!(
            "register range {start:?}..={end:?} is reversed"
        )));
    }
    Ok(())
}
