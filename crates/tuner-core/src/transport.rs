//! Byte transport to a chip on the control bus
//!
//! The transport is whatever moves bytes to one bus address: an I2C adapter,
//! a device node, or a simulated bus in tests. It does no retries; every
//! failure is returned to the engine unchanged.
//!
//! [`I2cDevice`] adapts any embedded-hal 1.0 I2C bus: it pins one 7-bit
//! address and the adapter's transfer limit, and maps bus error kinds onto
//! `io::ErrorKind`.

use std::io;

use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource};

/// Byte-oriented access to one device on the control bus
pub trait Transport {
    /// Write the whole buffer as one bus transaction
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Fill the whole buffer from one bus transaction
    fn read(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Write then read, typically a register address followed by its value
    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        self.write(tx)?;
        self.read(rx)
    }

    /// Largest payload a single write may carry
    fn max_transaction(&self) -> usize {
        usize::MAX
    }

    /// Write `buf` as consecutive transactions of `element_size` bytes
    fn write_array(&mut self, buf: &[u8], element_size: usize) -> io::Result<()> {
        check_element_size(buf.len(), element_size)?;
        for element in buf.chunks(element_size) {
            self.write(element)?;
        }
        Ok(())
    }

    /// Read `buf` as consecutive transactions of `element_size` bytes
    fn read_array(&mut self, buf: &mut [u8], element_size: usize) -> io::Result<()> {
        check_element_size(buf.len(), element_size)?;
        for element in buf.chunks_mut(element_size) {
            self.read(element)?;
        }
        Ok(())
    }
}

fn check_element_size(total: usize, element_size: usize) -> io::Result<()> {
    if element_size == 0 || total % element_size != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("element size {element_size} does not divide {total} bytes"),
        ));
    }
    Ok(())
}

/// Write `buf` split into pieces no larger than the transport's limit
pub fn write_chunked<T: Transport + ?Sized>(transport: &mut T, buf: &[u8]) -> io::Result<()> {
    let limit = transport.max_transaction().max(1);
    for chunk in buf.chunks(limit) {
        transport.write(chunk)?;
    }
    Ok(())
}

/// One chip on an embedded-hal I2C bus
#[derive(Debug)]
pub struct I2cDevice<I> {
    i2c: I,
    address: u8,
    max_transaction: usize,
}

impl<I: I2c> I2cDevice<I> {
    /// Bind `i2c` to the 7-bit `address` with no transfer limit
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            max_transaction: usize::MAX,
        }
    }

    /// Cap single writes at `limit` bytes, for adapters with small FIFOs
    pub fn with_max_transaction(mut self, limit: usize) -> Self {
        self.max_transaction = limit.max(1);
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.i2c
    }
}

fn i2c_error<E: i2c::Error>(address: u8, err: E) -> io::Error {
    let kind = match err.kind() {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => io::ErrorKind::NotFound,
        ErrorKind::NoAcknowledge(_) => io::ErrorKind::ConnectionAborted,
        ErrorKind::ArbitrationLoss => io::ErrorKind::Interrupted,
        ErrorKind::Overrun => io::ErrorKind::InvalidData,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, format!("i2c {address:#04x}: {err:?}"))
}

impl<I: I2c> Transport for I2cDevice<I> {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if buf.len() > self.max_transaction {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} byte write exceeds the {} byte transfer limit",
                    buf.len(),
                    self.max_transaction
                ),
            ));
        }
        let address = self.address;
        self.i2c.write(address, buf).map_err(|e| i2c_error(address, e))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let address = self.address;
        self.i2c.read(address, buf).map_err(|e| i2c_error(address, e))
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        let address = self.address;
        self.i2c
            .write_read(address, tx, rx)
            .map_err(|e| i2c_error(address, e))
    }

    fn max_transaction(&self) -> usize {
        self.max_transaction
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read(buf)
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        (**self).transact(tx, rx)
    }

    fn max_transaction(&self) -> usize {
        (**self).max_transaction()
    }

    fn write_array(&mut self, buf: &[u8], element_size: usize) -> io::Result<()> {
        (**self).write_array(buf, element_size)
    }

    fn read_array(&mut self, buf: &mut [u8], element_size: usize) -> io::Result<()> {
        (**self).read_array(buf, element_size)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read(buf)
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        (**self).transact(tx, rx)
    }

    fn max_transaction(&self) -> usize {
        (**self).max_transaction()
    }

    fn write_array(&mut self, buf: &[u8], element_size: usize) -> io::Result<()> {
        (**self).write_array(buf, element_size)
    }

    fn read_array(&mut self, buf: &mut [u8], element_size: usize) -> io::Result<()> {
        (**self).read_array(buf, element_size)
    }
}
