//! Super I/O register access.
//!
//! The chip is addressed through an index/data port pair: the register index is written to the
//! base port and its value is read from or written to the port directly after it.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::Error;

/// Default index port of the NCT679x Super I/O chips found on MSI boards.
pub const DEFAULT_PORT: u16 = 0x4e;

const DEV_PORT: &str = "/dev/port";

/// Unlock sequence for the extended function registers, written twice.
const EXTENDED_FUNCTION_ENTER: u8 = 0x87;
const EXTENDED_FUNCTION_EXIT: u8 = 0xaa;

/// Byte-level Super I/O register access.
pub trait SuperIo {
    /// Read a configuration register.
    fn inb(&mut self, reg: u8) -> io::Result<u8>;

    /// Write a configuration register.
    fn outb(&mut self, reg: u8, val: u8) -> io::Result<()>;
}

/// Super I/O access through `/dev/port`.
///
/// Extended function mode is entered on open and left again once this is dropped.
pub struct DevPort {
    file: File,
    port: u16,
    data_port: u16,
}

impl DevPort {
    pub fn open(port: u16) -> Result<Self, Error> {
        let data_port = data_port(port).map_err(|source| Error::Io { path: DEV_PORT, source })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(DEV_PORT)
            .map_err(|source| Error::Io { path: DEV_PORT, source })?;

        let mut dev_port = Self { file, port, data_port };
        dev_port.enter().map_err(|source| Error::Io { path: DEV_PORT, source })?;

        log::debug!("Opened Super I/O at {:#04x}", port);

        Ok(dev_port)
    }

    fn enter(&mut self) -> io::Result<()> {
        let port = self.port;
        self.write_port(port, EXTENDED_FUNCTION_ENTER)?;
        self.write_port(port, EXTENDED_FUNCTION_ENTER)
    }

    fn write_port(&mut self, port: u16, val: u8) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(port.into()))?;
        self.file.write_all(&[val])
    }

    fn read_port(&mut self, port: u16) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.file.seek(SeekFrom::Start(port.into()))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl SuperIo for DevPort {
    fn inb(&mut self, reg: u8) -> io::Result<u8> {
        let (port, data_port) = (self.port, self.data_port);
        self.write_port(port, reg)?;
        self.read_port(data_port)
    }

    fn outb(&mut self, reg: u8, val: u8) -> io::Result<()> {
        let (port, data_port) = (self.port, self.data_port);
        self.write_port(port, reg)?;
        self.write_port(data_port, val)
    }
}

impl Drop for DevPort {
    fn drop(&mut self) {
        let port = self.port;
        if let Err(err) = self.write_port(port, EXTENDED_FUNCTION_EXIT) {
            log::warn!("Unable to leave Super I/O extended function mode: {}", err);
        }
    }
}

/// Data port belonging to an index port.
fn data_port(port: u16) -> io::Result<u16> {
    port.checked_add(1).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("no data port after {:#06x}", port))
    })
}

/// Register recorder for driver tests.
#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::io;

    use super::SuperIo;

    #[derive(Default)]
    pub struct MockSuperIo {
        /// Current register values, used to answer reads.
        pub registers: HashMap<u8, u8>,
        /// Every write in order.
        pub writes: Vec<(u8, u8)>,
        /// Every read in order.
        pub reads: Vec<u8>,
    }

    impl MockSuperIo {
        pub fn with_register(mut self, reg: u8, val: u8) -> Self {
            self.registers.insert(reg, val);
            self
        }

        /// Last value written to a register.
        pub fn last_write(&self, reg: u8) -> Option<u8> {
            self.writes.iter().rev().find(|(r, _)| *r == reg).map(|(_, val)| *val)
        }
    }

    impl SuperIo for MockSuperIo {
        fn inb(&mut self, reg: u8) -> io::Result<u8> {
            self.reads.push(reg);
            Ok(self.registers.get(&reg).copied().unwrap_or_default())
        }

        fn outb(&mut self, reg: u8, val: u8) -> io::Result<()> {
            self.writes.push((reg, val));
            self.registers.insert(reg, val);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_port_follows_index_port() {
        assert_eq!(data_port(DEFAULT_PORT).unwrap(), 0x4f);
        assert_eq!(data_port(0x2e).unwrap(), 0x2f);
    }

    #[test]
    fn last_port_has_no_data_port() {
        let err = data_port(u16::MAX).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
