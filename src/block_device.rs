//! Thin wrapper over a random-access file: seek, fixed-width integer and
//! boolean I/O, and raw byte runs. All multi-byte integers are big-endian,
//! matching the on-disk layout in the node codec and meta-block.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{IndexError, Result};

pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())
            .map_err(|e| IndexError::io(0, 0, e))?;
        Ok(BlockDevice { file })
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IndexError::io(offset, 0, e))?;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        self.file
            .seek(SeekFrom::Current(0))
            .map_err(|e| IndexError::io(0, 0, e))
    }

    pub fn length(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| IndexError::io(0, 0, e))
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let offset = self.position()?;
        self.file
            .read_u8()
            .map_err(|e| IndexError::io(offset, 1, e))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0x00)
    }

    /// Like `read_bool`, but rejects any byte other than `0x00`/`0x01`
    /// instead of treating every nonzero byte as `true`.
    pub fn read_bool_strict(&mut self) -> Result<bool> {
        let offset = self.position()?;
        match self.file.read_u8().map_err(|e| IndexError::io(offset, 1, e))? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(IndexError::CorruptIndex(format!(
                "flag byte at offset {} is {:#04x}, expected 0x00 or 0x01",
                offset, other
            ))),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let offset = self.position()?;
        self.file
            .read_i32::<BigEndian>()
            .map_err(|e| IndexError::io(offset, 4, e))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let offset = self.position()?;
        self.file
            .read_i64::<BigEndian>()
            .map_err(|e| IndexError::io(offset, 8, e))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let mut buf = vec![0u8; len];
        self.file
            .read_exact(&mut buf)
            .map_err(|e| IndexError::io(offset, len, e))?;
        Ok(buf)
    }

    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        let offset = self.position()?;
        self.file
            .write_u8(value)
            .map_err(|e| IndexError::io(offset, 1, e))
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(if value { 0x01 } else { 0x00 })
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        let offset = self.position()?;
        self.file
            .write_i32::<BigEndian>(value)
            .map_err(|e| IndexError::io(offset, 4, e))
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        let offset = self.position()?;
        self.file
            .write_i64::<BigEndian>(value)
            .map_err(|e| IndexError::io(offset, 8, e))
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let offset = self.position()?;
        self.file
            .write_all(bytes)
            .map_err(|e| IndexError::io(offset, bytes.len(), e))
    }

    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len).map_err(|e| IndexError::io(len, 0, e))
    }

    pub fn close(self) -> Result<()> {
        drop(self.file);
        Ok(())
    }
}
