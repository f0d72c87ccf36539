//! Appends records to, and reads lines from, the flat text data file that
//! the index points into. The index never interprets line contents beyond
//! the fixed-length key prefix; that slicing happens in `index.rs`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{IndexError, Result};

pub struct DataFile {
    file: File,
}

impl DataFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())
            .map_err(|e| IndexError::io(0, 0, e))?;
        Ok(DataFile { file })
    }

    /// Append `line`, adding a trailing newline if it doesn't already have
    /// one. Returns the byte offset at which the line starts.
    pub fn append(&mut self, line: &str) -> Result<u64> {
        let mut bytes = line.as_bytes().to_vec();
        if bytes.last() != Some(&b'\n') {
            bytes.push(b'\n');
        }
        let offset = self
            .file
            .seek(SeekFrom::End(0))
            .map_err(|e| IndexError::io(0, 0, e))?;
        self.file
            .write_all(&bytes)
            .map_err(|e| IndexError::io(offset, bytes.len(), e))?;
        Ok(offset)
    }

    /// Read the line starting at `offset`, up to (but excluding) the next
    /// newline or EOF.
    pub fn read_line_at(&mut self, offset: u64) -> Result<String> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| IndexError::io(offset, 0, e))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut buf = Vec::new();
        reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| IndexError::io(offset, 0, e))?;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        String::from_utf8(buf)
            .map_err(|e| IndexError::CorruptIndex(format!("line at offset {} is not UTF-8: {}", offset, e)))
    }

    /// Scan the whole file from the start, returning (offset, line) for
    /// every line. Used by `create` to bulk-build an index.
    pub fn lines(&mut self) -> Result<Vec<(u64, String)>> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| IndexError::io(0, 0, e))?;
        let mut reader = BufReader::new(&mut self.file);
        let mut out = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut buf = Vec::new();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| IndexError::io(offset, 0, e))?;
            if n == 0 {
                break;
            }
            let line_offset = offset;
            offset += n as u64;
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            let line = String::from_utf8(buf).map_err(|e| {
                IndexError::CorruptIndex(format!("line at offset {} is not UTF-8: {}", line_offset, e))
            })?;
            out.push((line_offset, line));
        }
        Ok(out)
    }

    pub fn length(&self) -> Result<u64> {
        self.file.metadata().map(|m| m.len()).map_err(|e| IndexError::io(0, 0, e))
    }

    pub fn close(self) -> Result<()> {
        drop(self.file);
        Ok(())
    }
}
