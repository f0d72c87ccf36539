//! Index lifecycle: create a new index over a data file, reopen an existing
//! one from its meta-block, and drive the range-scan.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::block_device::BlockDevice;
use crate::datafile::DataFile;
use crate::error::{IndexError, Result};
use crate::layout::{META_HEIGHT_OFFSET, META_KEYSIZE_OFFSET, META_PATH_LEN, META_PATH_OFFSET};
use crate::tree::BTree;

/// Outcome of `Index::insert_record`: either the record was appended and
/// indexed, or the key already existed and nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { offset: u64 },
    AlreadyPresent { offset: u64 },
}

/// A line rejected during bulk `create` because its key already appeared
/// earlier in the data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateLine {
    pub key: Vec<u8>,
    pub first_offset: u64,
    pub duplicate_offset: u64,
}

pub struct Index {
    tree: BTree,
    data: DataFile,
}

impl Index {
    /// Create a brand-new index file, then bulk-load it from `data_path`:
    /// every line whose key is not yet present is inserted; duplicates are
    /// collected (and reported by the caller) rather than causing failure.
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(
        data_path: P,
        key_size: usize,
        index_path: Q,
    ) -> Result<(Self, Vec<DuplicateLine>)> {
        if key_size == 0 {
            return Err(IndexError::BadArgument("key size must be > 0".into()));
        }
        let mut device = BlockDevice::open(index_path.as_ref())?;
        write_meta_header(&mut device, data_path.as_ref(), key_size as i32, 0)?;
        let tree = BTree::create(device, key_size)?;
        let data = DataFile::open(data_path.as_ref())?;

        let mut index = Index { tree, data };
        info!(
            "created index at {:?} over data file {:?} (key_size={})",
            index_path.as_ref(),
            data_path.as_ref(),
            key_size
        );

        let lines = index.data.lines()?;
        let mut duplicates = Vec::new();
        for (offset, line) in lines {
            if line.len() < key_size {
                return Err(IndexError::BadArgument(format!(
                    "line at offset {} is shorter than key size {}",
                    offset, key_size
                )));
            }
            let key = line.as_bytes()[..key_size].to_vec();
            match index.tree.search(&key)? {
                Some(existing) => {
                    warn!("duplicate key at offset {} (first seen at {})", offset, existing);
                    duplicates.push(DuplicateLine {
                        key,
                        first_offset: existing,
                        duplicate_offset: offset,
                    });
                }
                None => {
                    index.tree.insert(&key, offset)?;
                }
            }
        }
        Ok((index, duplicates))
    }

    /// Reopen an existing index: read the meta-block, open the data file it
    /// points at, and materialize the root from block 1.
    pub fn open<P: AsRef<Path>>(index_path: P) -> Result<Self> {
        let mut device = BlockDevice::open(index_path.as_ref())?;
        let (data_path, key_size, height) = read_meta_header(&mut device)?;
        let tree = BTree::open(device, key_size, height)?;
        let data = DataFile::open(&data_path)?;
        debug!("opened index {:?} (key_size={}, height={})", index_path.as_ref(), key_size, height);
        Ok(Index { tree, data })
    }

    pub fn key_size(&self) -> usize {
        self.tree.key_size()
    }

    pub fn height(&self) -> i32 {
        self.tree.height()
    }

    /// Look up `key`; on a hit, also read the full line it points to.
    pub fn find(&mut self, key: &[u8]) -> Result<Option<(u64, String)>> {
        match self.tree.search(key)? {
            None => Ok(None),
            Some(offset) => {
                let line = self.data.read_line_at(offset)?;
                Ok(Some((offset, line)))
            }
        }
    }

    /// Take the first `key_size` bytes of `record` as the key. If it's
    /// already indexed, report its existing offset and do nothing.
    /// Otherwise append `record` to the data file and insert into the tree.
    pub fn insert_record(&mut self, record: &str) -> Result<InsertOutcome> {
        let key_size = self.tree.key_size();
        if record.len() < key_size {
            return Err(IndexError::BadArgument(format!(
                "record is shorter than key size {}",
                key_size
            )));
        }
        let key = record.as_bytes()[..key_size].to_vec();
        if let Some(existing) = self.tree.search(&key)? {
            return Ok(InsertOutcome::AlreadyPresent { offset: existing });
        }
        let offset = self.data.append(record)?;
        self.tree.insert(&key, offset)?;
        Ok(InsertOutcome::Inserted { offset })
    }

    /// Print-ready driver for `list`: up to `k` lines with keys `>= probe`,
    /// in ascending key order.
    pub fn list(&mut self, probe: &[u8], k: usize) -> Result<Vec<String>> {
        let mut offsets = Vec::new();
        self.tree.range_list(probe, k, |entry| {
            offsets.push(entry.value_offset());
            Ok(())
        })?;
        offsets
            .into_iter()
            .map(|offset| self.data.read_line_at(offset))
            .collect()
    }

    pub fn close(self) -> Result<()> {
        self.tree.close()?;
        self.data.close()
    }
}

fn write_meta_header(device: &mut BlockDevice, data_path: &Path, key_size: i32, height: i32) -> Result<()> {
    let path_bytes = data_path.to_string_lossy().into_owned().into_bytes();
    if path_bytes.len() > META_PATH_LEN {
        return Err(IndexError::BadArgument(format!(
            "data file path is longer than {} bytes",
            META_PATH_LEN
        )));
    }
    let mut padded = vec![0u8; META_PATH_LEN];
    padded[..path_bytes.len()].copy_from_slice(&path_bytes);

    device.seek(META_PATH_OFFSET)?;
    device.write_bytes(&padded)?;
    device.seek(META_KEYSIZE_OFFSET)?;
    device.write_i32(key_size)?;
    device.seek(META_HEIGHT_OFFSET)?;
    device.write_i32(height)?;
    // Reserved tail of the meta-block, zeroed for determinism.
    device.write_bytes(&vec![0u8; (1024 - 264) as usize])?;
    Ok(())
}

fn read_meta_header(device: &mut BlockDevice) -> Result<(PathBuf, usize, i32)> {
    device.seek(META_PATH_OFFSET)?;
    let raw_path = device.read_bytes(META_PATH_LEN)?;
    let trimmed_len = raw_path
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(raw_path.len());
    let path_str = std::str::from_utf8(&raw_path[..trimmed_len])
        .map_err(|_| IndexError::CorruptIndex("meta-block data-file path is not UTF-8".into()))?
        .trim_end();

    device.seek(META_KEYSIZE_OFFSET)?;
    let key_size = device.read_i32()?;
    if key_size <= 0 {
        return Err(IndexError::CorruptIndex(format!("meta-block key size {} is not positive", key_size)));
    }

    device.seek(META_HEIGHT_OFFSET)?;
    let height = device.read_i32()?;
    if height < 0 {
        return Err(IndexError::CorruptIndex(format!("meta-block height {} is negative", height)));
    }

    Ok((PathBuf::from(path_str), key_size as usize, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn tmp_paths() -> (PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.txt");
        let idx = dir.path().join("data.idx");
        std::mem::forget(dir);
        (data, idx)
    }

    fn write_data_file(path: &Path, lines: &[&str]) {
        let mut f = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
    }

    #[test]
    fn create_and_find_s1() {
        let (data, idx) = tmp_paths();
        write_data_file(&data, &["AAAhello", "BBBworld", "CCCfoo"]);
        let (mut index, dups) = Index::create(&data, 3, &idx).unwrap();
        assert!(dups.is_empty());
        let (offset, line) = index.find(b"BBB").unwrap().unwrap();
        assert_eq!(9, offset);
        assert_eq!("BBBworld", line);
    }

    #[test]
    fn duplicate_rejection_s2() {
        let (data, idx) = tmp_paths();
        write_data_file(&data, &["KEYone", "KEYtwo"]);
        let (mut index, dups) = Index::create(&data, 3, &idx).unwrap();
        assert_eq!(1, dups.len());
        assert_eq!(0, dups[0].first_offset);
        let (offset, _) = index.find(b"KEY").unwrap().unwrap();
        assert_eq!(0, offset);
    }

    #[test]
    fn insert_then_persist_across_reopen_s3() {
        let (data, idx) = tmp_paths();
        write_data_file(&data, &["AAAhello", "BBBworld", "CCCfoo"]);
        {
            let (mut index, _) = Index::create(&data, 3, &idx).unwrap();
            let outcome = index.insert_record("DDDbar").unwrap();
            match outcome {
                InsertOutcome::Inserted { offset } => assert_eq!(25, offset),
                other => panic!("expected Inserted, got {:?}", other),
            }
            index.close().unwrap();
        }
        let mut reopened = Index::open(&idx).unwrap();
        let (offset, line) = reopened.find(b"DDD").unwrap().unwrap();
        assert_eq!(25, offset);
        assert_eq!("DDDbar", line);
    }

    #[test]
    fn insert_existing_key_is_noop() {
        let (data, idx) = tmp_paths();
        write_data_file(&data, &["AAAhello"]);
        let (mut index, _) = Index::create(&data, 3, &idx).unwrap();
        let outcome = index.insert_record("AAAagain").unwrap();
        assert_eq!(InsertOutcome::AlreadyPresent { offset: 0 }, outcome);
    }

    #[test]
    fn range_list_s4() {
        let (data, idx) = tmp_paths();
        write_data_file(&data, &["AAAhello", "BBBworld", "CCCfoo"]);
        let (mut index, _) = Index::create(&data, 3, &idx).unwrap();
        index.insert_record("AABxxx").unwrap();
        index.insert_record("BBAxxx").unwrap();
        index.insert_record("DDDxxx").unwrap();

        let lines = index.list(b"BBA", 3).unwrap();
        assert_eq!(
            vec!["BBAxxx".to_string(), "BBBworld".to_string(), "CCCfoo".to_string()],
            lines
        );
    }
}
