//! Node codec: serializes a single tree node to/from exactly one fixed-size
//! block.
//!
//! Block layout (1024 bytes):
//!   byte 0        internal flag (bool)
//!   bytes 1..5    entry count `n` (i32, big-endian)
//!   bytes 5..     `n` entries of `key_size + 8` bytes each: raw key bytes
//!                 followed by an 8-byte big-endian integer (child pointer
//!                 for internal nodes, value-offset for leaves)

use crate::block_device::BlockDevice;
use crate::error::{IndexError, Result};
use crate::layout::{BLOCK_SIZE, NODE_HEADER_SIZE};

/// A single key paired with either a value-offset (leaf) or a child block
/// pointer (internal) in the `slot` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub slot: i64,
}

impl Entry {
    pub fn leaf(key: Vec<u8>, value_offset: u64) -> Self {
        Entry { key, slot: value_offset as i64 }
    }

    pub fn internal(key: Vec<u8>, child_offset: u64) -> Self {
        Entry { key, slot: child_offset as i64 }
    }

    pub fn child_offset(&self) -> u64 {
        self.slot as u64
    }

    pub fn value_offset(&self) -> u64 {
        self.slot as u64
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub internal: bool,
    pub entries: Vec<Entry>,
}

impl Node {
    pub fn empty_leaf() -> Self {
        Node { internal: false, entries: Vec::new() }
    }

    pub fn read(device: &mut BlockDevice, offset: u64, key_size: usize, m: usize) -> Result<Self> {
        device.seek(offset)?;
        let internal = device.read_bool_strict()?;
        let n = device.read_i32()?;
        if n < 0 || n as usize >= m {
            return Err(IndexError::CorruptIndex(format!(
                "node at offset {} has entry count {} outside [0, {})",
                offset, n, m
            )));
        }
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let key = device.read_bytes(key_size)?;
            let slot = device.read_i64()?;
            entries.push(Entry { key, slot });
        }
        Ok(Node { internal, entries })
    }

    pub fn write(&self, device: &mut BlockDevice, offset: u64) -> Result<()> {
        device.seek(offset)?;
        device.write_bool(self.internal)?;
        device.write_i32(self.entries.len() as i32)?;
        for entry in &self.entries {
            device.write_bytes(&entry.key)?;
            device.write_i64(entry.slot)?;
        }
        Ok(())
    }
}

/// `M = floor(1019 / (keySize + 8))`. `1019` is `1024 - 5`: the block size
/// minus the node header (1-byte flag + 4-byte count).
pub fn branching_factor(key_size: usize) -> Result<usize> {
    if key_size == 0 {
        return Err(IndexError::BadArgument("key size must be > 0".into()));
    }
    let entry_size = key_size as u64 + 8;
    let usable = BLOCK_SIZE - NODE_HEADER_SIZE;
    let m = (usable / entry_size) as usize;
    if m < 4 {
        return Err(IndexError::BadArgument(format!(
            "key size {} yields branching factor {} < 4",
            key_size, m
        )));
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_device::BlockDevice;

    #[test]
    fn branching_factor_matches_formula() {
        // 1019 / (8 + 8) = 63
        assert_eq!(63, branching_factor(8).unwrap());
        // 1019 / (1 + 8) = 113
        assert_eq!(113, branching_factor(1).unwrap());
    }

    #[test]
    fn branching_factor_rejects_too_large_keys() {
        assert!(branching_factor(300).is_err());
    }

    #[test]
    fn leaf_node_round_trips_through_codec() {
        let mut dev = BlockDevice::open(tempfile_path()).unwrap();
        let node = Node {
            internal: false,
            entries: vec![
                Entry::leaf(b"AAA".to_vec(), 0),
                Entry::leaf(b"BBB".to_vec(), 9),
            ],
        };
        node.write(&mut dev, 1024).unwrap();
        let read_back = Node::read(&mut dev, 1024, 3, 63).unwrap();
        assert_eq!(false, read_back.internal);
        assert_eq!(node.entries, read_back.entries);
    }

    #[test]
    fn internal_node_round_trips_through_codec() {
        let mut dev = BlockDevice::open(tempfile_path()).unwrap();
        let node = Node {
            internal: true,
            entries: vec![
                Entry::internal(b"AAA".to_vec(), 2048),
                Entry::internal(b"MMM".to_vec(), 3072),
            ],
        };
        node.write(&mut dev, 1024).unwrap();
        let read_back = Node::read(&mut dev, 1024, 3, 63).unwrap();
        assert!(read_back.internal);
        assert_eq!(2048, read_back.entries[0].child_offset());
        assert_eq!(3072, read_back.entries[1].child_offset());
    }

    #[test]
    fn corrupt_entry_count_is_rejected() {
        let mut dev = BlockDevice::open(tempfile_path()).unwrap();
        dev.seek(1024).unwrap();
        dev.write_bool(false).unwrap();
        dev.write_i32(999).unwrap();
        assert!(Node::read(&mut dev, 1024, 8, 63).is_err());
    }

    #[test]
    fn corrupt_internal_flag_byte_is_rejected() {
        let mut dev = BlockDevice::open(tempfile_path()).unwrap();
        dev.seek(1024).unwrap();
        dev.write_byte(0x42).unwrap();
        dev.write_i32(0).unwrap();
        match Node::read(&mut dev, 1024, 8, 63) {
            Err(IndexError::CorruptIndex(_)) => {}
            other => panic!("expected CorruptIndex, got {:?}", other.err()),
        }
    }

    fn tempfile_path() -> std::path::PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_test.idx");
        std::mem::forget(dir);
        path
    }
}
