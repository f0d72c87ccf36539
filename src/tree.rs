//! The persistent B-tree engine: top-down insertion with eager node
//! splitting and root promotion, over a single block-addressed file.

use log::{debug, info};

use crate::block_device::BlockDevice;
use crate::error::{IndexError, Result};
use crate::layout::{BLOCK_SIZE, META_HEIGHT_OFFSET, ROOT_BLOCK_OFFSET};
use crate::node::{branching_factor, Entry, Node};

enum InsertResult {
    Absorbed,
    Split { sibling: Node, sibling_offset: u64 },
}

/// Owns the root node, current height, branching factor, and node count for
/// one open index. All other nodes are paged in and out on demand.
pub struct BTree {
    device: BlockDevice,
    key_size: usize,
    m: usize,
    height: i32,
    node_count: u64,
    root: Node,
}

impl BTree {
    /// Allocate a brand-new tree: an empty leaf root at block offset 1024,
    /// height 0, one live node (the root).
    pub fn create(mut device: BlockDevice, key_size: usize) -> Result<Self> {
        let m = branching_factor(key_size)?;
        let root = Node::empty_leaf();
        root.write(&mut device, ROOT_BLOCK_OFFSET)?;
        Ok(BTree { device, key_size, m, height: 0, node_count: 1, root })
    }

    /// Reopen an existing tree. `height` is whatever was read from the
    /// meta-block at offset 260; `node_count` is derived from file length.
    pub fn open(mut device: BlockDevice, key_size: usize, height: i32) -> Result<Self> {
        let m = branching_factor(key_size)?;
        let length = device.length()?;
        if length % BLOCK_SIZE != 0 {
            return Err(IndexError::CorruptIndex(format!(
                "index file length {} is not a multiple of the block size",
                length
            )));
        }
        let node_count = length / BLOCK_SIZE - 1;
        let root = Node::read(&mut device, ROOT_BLOCK_OFFSET, key_size, m)?;
        Ok(BTree { device, key_size, m, height, node_count, root })
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn close(self) -> Result<()> {
        self.device.close()
    }

    /// search(key) -> offset | NotFound. Descends `height` levels from the
    /// root, O(log n) node visits and O(M) per visit.
    pub fn search(&mut self, key: &[u8]) -> Result<Option<u64>> {
        self.check_key(key)?;
        let mut node = self.root.clone();
        let mut depth = self.height;
        while depth > 0 {
            let j = Self::child_index(&node, key);
            let child_offset = node.entries[j].child_offset();
            node = self.read_node(child_offset)?;
            depth -= 1;
        }
        Ok(node.entries.iter().find(|e| e.key == key).map(|e| e.value_offset()))
    }

    /// insert(key, valueOffset). Rejects keys already present (`DuplicateKey`)
    /// or of the wrong length (`BadArgument`).
    pub fn insert(&mut self, key: &[u8], value_offset: u64) -> Result<()> {
        self.check_key(key)?;
        if self.search(key)?.is_some() {
            return Err(IndexError::DuplicateKey);
        }
        let root = self.root.clone();
        let height = self.height;
        match self.insert_into(root, ROOT_BLOCK_OFFSET, height, key, value_offset as i64)? {
            InsertResult::Absorbed => Ok(()),
            InsertResult::Split { sibling, sibling_offset } => {
                self.promote_root(sibling, sibling_offset)
            }
        }
    }

    /// Emit the up-to-`k` leaf entries with keys `>= probe`, in ascending
    /// order, via `emit`. Descends once to the first candidate leaf, then
    /// streams forward using a parent-cursor stack.
    pub fn range_list<F>(&mut self, probe: &[u8], k: usize, mut emit: F) -> Result<()>
    where
        F: FnMut(&Entry) -> Result<()>,
    {
        if k == 0 {
            return Ok(());
        }

        let mut stack: Vec<(Node, usize)> = Vec::new();
        let mut node = self.root.clone();
        let mut depth = self.height;
        while depth > 0 {
            let j = Self::child_index(&node, probe);
            let child_offset = node.entries[j].child_offset();
            stack.push((node, j + 1));
            node = self.read_node(child_offset)?;
            depth -= 1;
        }

        let mut idx = node
            .entries
            .iter()
            .position(|e| e.key.as_slice() >= probe)
            .unwrap_or_else(|| node.entries.len());
        let mut leaf = node;
        let mut emitted = 0usize;

        'walk: loop {
            while idx < leaf.entries.len() {
                if emitted == k {
                    return Ok(());
                }
                emit(&leaf.entries[idx])?;
                emitted += 1;
                idx += 1;
            }
            while let Some((parent, next_child)) = stack.pop() {
                if next_child >= parent.entries.len() {
                    continue;
                }
                let mut offset = parent.entries[next_child].child_offset();
                stack.push((parent, next_child + 1));
                let mut cur = self.read_node(offset)?;
                while cur.internal {
                    offset = cur.entries[0].child_offset();
                    stack.push((cur, 1));
                    cur = self.read_node(offset)?;
                }
                leaf = cur;
                idx = 0;
                continue 'walk;
            }
            return Ok(());
        }
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(IndexError::BadArgument("key must not be empty".into()));
        }
        if key.len() != self.key_size {
            return Err(IndexError::BadArgument(format!(
                "key length {} does not match index key size {}",
                key.len(),
                self.key_size
            )));
        }
        Ok(())
    }

    /// Choose entry `j` such that either `j` is the last entry, or
    /// `key < entries[j + 1].key`. Shared by search and range-list descent.
    fn child_index(node: &Node, key: &[u8]) -> usize {
        let n = node.entries.len();
        for j in 0..n {
            if j == n - 1 || key < node.entries[j + 1].key.as_slice() {
                return j;
            }
        }
        unreachable!("internal node must have at least one entry")
    }

    fn insert_into(
        &mut self,
        mut node: Node,
        offset: u64,
        depth: i32,
        key: &[u8],
        slot: i64,
    ) -> Result<InsertResult> {
        if depth == 0 {
            let j = node
                .entries
                .iter()
                .position(|e| e.key.as_slice() > key)
                .unwrap_or_else(|| node.entries.len());
            node.entries.insert(j, Entry { key: key.to_vec(), slot });
            self.finish_insert(node, offset)
        } else {
            let j = Self::child_index(&node, key);
            let child_offset = node.entries[j].child_offset();
            let child = self.read_node(child_offset)?;
            match self.insert_into(child, child_offset, depth - 1, key, slot)? {
                InsertResult::Absorbed => Ok(InsertResult::Absorbed),
                InsertResult::Split { sibling, sibling_offset } => {
                    let entry = Entry::internal(sibling.entries[0].key.clone(), sibling_offset);
                    node.entries.insert(j + 1, entry);
                    self.finish_insert(node, offset)
                }
            }
        }
    }

    fn finish_insert(&mut self, node: Node, offset: u64) -> Result<InsertResult> {
        if node.entries.len() < self.m {
            self.persist(&node, offset)?;
            Ok(InsertResult::Absorbed)
        } else {
            self.split_node(node, offset)
        }
    }

    /// Move the upper half of an overfull node into a freshly allocated
    /// sibling and persist both halves.
    fn split_node(&mut self, mut node: Node, offset: u64) -> Result<InsertResult> {
        let mid = self.m / 2;
        let sibling_entries = node.entries.split_off(mid);
        let sibling = Node { internal: node.internal, entries: sibling_entries };
        let sibling_offset = self.allocate_block()?;
        self.persist(&node, offset)?;
        self.persist(&sibling, sibling_offset)?;
        debug!(
            "split node at offset {} into {} (n={}) and {} (n={})",
            offset,
            offset,
            node.entries.len(),
            sibling_offset,
            sibling.entries.len()
        );
        Ok(InsertResult::Split { sibling, sibling_offset })
    }

    /// Copy the (already-split) root content to a new block, then build a
    /// fresh two-entry internal root at the fixed root offset.
    fn promote_root(&mut self, sibling: Node, sibling_offset: u64) -> Result<()> {
        let left = self.root.clone();
        let left_offset = self.allocate_block()?;
        self.persist(&left, left_offset)?;

        let new_root = Node {
            internal: true,
            entries: vec![
                Entry::internal(left.entries[0].key.clone(), left_offset),
                Entry::internal(sibling.entries[0].key.clone(), sibling_offset),
            ],
        };
        self.persist(&new_root, ROOT_BLOCK_OFFSET)?;
        self.height += 1;
        self.write_height()?;
        info!(
            "root promoted: height={} node_count={} left_offset={} sibling_offset={}",
            self.height, self.node_count, left_offset, sibling_offset
        );
        Ok(())
    }

    fn allocate_block(&mut self) -> Result<u64> {
        self.node_count += 1;
        Ok(self.node_count * BLOCK_SIZE)
    }

    fn persist(&mut self, node: &Node, offset: u64) -> Result<()> {
        node.write(&mut self.device, offset)?;
        if offset == ROOT_BLOCK_OFFSET {
            self.root = node.clone();
        }
        Ok(())
    }

    fn read_node(&mut self, offset: u64) -> Result<Node> {
        Node::read(&mut self.device, offset, self.key_size, self.m)
    }

    fn write_height(&mut self) -> Result<()> {
        self.device.seek(META_HEIGHT_OFFSET)?;
        self.device.write_i32(self.height)
    }
}
