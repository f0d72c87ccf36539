//! On-disk byte layout shared by the node codec and the index lifecycle.

/// Every block, including the meta-block, is this many bytes.
pub const BLOCK_SIZE: u64 = 1024;

/// The root node always lives at this fixed block offset.
pub const ROOT_BLOCK_OFFSET: u64 = BLOCK_SIZE;

/// Meta-block field: raw data-file path bytes. The meta-block always
/// occupies block 0, so this also marks the meta-block's start.
pub const META_PATH_OFFSET: u64 = 0;
pub const META_PATH_LEN: usize = 256;

/// Meta-block field: key size (int32).
pub const META_KEYSIZE_OFFSET: u64 = 256;

/// Meta-block field: tree height (int32), rewritten on every root promotion.
pub const META_HEIGHT_OFFSET: u64 = 260;

/// Node header: 1-byte internal flag + 4-byte entry count.
pub const NODE_HEADER_SIZE: u64 = 5;
