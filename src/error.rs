use thiserror::Error;

/// Errors produced by the block device, node codec, tree engine, data-file
/// adaptor, and index lifecycle. `NotFound` is deliberately absent: `search`
/// returns it as a plain `Option`/enum result, not as an `Err`.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("key already indexed")]
    DuplicateKey,

    #[error("I/O error at offset {offset} (requested {len} bytes): {source}")]
    Io {
        offset: u64,
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

impl IndexError {
    pub fn io(offset: u64, len: usize, source: std::io::Error) -> Self {
        IndexError::Io { offset, len, source }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
