use thiserror::Error;

/// The error taxonomy shared by every component in the dbpf core.
///
/// Container-level variants (`BadMagic`, `Truncated`, `Malformed`,
/// `IoError`, `CapacityExceeded`) are fatal to the in-progress
/// operation. `ParseFailed` is wrapper-level: the surrounding package
/// keeps working and the affected resource degrades to raw bytes.
#[derive(Error, Debug)]
pub enum DbpfError {
    #[error("bad magic number")]
    BadMagic,

    #[error("unsupported version {major}.{minor}")]
    UnsupportedVersion { major: u32, minor: u32 },

    #[error("truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    DecompressSize { expected: usize, actual: usize },

    #[error("value {value} does not fit its on-disk capacity ({limit})")]
    CapacityExceeded { value: u64, limit: u64 },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("failed to parse resource: {0}")]
    ParseFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}
