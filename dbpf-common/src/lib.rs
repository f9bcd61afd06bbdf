//! Shared binary primitives and error taxonomy used by every layer of
//! the dbpf package core.

pub mod error;
pub mod primitives;

pub use error::DbpfError;
pub use primitives::{ByteReader, ByteWriter};

pub type Result<T> = std::result::Result<T, DbpfError>;
