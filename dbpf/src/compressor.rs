//! ZLIB payload compression, as used for compressed chunk storage.

use dbpf_common::error::DbpfError;
use dbpf_common::Result;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub const COMPRESSION_NONE: u16 = 0x0000;
pub const COMPRESSION_ZLIB: u16 = 0x5A42;

/// Decompress a stored chunk given the index entry's compression flag
/// and expected decompressed size.
///
/// `COMPRESSION_NONE` and any unrecognized non-zero flag are passed
/// through unchanged — we only know how to unwrap ZLIB.
pub fn decompress(data: &[u8], compression_flag: u16, memory_size: usize) -> Result<Vec<u8>> {
    if compression_flag != COMPRESSION_ZLIB {
        return Ok(data.to_vec());
    }
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(memory_size);
    decoder.read_to_end(&mut out)?;
    if out.len() != memory_size {
        return Err(DbpfError::DecompressSize {
            expected: memory_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Compress `data` with the default ZLIB level.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to a Vec never fails");
    encoder.finish().expect("writing to a Vec never fails")
}
