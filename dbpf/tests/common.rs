//! Shared helpers for the package-level integration tests: building a
//! minimal valid 96-byte DBPF header by hand, and reading back
//! individual little-endian fields from a saved buffer without going
//! through the package API (so tests can assert on exactly what got
//! written).

#![allow(dead_code)]

pub const HEADER_SIZE: usize = 96;

/// A hand-assembled empty-package header: magic, version 2.1, zero
/// resources, a 4-byte index (just the flag word) placed right after
/// the header. Mirrors spec §8 scenario 1 ("Open empty").
pub fn empty_package_bytes() -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(b"DBPF");
    buf[4..8].copy_from_slice(&2u32.to_le_bytes());
    buf[8..12].copy_from_slice(&1u32.to_le_bytes());
    buf[36..40].copy_from_slice(&0u32.to_le_bytes());
    buf[40..44].copy_from_slice(&0u32.to_le_bytes());
    buf[44..48].copy_from_slice(&4u32.to_le_bytes());
    buf[64..68].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // index flag word, nothing shared
    buf
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}
