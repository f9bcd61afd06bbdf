//! Little-endian binary primitives over an in-memory byte slice.
//!
//! Every read validates the requested range against what remains in
//! the slice; overruns fail with `DbpfError::Truncated` rather than
//! panicking or silently returning zeroed data.

use crate::error::DbpfError;
use crate::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// A bounds-checked cursor over a borrowed byte slice.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len() - self.position()
    }

    fn check(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            Err(DbpfError::Truncated { needed, available })
        } else {
            Ok(())
        }
    }

    fn map_eof<T>(&self, needed: usize, r: std::io::Result<T>) -> Result<T> {
        r.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DbpfError::Truncated {
                    needed,
                    available: self.remaining(),
                }
            } else {
                DbpfError::IoError(e)
            }
        })
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let r = self.cursor.read_u8();
        self.map_eof(1, r)
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.check(2)?;
        let r = self.cursor.read_u16::<LittleEndian>();
        self.map_eof(2, r)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.check(4)?;
        let r = self.cursor.read_u32::<LittleEndian>();
        self.map_eof(4, r)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.check(8)?;
        let r = self.cursor.read_u64::<LittleEndian>();
        self.map_eof(8, r)
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.check(4)?;
        let r = self.cursor.read_i32::<LittleEndian>();
        self.map_eof(4, r)
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.check(4)?;
        let r = self.cursor.read_f32::<LittleEndian>();
        self.map_eof(4, r)
    }

    /// Borrow `n` bytes without copying.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.check(n)?;
        let start = self.position();
        let data = &self.cursor.get_ref()[start..start + n];
        self.cursor.set_position((start + n) as u64);
        Ok(data)
    }

    pub fn bytes_owned(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.bytes(n)?.to_vec())
    }

    /// Read `n` bytes, decode as ASCII up to the first NUL (or the
    /// full width if none is present).
    pub fn fixed_ascii(&mut self, n: usize) -> Result<String> {
        let raw = self.bytes(n)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// `u32` byte length followed by that many UTF-8 bytes, no
    /// terminator.
    pub fn len_prefixed_utf8(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.bytes_owned(len)?;
        String::from_utf8(raw).map_err(|e| DbpfError::Malformed(e.to_string()))
    }

    /// `u32` char count, `2*count` UTF-16LE bytes, then a trailing
    /// `0u16` terminator (consumed and discarded).
    pub fn len_prefixed_utf16(&mut self) -> Result<String> {
        let count = self.u32()? as usize;
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(self.u16()?);
        }
        let terminator = self.u16()?;
        if terminator != 0 {
            return Err(DbpfError::Malformed(
                "missing UTF-16 string terminator".into(),
            ));
        }
        String::from_utf16(&units).map_err(|e| DbpfError::Malformed(e.to_string()))
    }
}

/// A growable little-endian byte buffer writer.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter { buf: Vec::new() }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.write_u8(v).expect("writing to a Vec never fails");
    }

    pub fn u16(&mut self, v: u16) {
        self.buf
            .write_u16::<LittleEndian>(v)
            .expect("writing to a Vec never fails");
    }

    pub fn u32(&mut self, v: u32) {
        self.buf
            .write_u32::<LittleEndian>(v)
            .expect("writing to a Vec never fails");
    }

    pub fn u64(&mut self, v: u64) {
        self.buf
            .write_u64::<LittleEndian>(v)
            .expect("writing to a Vec never fails");
    }

    pub fn i32(&mut self, v: i32) {
        self.buf
            .write_i32::<LittleEndian>(v)
            .expect("writing to a Vec never fails");
    }

    pub fn f32(&mut self, v: f32) {
        self.buf
            .write_f32::<LittleEndian>(v)
            .expect("writing to a Vec never fails");
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn len_prefixed_utf8(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes(s.as_bytes());
    }

    pub fn len_prefixed_utf16(&mut self, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.u32(units.len() as u32);
        for unit in &units {
            self.u16(*unit);
        }
        self.u16(0);
    }

    /// Write `s`'s bytes then zero-pad to `width`. Truncation (`s`
    /// longer than `width`) is a caller error, not silent clipping.
    pub fn fixed_ascii_null_padded(&mut self, s: &str, width: usize) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() > width {
            return Err(DbpfError::CapacityExceeded {
                value: bytes.len() as u64,
                limit: width as u64,
            });
        }
        self.bytes(bytes);
        self.bytes(&vec![0u8; width - bytes.len()]);
        Ok(())
    }
}
