//! STBL — the String Table resource (type `0x220557DA`): a flat,
//! insertion-ordered list of hash-keyed localized strings.

use crate::index::ResourceKey;
use crate::resource::{Resource, ResourceEvent, TypedResourceState};
use dbpf_common::error::DbpfError;
use dbpf_common::primitives::{ByteReader, ByteWriter};
use dbpf_common::Result;

pub const STBL_TYPE_ID: u32 = 0x220557DA;
const STBL_MAGIC: u32 = 0x4C42_5453;
const STBL_VERSION: u16 = 5;
const MAX_STRING_LEN: usize = 65_535;

#[derive(Clone, Debug, PartialEq)]
pub struct StringEntry {
    pub key_hash: u32,
    pub flags: u8,
    pub value: String,
}

#[derive(Clone, Debug)]
struct StblData {
    compression_flag: u8,
    reserved: [u8; 2],
    entries: Vec<StringEntry>,
}

fn parse(bytes: &[u8]) -> Result<StblData> {
    let mut r = ByteReader::new(bytes);
    if r.u32()? != STBL_MAGIC {
        return Err(DbpfError::BadMagic);
    }
    let version = r.u16()?;
    if version != STBL_VERSION {
        return Err(DbpfError::UnsupportedVersion {
            major: version as u32,
            minor: 0,
        });
    }
    let compression_flag = r.u8()?;
    let entry_count = r.u64()?;
    if entry_count > i32::MAX as u64 {
        return Err(DbpfError::Malformed("string table entry count overflows i32".into()));
    }
    let reserved = [r.u8()?, r.u8()?];
    let _string_data_length = r.u32()?;

    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let key_hash = r.u32()?;
        let flags = r.u8()?;
        let len = r.u16()? as usize;
        let raw = r.bytes_owned(len)?;
        let value = String::from_utf8(raw).map_err(|e| DbpfError::Malformed(e.to_string()))?;
        entries.push(StringEntry {
            key_hash,
            flags,
            value,
        });
    }

    Ok(StblData {
        compression_flag,
        reserved,
        entries,
    })
}

fn serialize(data: &StblData) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(STBL_MAGIC);
    w.u16(STBL_VERSION);
    w.u8(data.compression_flag);
    w.u64(data.entries.len() as u64);
    w.u8(data.reserved[0]);
    w.u8(data.reserved[1]);

    let string_data_length: u32 = data
        .entries
        .iter()
        .map(|e| 7 + e.value.len() as u32)
        .sum();
    w.u32(string_data_length);

    for entry in &data.entries {
        w.u32(entry.key_hash);
        w.u8(entry.flags);
        w.u16(entry.value.len() as u16);
        w.bytes(entry.value.as_bytes());
    }

    w.into_bytes()
}

/// The String Table wrapper: a memoized, dirty-tracked decoded view
/// over an STBL resource's bytes.
pub struct StblResource {
    key: ResourceKey,
    state: TypedResourceState<StblData>,
}

impl StblResource {
    /// Build from a resource's raw bytes. Never fails: a parse error
    /// leaves the wrapper in a degraded state exposing the original
    /// bytes.
    pub fn from_bytes(key: ResourceKey, bytes: Vec<u8>) -> Self {
        match parse(&bytes) {
            Ok(data) => StblResource {
                key,
                state: TypedResourceState::new(bytes, Some(data), None),
            },
            Err(e) => StblResource {
                key,
                state: TypedResourceState::new(bytes, None, Some(e.to_string())),
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.state.is_degraded()
    }

    pub fn len(&self) -> usize {
        self.state.decoded.as_ref().map(|d| d.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &StringEntry> {
        self.state.decoded.iter().flat_map(|d| d.entries.iter())
    }

    pub fn try_get(&self, key_hash: u32) -> Option<&str> {
        self.state
            .decoded
            .as_ref()?
            .entries
            .iter()
            .find(|e| e.key_hash == key_hash)
            .map(|e| e.value.as_str())
    }

    /// Append a new entry. No-op on a degraded resource.
    pub fn add(&mut self, key_hash: u32, value: impl Into<String>, flags: u8) -> Result<()> {
        let value = value.into();
        if value.len() > MAX_STRING_LEN {
            return Err(DbpfError::CapacityExceeded {
                value: value.len() as u64,
                limit: MAX_STRING_LEN as u64,
            });
        }
        if let Some(data) = self.state.decoded.as_mut() {
            data.entries.push(StringEntry {
                key_hash,
                flags,
                value,
            });
            self.state.mark_dirty();
        }
        Ok(())
    }

    /// Remove the first entry matching `key_hash`. Returns whether one
    /// was found.
    pub fn remove(&mut self, key_hash: u32) -> bool {
        if let Some(data) = self.state.decoded.as_mut() {
            if let Some(pos) = data.entries.iter().position(|e| e.key_hash == key_hash) {
                data.entries.remove(pos);
                self.state.mark_dirty();
                return true;
            }
        }
        false
    }

    /// Overwrite the value of the first entry matching `key_hash`, or
    /// append a new one (flags 0) if none exists.
    pub fn set(&mut self, key_hash: u32, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if value.len() > MAX_STRING_LEN {
            return Err(DbpfError::CapacityExceeded {
                value: value.len() as u64,
                limit: MAX_STRING_LEN as u64,
            });
        }
        if let Some(data) = self.state.decoded.as_mut() {
            match data.entries.iter_mut().find(|e| e.key_hash == key_hash) {
                Some(entry) => entry.value = value,
                None => data.entries.push(StringEntry {
                    key_hash,
                    flags: 0,
                    value,
                }),
            }
            self.state.mark_dirty();
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        if let Some(data) = self.state.decoded.as_mut() {
            if !data.entries.is_empty() {
                data.entries.clear();
                self.state.mark_dirty();
            }
        }
    }
}

impl Resource for StblResource {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn bytes(&self) -> Vec<u8> {
        self.state.bytes(serialize)
    }

    fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    fn events(&self) -> &[ResourceEvent] {
        self.state.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResourceKey {
        ResourceKey::new(STBL_TYPE_ID, 0, 1)
    }

    fn sample_bytes() -> Vec<u8> {
        let data = StblData {
            compression_flag: 0,
            reserved: [0, 0],
            entries: vec![
                StringEntry {
                    key_hash: 0xAAAA_AAAA,
                    flags: 0,
                    value: "hello".into(),
                },
                StringEntry {
                    key_hash: 0xBBBB_BBBB,
                    flags: 1,
                    value: "".into(),
                },
            ],
        };
        serialize(&data)
    }

    #[test]
    fn parses_and_reports_entries_in_insertion_order() {
        let resource = StblResource::from_bytes(key(), sample_bytes());
        assert!(!resource.is_degraded());
        let values: Vec<&str> = resource.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["hello", ""]);
    }

    #[test]
    fn clean_resource_returns_bytes_unchanged() {
        let bytes = sample_bytes();
        let resource = StblResource::from_bytes(key(), bytes.clone());
        assert_eq!(resource.bytes(), bytes);
        assert!(!resource.is_dirty());
    }

    #[test]
    fn add_marks_dirty_and_reserializes() {
        let mut resource = StblResource::from_bytes(key(), sample_bytes());
        resource.add(0xCCCC_CCCC, "world", 0).unwrap();
        assert!(resource.is_dirty());

        let reparsed = StblResource::from_bytes(key(), resource.bytes());
        assert_eq!(reparsed.try_get(0xCCCC_CCCC), Some("world"));
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let mut resource = StblResource::from_bytes(key(), sample_bytes());
        resource.set(0xAAAA_AAAA, "updated").unwrap();
        assert_eq!(resource.try_get(0xAAAA_AAAA), Some("updated"));
    }

    #[test]
    fn remove_reports_whether_an_entry_existed() {
        let mut resource = StblResource::from_bytes(key(), sample_bytes());
        assert!(resource.remove(0xAAAA_AAAA));
        assert!(!resource.remove(0xAAAA_AAAA));
    }

    #[test]
    fn degraded_on_bad_magic_and_exposes_raw_bytes() {
        let junk = vec![0u8; 4];
        let resource = StblResource::from_bytes(key(), junk.clone());
        assert!(resource.is_degraded());
        assert_eq!(resource.bytes(), junk);
        assert!(matches!(resource.events(), [ResourceEvent::ParseFailed(_)]));
    }

    #[test]
    fn rejects_strings_longer_than_u16_width() {
        let mut resource = StblResource::from_bytes(key(), sample_bytes());
        let too_long = "x".repeat(MAX_STRING_LEN + 1);
        assert!(resource.add(1, too_long, 0).is_err());
    }
}
