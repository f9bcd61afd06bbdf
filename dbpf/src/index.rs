//! The resource index: a flag word selecting which of `type`, `group`
//! and the high 32 bits of `instance` are shared by every live entry,
//! followed by one record per entry with the shared fields omitted.

use dbpf_common::primitives::{ByteReader, ByteWriter};
use dbpf_common::Result;
use std::collections::HashSet;

const TYPE_SHARED: u32 = 0x01;
const GROUP_SHARED: u32 = 0x02;
const INSTANCE_HI_SHARED: u32 = 0x04;

/// A Type/Group/Instance resource key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub type_id: u32,
    pub group: u32,
    pub instance: u64,
}

impl ResourceKey {
    pub fn new(type_id: u32, group: u32, instance: u64) -> Self {
        ResourceKey {
            type_id,
            group,
            instance,
        }
    }
}

/// One row of the on-disk index, plus the bookkeeping the in-memory
/// package needs to decide what to (re)write on save.
#[derive(Clone, Debug)]
pub struct IndexEntry {
    pub key: ResourceKey,
    pub chunk_offset: u32,
    pub file_size: u32,
    pub memory_size: u32,
    pub compression_flag: u16,
    pub aux: u16,
    pub deleted: bool,
    pub dirty: bool,
    pub staged_bytes: Option<Vec<u8>>,
}

/// Encode the live (non-deleted) entries of `entries` into the index
/// byte format, choosing the flag word from what's actually shared.
pub fn encode_index(entries: &[IndexEntry]) -> Vec<u8> {
    let live: Vec<&IndexEntry> = entries.iter().filter(|e| !e.deleted).collect();

    let types: HashSet<u32> = live.iter().map(|e| e.key.type_id).collect();
    let groups: HashSet<u32> = live.iter().map(|e| e.key.group).collect();
    let instance_his: HashSet<u32> = live.iter().map(|e| (e.key.instance >> 32) as u32).collect();

    let mut flags = 0u32;
    if types.len() <= 1 {
        flags |= TYPE_SHARED;
    }
    if groups.len() <= 1 {
        flags |= GROUP_SHARED;
    }
    if instance_his.len() <= 1 {
        flags |= INSTANCE_HI_SHARED;
    }
    log::trace!(
        "index compaction for {} live entries: flags = {:#05b} (type_shared={}, group_shared={}, instance_hi_shared={})",
        live.len(),
        flags,
        flags & TYPE_SHARED != 0,
        flags & GROUP_SHARED != 0,
        flags & INSTANCE_HI_SHARED != 0,
    );

    let mut w = ByteWriter::new();
    w.u32(flags);
    if flags & TYPE_SHARED != 0 {
        w.u32(types.iter().next().copied().unwrap_or(0));
    }
    if flags & GROUP_SHARED != 0 {
        w.u32(groups.iter().next().copied().unwrap_or(0));
    }
    if flags & INSTANCE_HI_SHARED != 0 {
        w.u32(instance_his.iter().next().copied().unwrap_or(0));
    }

    for entry in &live {
        if flags & TYPE_SHARED == 0 {
            w.u32(entry.key.type_id);
        }
        if flags & GROUP_SHARED == 0 {
            w.u32(entry.key.group);
        }
        let instance_hi = (entry.key.instance >> 32) as u32;
        if flags & INSTANCE_HI_SHARED == 0 {
            w.u32(instance_hi);
        }
        let instance_lo = entry.key.instance as u32;
        w.u32(instance_lo);
        w.u32(entry.chunk_offset);
        w.u32(entry.file_size | 0x8000_0000);
        w.u32(entry.memory_size);
        w.u16(entry.compression_flag);
        w.u16(entry.aux);
    }

    w.into_bytes()
}

/// Decode `count` entries from an index byte buffer.
pub fn decode_index(data: &[u8], count: usize) -> Result<Vec<IndexEntry>> {
    let mut r = ByteReader::new(data);
    let flags = r.u32()?;
    let type_shared = flags & TYPE_SHARED != 0;
    let group_shared = flags & GROUP_SHARED != 0;
    let instance_hi_shared = flags & INSTANCE_HI_SHARED != 0;

    let shared_type = if type_shared { r.u32()? } else { 0 };
    let shared_group = if group_shared { r.u32()? } else { 0 };
    let shared_instance_hi = if instance_hi_shared { r.u32()? } else { 0 };

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let type_id = if type_shared { shared_type } else { r.u32()? };
        let group = if group_shared { shared_group } else { r.u32()? };
        let instance_hi = if instance_hi_shared {
            shared_instance_hi
        } else {
            r.u32()?
        };
        let instance_lo = r.u32()?;
        let instance = ((instance_hi as u64) << 32) | instance_lo as u64;

        let chunk_offset = r.u32()?;
        let file_size = r.u32()? & 0x7FFF_FFFF;
        let memory_size = r.u32()?;
        let compression_flag = r.u16()?;
        let aux = r.u16()?;

        entries.push(IndexEntry {
            key: ResourceKey {
                type_id,
                group,
                instance,
            },
            chunk_offset,
            file_size,
            memory_size,
            compression_flag,
            aux,
            deleted: false,
            dirty: false,
            staged_bytes: None,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(type_id: u32, group: u32, instance: u64) -> IndexEntry {
        IndexEntry {
            key: ResourceKey::new(type_id, group, instance),
            chunk_offset: 100,
            file_size: 50,
            memory_size: 50,
            compression_flag: 0,
            aux: 0,
            deleted: false,
            dirty: false,
            staged_bytes: None,
        }
    }

    #[test]
    fn roundtrips_with_fully_shared_fields() {
        let entries = vec![entry(1, 2, 3), entry(1, 2, 4)];
        let bytes = encode_index(&entries);
        let decoded = decode_index(&bytes, entries.len()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].key, entries[0].key);
        assert_eq!(decoded[1].key, entries[1].key);
    }

    #[test]
    fn roundtrips_with_nothing_shared() {
        let entries = vec![entry(1, 2, 3), entry(5, 6, 7)];
        let bytes = encode_index(&entries);
        let decoded = decode_index(&bytes, entries.len()).unwrap();
        assert_eq!(decoded[0].key, entries[0].key);
        assert_eq!(decoded[1].key, entries[1].key);
    }

    #[test]
    fn empty_index_is_valid() {
        let bytes = encode_index(&[]);
        let decoded = decode_index(&bytes, 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn deleted_entries_are_omitted() {
        let mut entries = vec![entry(1, 2, 3), entry(1, 2, 4)];
        entries[1].deleted = true;
        let bytes = encode_index(&entries);
        let decoded = decode_index(&bytes, 1).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].key.instance, 3);
    }

    #[test]
    fn top_bit_is_forced_and_masked_back_off() {
        let entries = vec![entry(1, 2, 3)];
        let bytes = encode_index(&entries);
        let decoded = decode_index(&bytes, 1).unwrap();
        assert_eq!(decoded[0].file_size, 50);
    }

    #[test]
    fn boundary_file_sizes_roundtrip() {
        // The on-disk field reserves its top bit for the "always set
        // when written" flag (masked off on read), so the largest
        // representable file_size is 0x7FFF_FFFF, not u32::MAX - 1.
        let mut small = entry(1, 2, 3);
        small.file_size = 1;
        small.memory_size = 1;
        let mut large = entry(1, 2, 4);
        large.file_size = 0x7FFF_FFFF;
        large.memory_size = 0x7FFF_FFFF;

        let entries = vec![small, large];
        let bytes = encode_index(&entries);
        let decoded = decode_index(&bytes, entries.len()).unwrap();
        assert_eq!(decoded[0].file_size, 1);
        assert_eq!(decoded[1].file_size, 0x7FFF_FFFF);
    }
}
