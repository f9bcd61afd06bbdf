//! The package container: owns the header, the live index, and an
//! optional backing stream to read un-modified chunks from on demand.

use crate::compressor;
use crate::header::{Header, HEADER_SIZE};
use crate::index::{self, IndexEntry, ResourceKey};
use crate::registry::Registry;
use crate::resource::Resource;
use dbpf_common::error::DbpfError;
use dbpf_common::Result;
use std::io::{Read, Seek, SeekFrom, Write};

/// The on-disk `file_size` field reserves its top bit as an always-set
/// flag (`index::encode_index` forces it, `index::decode_index` masks
/// it off), so only the low 31 bits are actually usable.
const MAX_FILE_SIZE: u64 = 0x7FFF_FFFF;

/// Blanket requirement for anything a package can read chunks back
/// from.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A handle to one entry in a package's index. Stays valid (and keeps
/// addressing the same slot) across deletion — a deleted entry is
/// tombstoned in place, not removed, until the next `save`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResourceHandle(usize);

pub struct Package {
    header: Header,
    entries: Vec<IndexEntry>,
    reader: Option<Box<dyn ReadSeek>>,
    read_only: bool,
    dirty: bool,
}

impl Package {
    /// Open an existing package, reading its header and index eagerly
    /// but leaving resource payloads unread until `get_bytes` asks for
    /// them.
    pub fn open<R: Read + Seek + 'static>(mut reader: R, read_only: bool) -> Result<Self> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut header_bytes)?;
        let header = Header::parse(&header_bytes)?;

        let count = header.resource_count() as usize;
        let index_size = header.index_size() as usize;
        let index_position = header.index_position() as u64;

        reader.seek(SeekFrom::Start(index_position))?;
        let mut index_bytes = vec![0u8; index_size];
        reader.read_exact(&mut index_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DbpfError::Truncated {
                    needed: index_size,
                    available: 0,
                }
            } else {
                DbpfError::IoError(e)
            }
        })?;

        let entries = index::decode_index(&index_bytes, count)?;

        Ok(Package {
            header,
            entries,
            reader: Some(Box::new(reader)),
            read_only,
            dirty: false,
        })
    }

    /// A new, empty package with no backing stream. Every resource
    /// added to it is dirty until the first `save`.
    pub fn create_new() -> Self {
        Package {
            header: Header::new_v2_1(),
            entries: Vec::new(),
            reader: None,
            read_only: false,
            dirty: true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn require_writable(&self) -> Result<()> {
        if self.read_only {
            Err(DbpfError::Malformed("package is read-only".into()))
        } else {
            Ok(())
        }
    }

    pub fn find(&self, key: ResourceKey) -> Option<ResourceHandle> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| !e.deleted && e.key == key)
            .map(|(i, _)| ResourceHandle(i))
    }

    pub fn entry(&self, handle: ResourceHandle) -> &IndexEntry {
        &self.entries[handle.0]
    }

    /// Handles for every live (non-deleted) resource, in index order.
    pub fn resources(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.deleted)
            .map(|(i, _)| ResourceHandle(i))
    }

    fn read_raw_payload(&mut self, idx: usize) -> Result<Vec<u8>> {
        let entry = self.entries[idx].clone();
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| DbpfError::Malformed("package has no backing stream".into()))?;
        reader.seek(SeekFrom::Start(entry.chunk_offset as u64))?;
        let mut raw = vec![0u8; entry.file_size as usize];
        reader.read_exact(&mut raw).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DbpfError::Truncated {
                    needed: entry.file_size as usize,
                    available: 0,
                }
            } else {
                DbpfError::IoError(e)
            }
        })?;
        Ok(raw)
    }

    /// The resource's decompressed bytes, whether that means reading
    /// and decompressing from the backing stream or returning bytes
    /// staged by a not-yet-saved mutation.
    pub fn get_bytes(&mut self, handle: ResourceHandle) -> Result<Vec<u8>> {
        let entry = self.entries[handle.0].clone();
        if entry.dirty {
            return Ok(entry.staged_bytes.clone().unwrap_or_default());
        }
        let raw = self.read_raw_payload(handle.0)?;
        compressor::decompress(&raw, entry.compression_flag, entry.memory_size as usize)
    }

    /// Decode a resource through `registry`, falling back to
    /// `RawResource` for types with no registered factory.
    pub fn get_resource(&mut self, handle: ResourceHandle, registry: &Registry) -> Result<Box<dyn Resource>> {
        let key = self.entries[handle.0].key;
        let bytes = self.get_bytes(handle)?;
        Ok(registry.create(key, bytes))
    }

    /// Append a new resource. Returns `None` (and does nothing) if
    /// `reject_duplicates` is set and `key` already has a live entry.
    pub fn add_resource(
        &mut self,
        key: ResourceKey,
        bytes: Vec<u8>,
        reject_duplicates: bool,
    ) -> Result<Option<ResourceHandle>> {
        self.require_writable()?;
        if reject_duplicates && self.find(key).is_some() {
            return Ok(None);
        }
        let memory_size = bytes.len() as u32;
        self.entries.push(IndexEntry {
            key,
            chunk_offset: 0,
            file_size: 0,
            memory_size,
            compression_flag: compressor::COMPRESSION_ZLIB,
            aux: 0,
            deleted: false,
            dirty: true,
            staged_bytes: Some(bytes),
        });
        self.dirty = true;
        Ok(Some(ResourceHandle(self.entries.len() - 1)))
    }

    pub fn replace_resource(&mut self, handle: ResourceHandle, bytes: Vec<u8>) -> Result<()> {
        self.require_writable()?;
        let entry = &mut self.entries[handle.0];
        entry.memory_size = bytes.len() as u32;
        entry.staged_bytes = Some(bytes);
        entry.dirty = true;
        self.dirty = true;
        Ok(())
    }

    /// Tombstone a resource: it drops out of `find`/`resources`
    /// immediately but the handle stays valid until the next `save`.
    pub fn delete_resource(&mut self, handle: ResourceHandle) -> Result<()> {
        self.require_writable()?;
        self.entries[handle.0].deleted = true;
        self.dirty = true;
        Ok(())
    }

    /// Serialize the package to `writer`: header, then each live
    /// resource's payload in index order, then the index. Computes
    /// every offset before writing anything so the stream only has to
    /// support `Write`, not `Seek`.
    pub fn save<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        self.require_writable()?;

        let live: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.deleted)
            .map(|(i, _)| i)
            .collect();

        let mut new_entries = Vec::with_capacity(live.len());
        let mut payloads: Vec<Vec<u8>> = Vec::with_capacity(live.len());
        let mut offset: u64 = HEADER_SIZE as u64;

        for idx in live {
            let entry = self.entries[idx].clone();
            let (payload, compression_flag, memory_size) = if entry.dirty {
                log::debug!(
                    "re-pack: {:?} is dirty, compressing {} staged bytes",
                    entry.key,
                    entry.staged_bytes.as_ref().map(Vec::len).unwrap_or(0)
                );
                let raw = entry.staged_bytes.clone().unwrap_or_default();
                let memory_size = raw.len();
                (
                    compressor::compress(&raw),
                    compressor::COMPRESSION_ZLIB,
                    memory_size,
                )
            } else {
                log::debug!("re-pack: {:?} is clean, carrying its stored bytes forward", entry.key);
                let raw = self.read_raw_payload(idx)?;
                (raw, entry.compression_flag, entry.memory_size as usize)
            };

            let file_size = payload.len();
            if offset > u32::MAX as u64 {
                return Err(DbpfError::CapacityExceeded {
                    value: offset,
                    limit: u32::MAX as u64,
                });
            }
            if file_size as u64 > MAX_FILE_SIZE {
                return Err(DbpfError::CapacityExceeded {
                    value: file_size as u64,
                    limit: MAX_FILE_SIZE,
                });
            }
            if memory_size > u32::MAX as usize {
                return Err(DbpfError::CapacityExceeded {
                    value: memory_size as u64,
                    limit: u32::MAX as u64,
                });
            }

            new_entries.push(IndexEntry {
                key: entry.key,
                chunk_offset: offset as u32,
                file_size: file_size as u32,
                memory_size: memory_size as u32,
                compression_flag,
                aux: entry.aux,
                deleted: false,
                dirty: false,
                staged_bytes: None,
            });
            offset += file_size as u64;
            payloads.push(payload);
        }

        let index_bytes = index::encode_index(&new_entries);
        let index_position = offset;
        if index_position > u32::MAX as u64 || index_bytes.len() > u32::MAX as usize {
            return Err(DbpfError::CapacityExceeded {
                value: index_position,
                limit: u32::MAX as u64,
            });
        }

        let mut header = self.header.clone();
        header.apply_mutable_fields(
            new_entries.len() as u32,
            index_bytes.len() as u32,
            index_position as u32,
        );

        writer.write_all(header.as_bytes())?;
        for payload in &payloads {
            writer.write_all(payload)?;
        }
        writer.write_all(&index_bytes)?;

        self.header = header;
        self.entries = new_entries;
        self.dirty = false;
        Ok(())
    }
}
