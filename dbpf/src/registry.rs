//! Type id -> factory dispatch, and a deterministic fingerprint over
//! whatever set of factories is currently registered.

use crate::index::ResourceKey;
pub use crate::resource::RawResource;
use crate::resource::Resource;
use dbpf_common::error::DbpfError;
use dbpf_common::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a `Resource` from a key and its raw bytes. Stored alongside
/// a human-readable identifier purely so the registry fingerprint has
/// something stable to hash besides a function pointer address.
pub type Factory = Arc<dyn Fn(ResourceKey, Vec<u8>) -> Box<dyn Resource> + Send + Sync>;

struct Registration {
    factory: Factory,
    identifier: String,
}

/// Maps resource type ids to the wrapper that knows how to decode
/// them. Types with no registered factory fall back to `RawResource`.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<u32, Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            factories: HashMap::new(),
        }
    }

    /// Register a factory for `type_id`. Fails if one is already
    /// registered — use `register_replace` to override deliberately.
    pub fn register(&mut self, type_id: u32, identifier: impl Into<String>, factory: Factory) -> Result<()> {
        if self.factories.contains_key(&type_id) {
            return Err(DbpfError::Malformed(format!(
                "a factory is already registered for type {:#010X}",
                type_id
            )));
        }
        self.factories.insert(
            type_id,
            Registration {
                factory,
                identifier: identifier.into(),
            },
        );
        Ok(())
    }

    pub fn register_replace(&mut self, type_id: u32, identifier: impl Into<String>, factory: Factory) {
        if let Some(previous) = self.factories.get(&type_id) {
            log::warn!(
                "replacing factory for type {:#010X}: {} -> ...",
                type_id,
                previous.identifier
            );
        }
        self.factories.insert(
            type_id,
            Registration {
                factory,
                identifier: identifier.into(),
            },
        );
    }

    pub fn unregister(&mut self, type_id: u32) {
        self.factories.remove(&type_id);
    }

    pub fn get_factory(&self, type_id: u32) -> Option<Factory> {
        self.factories.get(&type_id).map(|r| r.factory.clone())
    }

    /// Build a resource for `key`, falling back to `RawResource` when
    /// no factory is registered for its type.
    pub fn create(&self, key: ResourceKey, bytes: Vec<u8>) -> Box<dyn Resource> {
        match self.factories.get(&key.type_id) {
            Some(registration) => (registration.factory)(key, bytes),
            None => Box::new(RawResource::new(key, bytes)),
        }
    }

    /// A stable hash of the currently registered (type, identifier)
    /// pairs: sort by type id, render as JSON, SHA-256 the JSON, hex
    /// encode the digest. Two registries with the same factories
    /// registered (regardless of registration order) produce the same
    /// fingerprint.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Entry {
            #[serde(rename = "type")]
            type_id: String,
            factory: String,
        }
        #[derive(Serialize)]
        struct Fingerprint {
            entries: Vec<Entry>,
            count: usize,
        }

        let mut pairs: Vec<(u32, &str)> = self
            .factories
            .iter()
            .map(|(type_id, reg)| (*type_id, reg.identifier.as_str()))
            .collect();
        pairs.sort_by_key(|(type_id, _)| *type_id);

        let fingerprint = Fingerprint {
            entries: pairs
                .iter()
                .map(|(type_id, identifier)| Entry {
                    type_id: format!("0x{:08X}", type_id),
                    factory: (*identifier).to_string(),
                })
                .collect(),
            count: pairs.len(),
        };

        let json =
            serde_json::to_string(&fingerprint).expect("fingerprint struct is always serializable");
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}
