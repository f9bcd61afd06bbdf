//! The common contract every typed resource wrapper (and the raw
//! fallback) implements, plus the memoized decode/dirty-tracking base
//! that the typed wrappers build on.

use crate::index::ResourceKey;
use std::cell::RefCell;

/// Something a resource wrapper can report happened to it.
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceEvent {
    /// The decoded view was mutated through the wrapper's API.
    Mutated,
    /// Construction couldn't decode the bytes; the wrapper degraded to
    /// exposing them raw.
    ParseFailed(String),
}

/// The shape every package resource exposes, typed or not.
pub trait Resource {
    fn key(&self) -> ResourceKey;

    /// The bytes this resource currently holds. Unmodified resources
    /// return their original bytes unchanged; dirty ones serialize the
    /// current decoded state.
    fn bytes(&self) -> Vec<u8>;

    fn is_dirty(&self) -> bool;

    /// Events accumulated since construction (parse failures,
    /// mutations). Never cleared — callers inspect the tail they care
    /// about.
    fn events(&self) -> &[ResourceEvent];
}

/// Shared state for a resource wrapper backed by a typed, decoded
/// view `T`. `T` is `None` when the original bytes failed to parse —
/// the wrapper still holds the raw bytes and answers `bytes()` with
/// them, it just can't offer typed accessors.
pub struct TypedResourceState<T> {
    original: Vec<u8>,
    pub(crate) decoded: Option<T>,
    dirty: bool,
    cached_bytes: RefCell<Option<Vec<u8>>>,
    events: Vec<ResourceEvent>,
}

impl<T> TypedResourceState<T> {
    pub fn new(original: Vec<u8>, decoded: Option<T>, parse_error: Option<String>) -> Self {
        let mut events = Vec::new();
        if let Some(message) = parse_error {
            events.push(ResourceEvent::ParseFailed(message));
        }
        TypedResourceState {
            original,
            decoded,
            dirty: false,
            cached_bytes: RefCell::new(None),
            events,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.decoded.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn events(&self) -> &[ResourceEvent] {
        &self.events
    }

    /// Record that the decoded view changed: invalidates the cached
    /// serialization and flags the resource dirty.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        *self.cached_bytes.borrow_mut() = None;
        self.events.push(ResourceEvent::Mutated);
    }

    /// Produce the resource's current bytes. Clean resources return
    /// their original bytes untouched; dirty ones call `serialize`
    /// (once, caching the result) unless degraded, in which case the
    /// original bytes are the only thing left to return.
    pub fn bytes(&self, serialize: impl FnOnce(&T) -> Vec<u8>) -> Vec<u8> {
        if !self.dirty {
            return self.original.clone();
        }
        if let Some(cached) = self.cached_bytes.borrow().as_ref() {
            return cached.clone();
        }
        let fresh = match &self.decoded {
            Some(value) => serialize(value),
            None => self.original.clone(),
        };
        *self.cached_bytes.borrow_mut() = Some(fresh.clone());
        fresh
    }
}

/// The fallback resource for any type the registry has no factory for:
/// an opaque byte blob addressed by its key.
pub struct RawResource {
    key: ResourceKey,
    bytes: Vec<u8>,
    dirty: bool,
    events: Vec<ResourceEvent>,
}

impl RawResource {
    pub fn new(key: ResourceKey, bytes: Vec<u8>) -> Self {
        RawResource {
            key,
            bytes,
            dirty: false,
            events: Vec::new(),
        }
    }

    pub fn replace(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
        self.dirty = true;
        self.events.push(ResourceEvent::Mutated);
    }
}

impl Resource for RawResource {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn events(&self) -> &[ResourceEvent] {
        &self.events
    }
}
