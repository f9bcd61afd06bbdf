//! Scenario 6 (spec §8): the registry fingerprint is a pure function
//! of the current registration set, independent of registration order.

use dbpf::registry::Registry;
use dbpf::resource::RawResource;
use std::sync::Arc;

fn raw_factory() -> Arc<dyn Fn(dbpf::ResourceKey, Vec<u8>) -> Box<dyn dbpf::resource::Resource> + Send + Sync> {
    Arc::new(|key, bytes| Box::new(RawResource::new(key, bytes)))
}

#[test]
fn fingerprint_is_stable_across_registration_order() {
    let mut forward = Registry::new();
    forward.register(0x220557DA, "stbl", raw_factory()).unwrap();
    forward.register(0x6B20C4F3, "clip", raw_factory()).unwrap();

    let mut reversed = Registry::new();
    reversed.register(0x6B20C4F3, "clip", raw_factory()).unwrap();
    reversed.register(0x220557DA, "stbl", raw_factory()).unwrap();

    assert_eq!(forward.fingerprint(), reversed.fingerprint());
}

/// Invariant 6 (spec §8): registering then un-registering the same
/// (type, factory) pair leaves the fingerprint unchanged.
#[test]
fn unregister_restores_the_original_fingerprint() {
    let mut registry = Registry::new();
    registry.register(0x220557DA, "stbl", raw_factory()).unwrap();
    let baseline = registry.fingerprint();

    registry.register(0x6B20C4F3, "clip", raw_factory()).unwrap();
    assert_ne!(registry.fingerprint(), baseline);

    registry.unregister(0x6B20C4F3);
    assert_eq!(registry.fingerprint(), baseline);
}

#[test]
fn replacing_a_factory_changes_the_fingerprint() {
    let mut registry = Registry::new();
    registry.register(0x1, "original", raw_factory()).unwrap();
    let before = registry.fingerprint();

    registry.register_replace(0x1, "replacement", raw_factory());
    assert_ne!(registry.fingerprint(), before);
}
