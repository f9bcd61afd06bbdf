//! Whole-package scenarios from spec §8: the literal end-to-end cases
//! plus the index-compaction boundary behaviors, exercised through
//! [`dbpf::Package`]'s public surface rather than its internals.

use dbpf::registry::Registry;
use dbpf::resource::RawResource;
use dbpf::{Package, ResourceKey};
use std::io::Cursor;
use std::sync::Arc;

mod common;

/// Scenario 1: open a hand-crafted empty package; it has no resources
/// and re-saves to the same logical (still empty) contents.
#[test]
fn open_empty_package() {
    let bytes = common::empty_package_bytes();
    let mut pkg = Package::open(Cursor::new(bytes), false).unwrap();
    assert_eq!(pkg.resources().count(), 0);

    let mut resaved = Vec::new();
    pkg.save(&mut resaved).unwrap();
    let reopened = Package::open(Cursor::new(resaved), false).unwrap();
    assert_eq!(reopened.resources().count(), 0);
}

/// Scenario 2: add one raw resource, save, reopen; its bytes and
/// memory_size come back exactly as added.
#[test]
fn one_raw_resource_roundtrips() {
    let mut pkg = Package::create_new();
    let key = ResourceKey::new(0x220557DA, 0, 0x1234);
    pkg.add_resource(key, b"hello".to_vec(), true).unwrap();

    let mut buf = Vec::new();
    pkg.save(&mut buf).unwrap();

    let mut reopened = Package::open(Cursor::new(buf), false).unwrap();
    assert_eq!(reopened.resources().count(), 1);
    let handle = reopened.find(key).unwrap();
    let entry = reopened.entry(handle);
    assert_eq!(entry.memory_size, 5);
    assert_eq!(reopened.get_bytes(handle).unwrap(), b"hello".to_vec());
}

/// Scenario 4: three resources sharing type and group, differing only
/// in instance_lo (so instance_hi is shared too), produce an index
/// with all three compaction bits set.
#[test]
fn shared_field_compaction_sets_all_three_bits() {
    let mut pkg = Package::create_new();
    let shared_type = 0x220557DA;
    let shared_group = 0;
    for instance in [1u64, 2, 3] {
        pkg.add_resource(
            ResourceKey::new(shared_type, shared_group, instance),
            vec![instance as u8],
            true,
        )
        .unwrap();
    }

    let mut buf = Vec::new();
    pkg.save(&mut buf).unwrap();

    let header = dbpf::Header::parse(&buf).unwrap();
    let index_position = header.index_position() as usize;
    let flags = common::read_u32_le(&buf, index_position);
    assert_eq!(flags & 0x01, 0x01, "type should be shared");
    assert_eq!(flags & 0x02, 0x02, "group should be shared");
    assert_eq!(flags & 0x04, 0x04, "instance_hi should be shared");
}

/// Invariant 7 (spec §8): `reject_duplicates` refuses a second add for
/// a key that already has a live entry, and the original bytes stay
/// untouched.
#[test]
fn reject_duplicates_leaves_original_bytes_in_place() {
    let mut pkg = Package::create_new();
    let key = ResourceKey::new(1, 2, 3);
    let handle = pkg.add_resource(key, b"first".to_vec(), true).unwrap().unwrap();
    let second = pkg.add_resource(key, b"second".to_vec(), true).unwrap();
    assert!(second.is_none());
    assert_eq!(pkg.get_bytes(handle).unwrap(), b"first".to_vec());
}

/// A deleted resource is gone from lookups immediately, and absent
/// from the next saved/reopened file.
#[test]
fn delete_then_save_drops_the_resource() {
    let mut pkg = Package::create_new();
    let key = ResourceKey::new(1, 2, 3);
    let handle = pkg.add_resource(key, vec![9, 9, 9], true).unwrap().unwrap();

    pkg.delete_resource(handle).unwrap();
    assert!(pkg.find(key).is_none());

    let mut buf = Vec::new();
    pkg.save(&mut buf).unwrap();
    let reopened = Package::open(Cursor::new(buf), false).unwrap();
    assert!(reopened.find(key).is_none());
    assert_eq!(reopened.resources().count(), 0);
}

/// A resource with file_size 1 decodes correctly at the full package
/// level, not just in isolation at the index layer.
#[test]
fn one_byte_resource_decodes() {
    let mut pkg = Package::create_new();
    let key = ResourceKey::new(1, 1, 1);
    pkg.add_resource(key, vec![0x42], true).unwrap();

    let mut buf = Vec::new();
    pkg.save(&mut buf).unwrap();
    let mut reopened = Package::open(Cursor::new(buf), false).unwrap();
    let handle = reopened.find(key).unwrap();
    assert_eq!(reopened.get_bytes(handle).unwrap(), vec![0x42]);
}

/// `get_resource` dispatches through a registry: a type with a
/// registered factory comes back wrapped, an unregistered type falls
/// back to `RawResource`, and both see the same bytes `get_bytes`
/// would have returned.
#[test]
fn get_resource_dispatches_through_the_registry() {
    let mut pkg = Package::create_new();
    let wrapped_key = ResourceKey::new(0x220557DA, 0, 1);
    let raw_key = ResourceKey::new(0xDEADBEEF, 0, 2);
    pkg.add_resource(wrapped_key, b"wrapped".to_vec(), true).unwrap();
    pkg.add_resource(raw_key, b"unwrapped".to_vec(), true).unwrap();

    let mut buf = Vec::new();
    pkg.save(&mut buf).unwrap();
    let mut reopened = Package::open(Cursor::new(buf), false).unwrap();

    let mut registry = Registry::new();
    registry
        .register(
            0x220557DA,
            "stbl",
            Arc::new(|key, bytes| Box::new(RawResource::new(key, bytes))),
        )
        .unwrap();

    let wrapped_handle = reopened.find(wrapped_key).unwrap();
    let wrapped = reopened.get_resource(wrapped_handle, &registry).unwrap();
    assert_eq!(wrapped.bytes(), b"wrapped".to_vec());

    let raw_handle = reopened.find(raw_key).unwrap();
    let raw = reopened.get_resource(raw_handle, &registry).unwrap();
    assert_eq!(raw.bytes(), b"unwrapped".to_vec());
}

/// Save and reopen against a real file on disk, not just an in-memory
/// cursor, to exercise the `Seek`-based chunk read path.
#[test]
fn roundtrips_through_a_real_file() {
    let mut pkg = Package::create_new();
    let key = ResourceKey::new(0x6B20C4F3, 0, 7);
    pkg.add_resource(key, b"on disk".to_vec(), true).unwrap();

    let file = tempfile::NamedTempFile::new().unwrap();
    {
        let mut writer = file.reopen().unwrap();
        pkg.save(&mut writer).unwrap();
    }

    let reader = file.reopen().unwrap();
    let mut reopened = Package::open(reader, false).unwrap();
    let handle = reopened.find(key).unwrap();
    assert_eq!(reopened.get_bytes(handle).unwrap(), b"on disk".to_vec());
}
