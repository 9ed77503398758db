use bson::Bson;

use write_batch::coll::error::ErrorCode;
use write_batch::common::Namespace;
use write_batch::storage::{OpDeleteFlags, OpUpdateFlags};
use write_batch::{ContextProvider, MemoryEngine, Storage};

const LIMIT: usize = 16 * 1024 * 1024;

fn namespace(name: &str) -> Namespace {
    Namespace::new("storage", name)
}

#[test]
fn contexts_are_bound_to_namespace() {
    let engine = MemoryEngine::new();
    let people = namespace("people");
    let places = namespace("places");

    engine.acquire(&people).unwrap().insert_one(doc! { "_id": 1 }).unwrap();
    engine.acquire(&places).unwrap().insert_one(doc! { "_id": 1 }).unwrap();

    assert_eq!(engine.count(&people).unwrap(), 1);
    assert_eq!(engine.count(&places).unwrap(), 1);
    assert_eq!(engine.count(&namespace("nowhere")).unwrap(), 0);
}

#[test]
fn duplicate_id_is_rejected() {
    let engine = MemoryEngine::new();
    let ns = namespace("duplicate_id_is_rejected");

    let mut storage = engine.acquire(&ns).unwrap();
    storage.insert_one(doc! { "_id": 1, "a": 1 }).unwrap();

    // Numerically equal ids collide across types.
    let err = storage.insert_one(doc! { "_id": 1i64, "a": 2 }).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateKey);
    assert!(!err.is_fatal());
}

#[test]
fn update_primitive_flags() {
    let engine = MemoryEngine::new();
    let ns = namespace("update_primitive_flags");

    let mut storage = engine.acquire(&ns).unwrap();
    for i in 1..4i32 {
        storage.insert_one(doc! { "_id": i, "kind": "a" }).unwrap();
    }

    let single = storage
        .update(&doc! { "kind": "a" }, &doc! { "$set": { "seen": true } }, OpUpdateFlags::empty(), LIMIT)
        .unwrap();
    assert_eq!((single.matched_count, single.modified_count), (1, 1));

    let multi = storage
        .update(&doc! { "kind": "a" }, &doc! { "$set": { "seen": true } }, OpUpdateFlags::MULTI_UPDATE, LIMIT)
        .unwrap();
    assert_eq!((multi.matched_count, multi.modified_count), (3, 2));
    assert!(multi.upserted_id.is_none());

    let missed = storage
        .update(&doc! { "kind": "b" }, &doc! { "$set": { "seen": true } }, OpUpdateFlags::empty(), LIMIT)
        .unwrap();
    assert_eq!((missed.matched_count, missed.modified_count), (0, 0));

    let upserted = storage
        .update(&doc! { "_id": 10, "kind": "b" }, &doc! { "$set": { "seen": true } }, OpUpdateFlags::UPSERT, LIMIT)
        .unwrap();
    assert_eq!(upserted.upserted_id, Some(Bson::I32(10)));

    drop(storage);
    assert_eq!(
        engine.find(&ns, &doc! { "kind": "b" }).unwrap(),
        vec![doc! { "_id": 10, "kind": "b", "seen": true }]
    );
}

#[test]
fn delete_primitive_flags() {
    let engine = MemoryEngine::new();
    let ns = namespace("delete_primitive_flags");

    let mut storage = engine.acquire(&ns).unwrap();
    for i in 1..6i32 {
        storage.insert_one(doc! { "_id": i, "even": (i % 2 == 0) }).unwrap();
    }

    let one = storage.delete(&doc! { "even": false }, OpDeleteFlags::SINGLE_REMOVE).unwrap();
    assert_eq!(one.deleted_count, 1);

    let rest = storage.delete(&doc! { "even": false }, OpDeleteFlags::empty()).unwrap();
    assert_eq!(rest.deleted_count, 2);

    let none = storage.delete(&doc! { "even": false }, OpDeleteFlags::empty()).unwrap();
    assert_eq!(none.deleted_count, 0);

    drop(storage);
    let remaining: Vec<_> = engine
        .find(&ns, &doc! {})
        .unwrap()
        .into_iter()
        .map(|doc| doc.get("_id").cloned())
        .collect();
    assert_eq!(remaining, vec![Some(Bson::I32(2)), Some(Bson::I32(4))]);
}

#[test]
fn flags_from_options() {
    assert_eq!(OpUpdateFlags::with_options(false, false), OpUpdateFlags::empty());
    assert_eq!(
        OpUpdateFlags::with_options(true, true),
        OpUpdateFlags::MULTI_UPDATE | OpUpdateFlags::UPSERT
    );
    assert_eq!(OpDeleteFlags::with_options(true), OpDeleteFlags::SINGLE_REMOVE);
    assert_eq!(OpDeleteFlags::with_options(false), OpDeleteFlags::empty());
}

#[test]
fn find_rejects_bad_filters() {
    let engine = MemoryEngine::new();
    let err = engine.find(&namespace("find_rejects_bad_filters"), &doc! { "$where": "1" }).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadValue);
}

#[test]
fn update_primitive_checks_written_documents() {
    let engine = MemoryEngine::new();
    let ns = namespace("update_primitive_checks_written_documents");

    let mut storage = engine.acquire(&ns).unwrap();
    storage.insert_one(doc! { "_id": 1 }).unwrap();

    let big = "x".repeat(200);
    let err = storage
        .update(&doc! { "_id": 1 }, &doc! { "$set": { "big": big.clone() } }, OpUpdateFlags::empty(), 128)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DocumentTooLarge);

    let err = storage
        .update(&doc! { "_id": 2 }, &doc! { "$set": { "big": big } }, OpUpdateFlags::UPSERT, 128)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DocumentTooLarge);

    drop(storage);
    assert_eq!(engine.find(&ns, &doc! {}).unwrap(), vec![doc! { "_id": 1 }]);
}
