use bson::{self, Bson};
use std::cell::Cell;

use super::{execute, execute_with_options, namespace, seed};
use write_batch::coll::error::{ErrorCode, WriteConcernError};
use write_batch::coll::options::{ExecutorOptions, WriteModel};
use write_batch::coll::results::WriteStats;
use write_batch::coll::{WriteBatchExecutor, WriteRequest};
use write_batch::common::{Acknowledgment, Namespace, WriteConcern};
use write_batch::{ContextProvider, Error, LastError, MemoryEngine, OpCounters, Storage,
                  TopologyEvaluator};

// Hands out contexts until `remaining` reaches zero, then fails every acquisition.
struct FlakyProvider {
    engine: MemoryEngine,
    remaining: Cell<usize>,
    error: fn() -> Error,
}

impl FlakyProvider {
    fn new(remaining: usize, error: fn() -> Error) -> FlakyProvider {
        FlakyProvider {
            engine: MemoryEngine::new(),
            remaining: Cell::new(remaining),
            error: error,
        }
    }
}

impl ContextProvider for FlakyProvider {
    fn acquire<'a>(&'a self, namespace: &Namespace) -> write_batch::Result<Box<dyn Storage + 'a>> {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Err((self.error)());
        }

        self.remaining.set(remaining - 1);
        self.engine.acquire(namespace)
    }
}

fn inserts(ids: &[i32]) -> Vec<WriteModel> {
    ids.iter().map(|&id| WriteModel::insert_one(doc! { "_id": id, "x": (id * 11) })).collect()
}

#[test]
fn ordered_duplicate_insert_stops_batch() {
    let engine = MemoryEngine::new();
    let ns = namespace("ordered_duplicate_insert_stops_batch");

    let request = WriteRequest::new(ns.clone(), inserts(&[1, 1, 2]));
    let response = execute(&engine, &request);

    assert!(response.ok);
    assert_eq!(response.stats.num_inserted, 1);
    assert_eq!(response.write_errors.len(), 1);
    assert_eq!(response.write_errors[0].index, 1);
    assert_eq!(response.write_errors[0].code, ErrorCode::DuplicateKey);
    assert!(response.write_errors[0].message.contains("E11000"));

    assert_eq!(engine.count(&ns).unwrap(), 1);
}

#[test]
fn unordered_delete_then_upsert() {
    let engine = MemoryEngine::new();
    let ns = namespace("unordered_delete_then_upsert");
    seed(&engine, &ns, vec![
        doc! { "_id": 1, "x": 1 },
        doc! { "_id": 2, "x": 1 },
        doc! { "_id": 3, "x": 1 },
        doc! { "_id": 4, "x": 2 },
    ]);

    let request = WriteRequest::new(ns.clone(), vec![
        WriteModel::delete_many(doc! { "x": 1 }),
        WriteModel::update_one(doc! { "y": 5 }, doc! { "$set": { "z": 1 } }).upsert(true),
    ]).ordered(false);

    let response = execute(&engine, &request);

    assert!(response.ok);
    assert!(response.write_errors.is_empty());
    assert_eq!(response.stats.num_deleted, 3);
    assert_eq!(response.stats.num_upserted, 1);
    assert_eq!(response.stats.num_updated, 1);
    assert_eq!(response.stats.num_modified, 0);
    assert_eq!(response.stats.num_inserted, 0);

    assert_eq!(response.upserted.len(), 1);
    assert_eq!(response.upserted[0].index, 1);

    let id = match response.upserted_id(1) {
        Some(&Bson::ObjectId(ref id)) => id.clone(),
        other => panic!("Expected generated ObjectId, found {:?}", other),
    };

    let upserted = engine.find(&ns, &doc! { "y": 5 }).unwrap();
    assert_eq!(upserted.len(), 1);
    assert_eq!(upserted[0], doc! { "_id": id, "y": 5, "z": 1 });
    assert_eq!(engine.count(&ns).unwrap(), 2);
}

#[test]
fn unsatisfiable_write_concern_is_reported_separately() {
    let engine = MemoryEngine::new();
    let ns = namespace("unsatisfiable_write_concern_is_reported_separately");

    let request = WriteRequest::new(ns.clone(), inserts(&[1, 2])).write_concern(doc! { "w": 2 });
    let response = execute(&engine, &request);

    assert!(!response.ok);
    assert_eq!(response.stats.num_inserted, 2);
    assert!(response.write_errors.is_empty());
    assert!(response.error.is_none());

    let wc_error = response.write_concern_error.clone().expect("Expected write concern error");
    assert_eq!(wc_error.code, ErrorCode::UnsatisfiableWriteConcern);
    assert_eq!(wc_error.details.w, Acknowledgment::Nodes(2));

    // The writes themselves were applied.
    assert_eq!(engine.count(&ns).unwrap(), 2);

    let document = bson::Document::from(response);
    assert_eq!(document.get("ok"), Some(&Bson::FloatingPoint(0.0)));
    assert_eq!(document.get("n"), Some(&Bson::I64(2)));
    match document.get("writeConcernError") {
        Some(&Bson::Document(ref error)) => assert_eq!(error.get("code"), Some(&Bson::I32(100))),
        other => panic!("Invalid writeConcernError: {:?}", other),
    }
}

#[test]
fn default_write_concern_comes_from_options() {
    let engine = MemoryEngine::new();
    let ns = namespace("default_write_concern_comes_from_options");

    let mut options = ExecutorOptions::new();
    options.default_write_concern.w = Acknowledgment::Nodes(5);

    let response = execute_with_options(&engine, &WriteRequest::new(ns, inserts(&[1])), &options);

    assert!(!response.ok);
    assert_eq!(response.stats.num_inserted, 1);
    assert!(response.write_concern_error.is_some());
}

#[test]
fn invalid_write_concern_rejects_batch() {
    let engine = MemoryEngine::new();
    let ns = namespace("invalid_write_concern_rejects_batch");
    let options = ExecutorOptions::new();
    let counters = OpCounters::new();
    let mut last_error = LastError::new();

    let calls = Cell::new(0);
    let evaluator = |_: &WriteConcern, _: &WriteStats| -> Result<(), WriteConcernError> {
        calls.set(calls.get() + 1);
        Ok(())
    };

    let request = WriteRequest::new(ns.clone(), inserts(&[1, 2]))
        .write_concern(doc! { "j": true, "fsync": true });

    let response = WriteBatchExecutor::new(&options, &engine, &evaluator, &counters, &mut last_error)
        .execute_batch(&request);

    assert!(!response.ok);
    assert_eq!(response.error.as_ref().map(|e| e.code), Some(ErrorCode::InvalidOptions));
    assert_eq!(response.stats, WriteStats::new());
    assert_eq!(calls.get(), 0);
    assert_eq!(counters.inserts(), 0);
    assert_eq!(engine.count(&ns).unwrap(), 0);
}

#[test]
fn oversize_batch_is_rejected() {
    let engine = MemoryEngine::new();
    let ns = namespace("oversize_batch_is_rejected");

    let mut options = ExecutorOptions::new();
    options.max_write_batch_size = 2;

    let response = execute_with_options(&engine, &WriteRequest::new(ns.clone(), inserts(&[1, 2, 3])), &options);

    assert!(!response.ok);
    assert_eq!(response.error.as_ref().map(|e| e.code), Some(ErrorCode::InvalidLength));
    assert_eq!(engine.count(&ns).unwrap(), 0);

    let document = bson::Document::from(response);
    assert_eq!(document.get("code"), Some(&Bson::I32(16)));
    assert!(document.contains_key("errmsg"));
}

#[test]
fn empty_batch_succeeds() {
    let engine = MemoryEngine::new();
    let response = execute(&engine, &WriteRequest::new(namespace("empty_batch_succeeds"), vec![]));

    assert!(response.ok);
    assert_eq!(response.stats.n(), 0);

    let document = bson::Document::from(response);
    assert_eq!(document, doc! { "ok": 1.0, "n": 0i64, "nModified": 0i64 });
}

#[test]
fn context_failure_aborts_batch() {
    let provider = FlakyProvider::new(2, || Error::ContextError("namespace dropped".to_owned()));
    let ns = namespace("context_failure_aborts_batch");
    let options = ExecutorOptions::new();
    let counters = OpCounters::new();
    let mut last_error = LastError::new();

    let observed = Cell::new(-1);
    let evaluator = |_: &WriteConcern, stats: &WriteStats| -> Result<(), WriteConcernError> {
        observed.set(stats.num_inserted);
        Ok(())
    };

    let request = WriteRequest::new(ns.clone(), inserts(&[1, 2, 3, 4])).ordered(false);
    let response = WriteBatchExecutor::new(&options, &provider, &evaluator, &counters, &mut last_error)
        .execute_batch(&request);

    assert!(!response.ok);
    assert_eq!(response.stats.num_inserted, 2);
    assert!(response.write_errors.is_empty());
    assert_eq!(response.error.as_ref().map(|e| e.code), Some(ErrorCode::InternalError));

    // The concern is still evaluated for the writes that were applied.
    assert_eq!(observed.get(), 2);
    assert_eq!(provider.engine.count(&ns).unwrap(), 2);
}

#[test]
fn any_acquisition_failure_is_fatal() {
    let provider = FlakyProvider::new(0, || Error::ArgumentError("no such namespace".to_owned()));
    let options = ExecutorOptions::new();
    let evaluator = TopologyEvaluator::standalone();
    let counters = OpCounters::new();
    let mut last_error = LastError::new();

    let request = WriteRequest::new(namespace("any_acquisition_failure_is_fatal"), inserts(&[1, 2]))
        .ordered(false);
    let response = WriteBatchExecutor::new(&options, &provider, &evaluator, &counters, &mut last_error)
        .execute_batch(&request);

    assert!(!response.ok);
    assert!(response.write_errors.is_empty());
    assert_eq!(response.stats.num_inserted, 0);

    let error = response.error.expect("Expected batch error");
    assert!(error.message.contains("no such namespace"));

    // Only the first item was attempted.
    assert_eq!(counters.inserts(), 1);
}

#[test]
fn no_op_updates_are_matched_but_not_modified() {
    let engine = MemoryEngine::new();
    let ns = namespace("no_op_updates_are_matched_but_not_modified");
    seed(&engine, &ns, vec![
        doc! { "_id": 1, "x": 1 },
        doc! { "_id": 2, "x": 2 },
        doc! { "_id": 3, "x": 3 },
    ]);

    let request = WriteRequest::new(ns.clone(), vec![
        WriteModel::update_many(doc! {}, doc! { "$set": { "x": 2 } }),
        WriteModel::update_one(doc! { "_id": 1 }, doc! { "$set": { "x": 2 } }),
        WriteModel::update_one(doc! { "_id": 42 }, doc! { "$set": { "x": 2 } }),
    ]);

    let response = execute(&engine, &request);

    assert!(response.ok);
    assert_eq!(response.stats.num_updated, 4);
    assert_eq!(response.stats.num_modified, 2);
    assert_eq!(response.stats.num_upserted, 0);
    assert!(response.upserted.is_empty());
    assert_eq!(engine.find(&ns, &doc! { "x": 2 }).unwrap().len(), 3);
}

#[test]
fn deleting_nothing_is_not_an_error() {
    let engine = MemoryEngine::new();
    let ns = namespace("deleting_nothing_is_not_an_error");
    seed(&engine, &ns, vec![doc! { "_id": 1, "x": 9 }, doc! { "_id": 2, "x": 9 }]);

    let request = WriteRequest::new(ns.clone(), vec![WriteModel::delete_many(doc! { "x": 9 })]);

    let first = execute(&engine, &request);
    assert_eq!(first.stats.num_deleted, 2);

    let second = execute(&engine, &request);
    assert!(second.ok);
    assert_eq!(second.stats.num_deleted, 0);
    assert!(second.write_errors.is_empty());
}

#[test]
fn last_error_tracks_final_item() {
    let engine = MemoryEngine::new();
    let ns = namespace("last_error_tracks_final_item");
    let options = ExecutorOptions::new();
    let evaluator = TopologyEvaluator::standalone();
    let counters = OpCounters::new();
    let mut last_error = LastError::new();

    let request = WriteRequest::new(ns.clone(), vec![
        WriteModel::insert_one(doc! { "_id": 1 }),
        WriteModel::update_one(doc! { "_id": 1 }, doc! { "$set": { "a": 1 } }),
    ]);

    WriteBatchExecutor::new(&options, &engine, &evaluator, &counters, &mut last_error)
        .execute_batch(&request);

    assert_eq!(last_error.n, 1);
    assert_eq!(last_error.updated_existing, Some(true));
    assert!(!last_error.is_error());

    let request = WriteRequest::new(ns.clone(), vec![WriteModel::insert_one(doc! { "_id": 1 })]);
    WriteBatchExecutor::new(&options, &engine, &evaluator, &counters, &mut last_error)
        .execute_batch(&request);

    assert_eq!(last_error.code, Some(ErrorCode::DuplicateKey));
    assert_eq!(last_error.updated_existing, None);

    let report = last_error.to_bson();
    assert_eq!(report.get("code"), Some(&Bson::I32(11000)));
    match report.get("err") {
        Some(&Bson::String(ref message)) => assert!(message.contains("duplicate key")),
        other => panic!("Invalid err: {:?}", other),
    }
}

#[test]
fn counters_track_attempted_items() {
    let engine = MemoryEngine::new();
    let ns = namespace("counters_track_attempted_items");
    let options = ExecutorOptions::new();
    let evaluator = TopologyEvaluator::standalone();
    let counters = OpCounters::new();
    let mut last_error = LastError::new();

    let request = WriteRequest::new(ns, vec![
        WriteModel::insert_one(doc! { "_id": 1 }),
        WriteModel::insert_one(doc! { "_id": 1 }),
        WriteModel::update_many(doc! {}, doc! { "$inc": { "n": 1 } }),
        WriteModel::delete_one(doc! { "_id": 1 }),
    ]).ordered(false);

    WriteBatchExecutor::new(&options, &engine, &evaluator, &counters, &mut last_error)
        .execute_batch(&request);

    // Failed items are still counted as attempts.
    assert_eq!(counters.inserts(), 2);
    assert_eq!(counters.updates(), 1);
    assert_eq!(counters.deletes(), 1);
}

#[test]
fn executor_runs_several_batches() {
    let engine = MemoryEngine::new();
    let ns = namespace("executor_runs_several_batches");
    let options = ExecutorOptions::new();
    let evaluator = TopologyEvaluator::standalone();
    let counters = OpCounters::new();
    let mut last_error = LastError::new();

    let mut executor = WriteBatchExecutor::new(&options, &engine, &evaluator, &counters, &mut last_error);

    let first = executor.execute_batch(&WriteRequest::new(ns.clone(), inserts(&[1, 2])));
    let second = executor.execute_batch(&WriteRequest::new(ns.clone(), inserts(&[3])));

    // Statistics never leak from one batch into the next.
    assert_eq!(first.stats.num_inserted, 2);
    assert_eq!(second.stats.num_inserted, 1);
    assert_eq!(engine.count(&ns).unwrap(), 3);
}
