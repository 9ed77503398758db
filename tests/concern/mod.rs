use bson::Bson;

use write_batch::coll::error::ErrorCode;
use write_batch::coll::options::ExecutorOptions;
use write_batch::coll::results::WriteStats;
use write_batch::common::{Acknowledgment, WriteConcern};
use write_batch::concern;
use write_batch::{TopologyEvaluator, WriteConcernEvaluator};

fn wait(evaluator: &TopologyEvaluator, concern: bson::Document) -> Option<ErrorCode> {
    let concern = WriteConcern::parse(&concern).unwrap();
    evaluator.wait_for(&concern, &WriteStats::new()).err().map(|e| e.code)
}

#[test]
fn resolve_prefers_request_concern() {
    let default = WriteConcern::new();

    let resolved = concern::resolve(None, &default).unwrap();
    assert_eq!(resolved, default);

    let resolved = concern::resolve(Some(&doc! { "w": "majority", "wtimeout": 100 }), &default).unwrap();
    assert_eq!(resolved.w, Acknowledgment::Majority);
    assert_eq!(resolved.w_timeout, 100);
}

#[test]
fn resolve_rejects_invalid_concerns() {
    let default = WriteConcern::new();
    let code = |document: bson::Document| concern::resolve(Some(&document), &default).unwrap_err().code();

    assert_eq!(code(doc! { "w": -1 }), ErrorCode::BadValue);
    assert_eq!(code(doc! { "w": "" }), ErrorCode::BadValue);
    assert_eq!(code(doc! { "wtimeout": -5 }), ErrorCode::BadValue);
    assert_eq!(code(doc! { "j": true, "fsync": true }), ErrorCode::InvalidOptions);
    assert_eq!(code(doc! { "w": [1] }), ErrorCode::FailedToParse);
    assert_eq!(code(doc! { "wmode": 1 }), ErrorCode::FailedToParse);
}

#[test]
fn standalone_evaluation() {
    let standalone = TopologyEvaluator::standalone();

    assert_eq!(wait(&standalone, doc! {}), None);
    assert_eq!(wait(&standalone, doc! { "w": 0 }), None);
    assert_eq!(wait(&standalone, doc! { "w": 1, "j": true }), None);
    assert_eq!(wait(&standalone, doc! { "w": "majority" }), None);
    assert_eq!(wait(&standalone, doc! { "w": 2 }), Some(ErrorCode::UnsatisfiableWriteConcern));
    assert_eq!(wait(&standalone, doc! { "w": "dc" }), Some(ErrorCode::UnknownReplWriteConcern));
}

#[test]
fn journal_requires_journaling() {
    let evaluator = TopologyEvaluator::new(1, false);

    assert_eq!(wait(&evaluator, doc! { "j": true }), Some(ErrorCode::BadValue));
    assert_eq!(wait(&evaluator, doc! { "fsync": true }), None);
}

#[test]
fn replica_set_evaluation() {
    let evaluator = TopologyEvaluator::replica_set(3, vec!["dc-east", "dc-west"]);

    assert_eq!(wait(&evaluator, doc! { "w": 3 }), None);
    assert_eq!(wait(&evaluator, doc! { "w": "dc-east" }), None);
    assert_eq!(wait(&evaluator, doc! { "w": "dc-north" }), Some(ErrorCode::UnknownReplWriteConcern));
    assert_eq!(wait(&evaluator, doc! { "w": 4 }), Some(ErrorCode::UnsatisfiableWriteConcern));
}

#[test]
fn timeout_is_reported_with_info() {
    let evaluator = TopologyEvaluator::replica_set(2, Vec::<String>::new());
    let concern = WriteConcern::parse(&doc! { "w": 3, "wtimeout": 250 }).unwrap();

    let error = evaluator.wait_for(&concern, &WriteStats::new()).unwrap_err();
    assert_eq!(error.code, ErrorCode::WriteConcernFailed);
    assert_eq!(error.details, concern);
    assert_eq!(error.info, Some(doc! { "wtimeout": true }));

    let document = bson::Document::from(error);
    assert_eq!(document.get("code"), Some(&Bson::I32(64)));
    assert!(document.contains_key("errInfo"));
}

#[test]
fn options_from_json() {
    let options = ExecutorOptions::from_json_str(
        r#"{ "default_write_concern": { "w": "majority", "wtimeout": 1000 }, "max_write_batch_size": 10 }"#,
    ).unwrap();

    assert_eq!(options.default_write_concern.w, Acknowledgment::Majority);
    assert_eq!(options.default_write_concern.w_timeout, 1000);
    assert!(!options.default_write_concern.j);
    assert_eq!(options.max_write_batch_size, 10);
    assert_eq!(options.max_document_size, 16 * 1024 * 1024);

    let options = ExecutorOptions::from_json_str(r#"{ "default_write_concern": { "w": 2 } }"#).unwrap();
    assert_eq!(options.default_write_concern.w, Acknowledgment::Nodes(2));

    assert_eq!(ExecutorOptions::from_json_str("{}").unwrap(), ExecutorOptions::new());
    assert_eq!(
        ExecutorOptions::from_json_str("{ \"max_write_batch_size\": \"many\" }").unwrap_err().code(),
        ErrorCode::FailedToParse
    );
}

#[test]
fn options_from_missing_file() {
    let err = ExecutorOptions::from_path("/nonexistent/write-batch.json").unwrap_err();
    assert!(err.is_fatal());
}
