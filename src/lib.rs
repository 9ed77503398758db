//! Write batch execution for a document store.
//!
//! A write batch is a sequence of insert, update and delete items that share one namespace
//! and one write concern. The `WriteBatchExecutor` applies the items one at a time through a
//! storage collaborator, aggregates their effects into `WriteStats`, attributes failures to
//! the items that caused them, and reports everything in a single `WriteResponse`.
//!
//! ## Collaborators
//!
//! The executor owns no state of its own. For every batch it borrows:
//!
//! - an `ExecutorOptions` holding the default write concern and size limits;
//! - a `ContextProvider`, which hands out a scoped `Storage` handle per item;
//! - a `WriteConcernEvaluator`, consulted once after the last attempted item;
//! - the `OpCounters` telemetry sink and the client's `LastError` record.
//!
//! `MemoryEngine` is an in-memory `ContextProvider` and `TopologyEvaluator` describes a
//! standalone server or replica set.
//!
//! ## Ordered and unordered batches
//!
//! An ordered batch stops at its first failed item; the items after it are not attempted and
//! do not appear in the response. An unordered batch attempts every item. In both cases each
//! failed item yields exactly one `WriteError` carrying its index.
//!
//! ```no_run
//! use write_batch::{LastError, MemoryEngine, OpCounters, TopologyEvaluator};
//! use write_batch::coll::{WriteBatchExecutor, WriteRequest};
//! use write_batch::coll::options::{ExecutorOptions, WriteModel};
//! use write_batch::common::Namespace;
//! use bson::{bson, doc};
//!
//! let engine = MemoryEngine::new();
//! let options = ExecutorOptions::new();
//! let evaluator = TopologyEvaluator::standalone();
//! let counters = OpCounters::new();
//! let mut last_error = LastError::new();
//!
//! let request = WriteRequest::new(Namespace::new("test", "people"), vec![
//!     WriteModel::insert_one(doc! { "_id": 1, "name": "Ada" }),
//!     WriteModel::insert_one(doc! { "_id": 1, "name": "Grace" }),
//!     WriteModel::update_one(doc! { "_id": 2 }, doc! { "$set": { "name": "Alan" } }).upsert(true),
//! ]).ordered(false);
//!
//! let mut executor = WriteBatchExecutor::new(&options, &engine, &evaluator, &counters,
//!                                            &mut last_error);
//! let response = executor.execute_batch(&request);
//!
//! assert_eq!(response.stats.num_inserted, 1);
//! assert_eq!(response.write_errors[0].index, 1);
//! assert_eq!(response.upserted[0].index, 2);
//! ```
pub mod apm;
pub mod coll;
pub mod command_type;
pub mod common;
pub mod concern;
pub mod error;
pub mod last_error;
pub mod matcher;
pub mod storage;
pub mod update;

pub use crate::apm::{Listener, OpCounters};
pub use crate::coll::WriteBatchExecutor;
pub use crate::concern::{TopologyEvaluator, WriteConcernEvaluator};
pub use crate::error::{Error, Result};
pub use crate::last_error::LastError;
pub use crate::storage::{ContextProvider, MemoryEngine, Storage};
