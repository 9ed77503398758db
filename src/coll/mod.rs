//! Batch execution against a single collection.
//!
//! `WriteBatchExecutor::execute_batch` walks the items of a `WriteRequest` in index order.
//! Each item runs inside its own storage context, acquired from the `ContextProvider` and
//! released before the next item starts. Successful items are folded into the batch's
//! `WriteStats`; failed items become `WriteError`s attributed to their index. An ordered batch
//! stops at its first failure, an unordered one attempts every item.
//!
//! After the last attempted item the effective write concern is handed to the
//! `WriteConcernEvaluator`. Its failure is reported on the response as a write concern error
//! and never changes the per-item results.
//!
//! The executor only borrows its collaborators, and only for the duration of the batches it
//! runs:
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
//! let request = WriteRequest::new(Namespace::new("test", "people"),
//!                                 vec![WriteModel::insert_one(doc! { "name": "Ada" })]);
//!
//! let response = WriteBatchExecutor::new(&options, &engine, &evaluator, &counters, &mut last_error)
//!     .execute_batch(&request);
//! assert!(response.ok);
//! ```
mod batch;
pub mod error;
mod ops;
pub mod options;
pub mod results;

pub use self::batch::{BatchItemRef, BatchItems, WriteRequest};
pub use self::ops::{fix_document_for_insert, validate_stored_document};

use chrono::Utc;
use tracing::{debug, warn};

use self::error::{CommandError, ErrorCode, WriteError};
use self::options::ExecutorOptions;
use self::results::{ResponseBuilder, WriteEffect, WriteOutcome, WriteResponse};
use crate::apm::{Listener, OpCounters, WriteResult, WriteStarted};
use crate::command_type::CommandType;
use crate::common::Namespace;
use crate::concern::{self, WriteConcernEvaluator};
use crate::last_error::LastError;
use crate::storage::ContextProvider;
use crate::{Error, Result};

/// Runs write batches against the namespaces handed out by a `ContextProvider`.
pub struct WriteBatchExecutor<'a> {
    options: &'a ExecutorOptions,
    client: &'a dyn ContextProvider,
    evaluator: &'a dyn WriteConcernEvaluator,
    counters: &'a OpCounters,
    last_error: &'a mut LastError,
    listener: Option<&'a Listener>,
}

impl<'a> WriteBatchExecutor<'a> {
    pub fn new(options: &'a ExecutorOptions,
               client: &'a dyn ContextProvider,
               evaluator: &'a dyn WriteConcernEvaluator,
               counters: &'a OpCounters,
               last_error: &'a mut LastError)
               -> WriteBatchExecutor<'a> {
        WriteBatchExecutor {
            options: options,
            client: client,
            evaluator: evaluator,
            counters: counters,
            last_error: last_error,
            listener: None,
        }
    }

    /// Reports every attempted item to the hooks registered on `listener`.
    pub fn with_listener(mut self, listener: &'a Listener) -> WriteBatchExecutor<'a> {
        self.listener = Some(listener);
        self
    }

    /// Executes every item of `request` and reports the aggregated result. Failures of any
    /// kind are returned as part of the response.
    pub fn execute_batch(&mut self, request: &WriteRequest) -> WriteResponse {
        self.last_error.reset();
        let ns = &request.namespace;

        if request.len() > self.options.max_write_batch_size {
            let error = CommandError::new(
                ErrorCode::InvalidLength,
                format!(
                    "Write batch sizes must be between 1 and {}. Got {} operations.",
                    self.options.max_write_batch_size,
                    request.len()
                ),
            );

            warn!(ns = %ns, items = request.len(), "rejecting oversize write batch");
            return WriteResponse::rejected(error);
        }

        let concern = match concern::resolve(request.write_concern.as_ref(),
                                             &self.options.default_write_concern) {
            Ok(concern) => concern,
            Err(err) => {
                warn!(ns = %ns, error = %err, "rejecting write batch with invalid write concern");
                return WriteResponse::rejected(CommandError::from(&err));
            }
        };

        debug!(ns = %ns, items = request.len(), ordered = request.ordered, "executing write batch");

        let mut builder = ResponseBuilder::new();

        for item in request.items() {
            match self.apply_write_item(ns, item) {
                Ok(WriteOutcome::Success(effect)) => builder.record_success(item.index, &effect),
                Ok(WriteOutcome::Failure(error)) => {
                    debug!(ns = %ns, index = item.index, code = %error.code, "write item failed");
                    builder.record_failure(error);

                    if request.ordered {
                        break;
                    }
                }
                Err(err) => {
                    warn!(ns = %ns, index = item.index, error = %err, "aborting write batch");
                    builder.set_error(CommandError::from(&err));
                    break;
                }
            }
        }

        // Items already applied stay applied, so the concern is checked even after an abort.
        if let Err(error) = self.evaluator.wait_for(&concern, builder.stats()) {
            warn!(ns = %ns, code = %error.code, "write concern not satisfied");
            builder.set_write_concern_error(error);
        }

        let response = builder.build();
        debug!(ns = %ns,
               ok = response.ok,
               n = response.stats.n(),
               errors = response.write_errors.len(),
               "write batch finished");
        response
    }

    // Applies one item in its own storage context, released before this returns. Only fatal
    // errors are returned as `Err`.
    fn apply_write_item(&mut self, namespace: &Namespace, item: BatchItemRef) -> Result<WriteOutcome> {
        let command_type = CommandType::for_model(item.model);
        self.counters.record(command_type);

        if let Some(listener) = self.listener {
            let started = WriteStarted {
                namespace: namespace.clone(),
                command_name: command_type.to_str().to_owned(),
                index: item.index,
                started_at: Utc::now(),
            };

            if let Err(err) = listener.run_start_hooks(&started) {
                warn!(error = %err, "failed to run start hooks");
            }
        }

        let options = self.options;
        let start_time = time::precise_time_ns();

        let result = self.client
            .acquire(namespace)
            .map_err(|err| if err.is_fatal() {
                err
            } else {
                Error::ContextError(err.to_string())
            })
            .and_then(|mut storage| ops::do_write(&mut *storage, item.index, item.model, options));

        let duration = time::precise_time_ns() - start_time;

        // An aborted item still completes for the listener, as a failure.
        let (outcome, fatal) = match result {
            Ok(outcome) => (outcome, None),
            Err(err) => (WriteOutcome::Failure(WriteError::with_error(item.index, &err)), Some(err)),
        };

        match outcome {
            WriteOutcome::Success(ref effect) => self.record_last_effect(effect),
            WriteOutcome::Failure(ref error) => self.last_error.raise_error(error),
        }

        if let Some(listener) = self.listener {
            let command_name = command_type.to_str().to_owned();
            let result = match outcome {
                WriteOutcome::Success(ref effect) => WriteResult::Success {
                    duration: duration,
                    effect: effect,
                    command_name: command_name,
                    namespace: namespace.clone(),
                    index: item.index,
                },
                WriteOutcome::Failure(ref failure) => WriteResult::Failure {
                    duration: duration,
                    command_name: command_name,
                    failure: failure,
                    namespace: namespace.clone(),
                    index: item.index,
                },
            };

            if let Err(err) = listener.run_completion_hooks(&result) {
                warn!(error = %err, "failed to run completion hooks");
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    fn record_last_effect(&mut self, effect: &WriteEffect) {
        match *effect {
            WriteEffect::Insert { inserted_count } => self.last_error.record_insert(inserted_count),
            WriteEffect::Update { matched_count, ref upserted_id, .. } => {
                let updated_existing = upserted_id.is_none() && matched_count > 0;
                self.last_error.record_update(updated_existing, matched_count, upserted_id.clone());
            }
            WriteEffect::Delete { deleted_count } => self.last_error.record_delete(deleted_count),
        }
    }
}
