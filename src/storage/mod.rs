//! Storage collaborators.
//!
//! The executor never touches documents directly. For every item it asks a
//! `ContextProvider` for a scoped handle on the target namespace and issues exactly one
//! primitive through the `Storage` trait. Dropping the handle releases whatever the
//! provider acquired, so the release happens on every exit path of the item.
//!
//! Primitives report per-item problems (validation, duplicate keys) as
//! `Error::WriteFailure`; any error for which `Error::is_fatal` holds aborts the batch.
pub mod flags;
mod memory;

use bson::Document;

pub use self::flags::{OpDeleteFlags, OpUpdateFlags};
pub use self::memory::MemoryEngine;

use crate::coll::results::{DeleteResult, UpdateResult};
use crate::common::Namespace;
use crate::Result;

/// Single-item mutation primitives on one namespace.
pub trait Storage {
    /// Adds one document. The document already carries its `_id`.
    fn insert_one(&mut self, document: Document) -> Result<()>;

    /// Updates the first (or, with `MULTI_UPDATE`, every) document matching `filter`.
    /// With `UPSERT` and no match, inserts the document built by
    /// `UpdateSpec::upsert_document` and reports its `_id`. Every document written must pass
    /// `validate_stored_document` against `max_document_size`.
    fn update(&mut self,
              filter: &Document,
              update: &Document,
              flags: OpUpdateFlags,
              max_document_size: usize)
              -> Result<UpdateResult>;

    /// Removes the first (with `SINGLE_REMOVE`) or every document matching `filter`.
    fn delete(&mut self, filter: &Document, flags: OpDeleteFlags) -> Result<DeleteResult>;
}

/// Hands out scoped execution contexts bound to a namespace.
pub trait ContextProvider {
    fn acquire<'a>(&'a self, namespace: &Namespace) -> Result<Box<dyn Storage + 'a>>;
}
