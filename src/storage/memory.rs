use bson::{Bson, Document};
use std::collections::BTreeMap;
use std::iter;
use std::sync::{RwLock, RwLockWriteGuard};
use tracing::trace;

use super::flags::{OpDeleteFlags, OpUpdateFlags};
use super::{ContextProvider, Storage};
use crate::coll::error::ErrorCode;
use crate::coll::validate_stored_document;
use crate::coll::results::{DeleteResult, UpdateResult};
use crate::common::Namespace;
use crate::matcher::{self, Query};
use crate::update::UpdateSpec;
use crate::{Error, Result};

type Collections = BTreeMap<Namespace, MemoryCollection>;

/// An in-memory document store.
///
/// Each acquired context holds the engine's write lock until it is dropped, so items from
/// concurrent batches are serialized against each other while reads through `find` and
/// `count` wait for the current item to finish.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    collections: RwLock<Collections>,
}

#[derive(Debug, Default, Clone)]
struct MemoryCollection {
    documents: Vec<Document>,
    unique_indexes: Vec<String>,
}

/// A scoped handle on one namespace of a `MemoryEngine`.
struct CollectionContext<'a> {
    guard: RwLockWriteGuard<'a, Collections>,
    namespace: Namespace,
}

impl MemoryEngine {
    pub fn new() -> MemoryEngine {
        Default::default()
    }

    /// Enforces uniqueness of `path` for future writes to the namespace. `_id` is always unique.
    pub fn create_unique_index(&self, namespace: &Namespace, path: &str) -> Result<()> {
        let mut guard = self.collections.write()?;
        let collection = guard.entry(namespace.clone()).or_insert_with(Default::default);

        if path != "_id" && !collection.unique_indexes.iter().any(|p| p == path) {
            collection.unique_indexes.push(path.to_owned());
        }

        Ok(())
    }

    /// Returns copies of every document in the namespace matching `filter`, in insertion order.
    pub fn find(&self, namespace: &Namespace, filter: &Document) -> Result<Vec<Document>> {
        let query = Query::parse(filter)?;
        let guard = self.collections.read()?;

        Ok(guard
            .get(namespace)
            .map(|collection| {
                collection.documents.iter().filter(|doc| query.matches(doc)).cloned().collect()
            })
            .unwrap_or_default())
    }

    pub fn count(&self, namespace: &Namespace) -> Result<usize> {
        let guard = self.collections.read()?;
        Ok(guard.get(namespace).map_or(0, |collection| collection.documents.len()))
    }
}

impl ContextProvider for MemoryEngine {
    fn acquire<'a>(&'a self, namespace: &Namespace) -> Result<Box<dyn Storage + 'a>> {
        let guard = self.collections.write()?;
        Ok(Box::new(CollectionContext {
            guard: guard,
            namespace: namespace.clone(),
        }))
    }
}

impl<'a> CollectionContext<'a> {
    fn collection(&mut self) -> &mut MemoryCollection {
        self.guard.entry(self.namespace.clone()).or_insert_with(Default::default)
    }
}

impl<'a> Storage for CollectionContext<'a> {
    fn insert_one(&mut self, document: Document) -> Result<()> {
        let namespace = self.namespace.to_string();
        let collection = self.collection();

        check_unique(&namespace, &collection.unique_indexes, &collection.documents, &document, None)?;
        collection.documents.push(document);
        Ok(())
    }

    fn update(&mut self,
              filter: &Document,
              update: &Document,
              flags: OpUpdateFlags,
              max_document_size: usize)
              -> Result<UpdateResult> {
        let query = Query::parse(filter)?;
        let spec = UpdateSpec::parse(update)?;
        let multi = flags.contains(OpUpdateFlags::MULTI_UPDATE);

        if multi && spec.is_replacement() {
            return Err(Error::write(
                ErrorCode::FailedToParse,
                "multi update only works with $ operators",
            ));
        }

        let namespace = self.namespace.to_string();
        let collection = self.collection();

        let mut matched = 0;
        let mut staged = Vec::new();

        for (position, document) in collection.documents.iter().enumerate() {
            if !query.matches(document) {
                continue;
            }

            matched += 1;
            let updated = spec.apply(document)?;
            if updated != *document {
                validate_stored_document(&updated, max_document_size)?;
                staged.push((position, updated));
            }

            if !multi {
                break;
            }
        }

        if matched == 0 {
            if !flags.contains(OpUpdateFlags::UPSERT) {
                return Ok(UpdateResult::new(0, 0));
            }

            let document = spec.upsert_document(&query)?;
            validate_stored_document(&document, max_document_size)?;
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);

            check_unique(&namespace, &collection.unique_indexes, &collection.documents, &document, None)?;
            trace!(ns = %namespace, id = %id, "upserted document");
            collection.documents.push(document);
            return Ok(UpdateResult::upserted(id));
        }

        if staged.is_empty() {
            return Ok(UpdateResult::new(matched, 0));
        }

        // Stage every change first so a failure leaves the collection untouched.
        let mut next = collection.documents.clone();
        let mut positions = Vec::with_capacity(staged.len());
        for (position, updated) in staged {
            next[position] = updated;
            positions.push(position);
        }

        for &position in &positions {
            check_unique(&namespace, &collection.unique_indexes, &next, &next[position], Some(position))?;
        }

        collection.documents = next;
        Ok(UpdateResult::new(matched, positions.len() as i64))
    }

    fn delete(&mut self, filter: &Document, flags: OpDeleteFlags) -> Result<DeleteResult> {
        let query = Query::parse(filter)?;
        let single = flags.contains(OpDeleteFlags::SINGLE_REMOVE);
        let collection = self.collection();

        let mut deleted = 0;
        let mut kept = Vec::with_capacity(collection.documents.len());

        for document in collection.documents.drain(..) {
            if (!single || deleted == 0) && query.matches(&document) {
                deleted += 1;
            } else {
                kept.push(document);
            }
        }

        collection.documents = kept;
        Ok(DeleteResult::new(deleted))
    }
}

fn check_unique(namespace: &str,
                indexes: &[String],
                documents: &[Document],
                candidate: &Document,
                skip: Option<usize>)
                -> Result<()> {
    let paths = iter::once("_id").chain(indexes.iter().map(|path| path.as_str()));

    for path in paths {
        let value = matcher::lookup(candidate, path).cloned().unwrap_or(Bson::Null);

        for (position, other) in documents.iter().enumerate() {
            if Some(position) == skip {
                continue;
            }

            let existing = matcher::lookup(other, path).cloned().unwrap_or(Bson::Null);
            if matcher::values_equal(&existing, &value) {
                let index = if path == "_id" {
                    String::from("_id_")
                } else {
                    format!("{}_1", path)
                };

                return Err(Error::write(
                    ErrorCode::DuplicateKey,
                    format!(
                        "E11000 duplicate key error collection: {} index: {} dup key: {{ : {} }}",
                        namespace, index, value
                    ),
                ));
            }
        }
    }

    Ok(())
}
