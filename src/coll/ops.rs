//! Operation handlers. Each applies exactly one write item through the storage collaborator.
use bson::{self, oid, Bson, Document};

use super::error::{ErrorCode, WriteError};
use super::options::{ExecutorOptions, WriteModel};
use super::results::{WriteEffect, WriteOutcome};
use crate::matcher::Query;
use crate::storage::{OpDeleteFlags, OpUpdateFlags, Storage};
use crate::update::{self, UpdateSpec};
use crate::{Error, Result};

/// Applies the item at `index`. Per-item failures come back as `WriteOutcome::Failure`;
/// only fatal errors are returned as `Err`.
pub fn do_write(storage: &mut dyn Storage,
                index: usize,
                model: &WriteModel,
                options: &ExecutorOptions)
                -> Result<WriteOutcome> {
    let result = match *model {
        WriteModel::Insert { ref document } => do_insert(storage, document, options),
        WriteModel::Update { ref filter, ref update, multi, upsert } => {
            do_update(storage, filter, update, multi, upsert, options)
        }
        WriteModel::Delete { ref filter, limit_one } => do_delete(storage, filter, limit_one),
    };

    match result {
        Ok(effect) => Ok(WriteOutcome::Success(effect)),
        Err(ref err) if !err.is_fatal() => {
            Ok(WriteOutcome::Failure(WriteError::with_error(index, err)))
        }
        Err(err) => Err(err),
    }
}

fn do_insert(storage: &mut dyn Storage,
             document: &Document,
             options: &ExecutorOptions)
             -> Result<WriteEffect> {
    let document = fix_document_for_insert(document, options.max_document_size)?;
    storage.insert_one(document)?;
    Ok(WriteEffect::Insert { inserted_count: 1 })
}

fn do_update(storage: &mut dyn Storage,
             filter: &Document,
             update: &Document,
             multi: bool,
             upsert: bool,
             options: &ExecutorOptions)
             -> Result<WriteEffect> {
    Query::parse(filter)?;
    let spec = UpdateSpec::parse(update)?;

    if let UpdateSpec::Replacement(ref replacement) = spec {
        if multi {
            return Err(Error::write(
                ErrorCode::FailedToParse,
                "multi update only works with $ operators",
            ));
        }

        check_field_names(replacement)?;
    }

    let result = storage.update(filter,
                                update,
                                OpUpdateFlags::with_options(multi, upsert),
                                options.max_document_size)?;

    // An upsert matched nothing but still counts as one updated document.
    let effect = match result.upserted_id {
        Some(id) => WriteEffect::Update {
            matched_count: 1,
            modified_count: 0,
            upserted_id: Some(id),
        },
        None => WriteEffect::Update {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: None,
        },
    };

    Ok(effect)
}

fn do_delete(storage: &mut dyn Storage, filter: &Document, limit_one: bool) -> Result<WriteEffect> {
    Query::parse(filter)?;
    let result = storage.delete(filter, OpDeleteFlags::with_options(limit_one))?;
    Ok(WriteEffect::Delete { deleted_count: result.deleted_count })
}

/// Validates a document for insertion and returns the copy that will be stored: `_id`
/// first, generated if missing.
pub fn fix_document_for_insert(document: &Document, max_size: usize) -> Result<Document> {
    check_field_names(document)?;

    let id = match document.get("_id") {
        Some(id) => id.clone(),
        None => Bson::ObjectId(oid::ObjectId::new()?),
    };

    let mut fixed = Document::new();
    fixed.insert("_id", id);
    for (key, value) in document.iter() {
        if key != "_id" {
            fixed.insert(key.to_owned(), value.clone());
        }
    }

    check_document_size(&fixed, max_size)?;
    Ok(fixed)
}

/// Checks a document produced by an update or upsert before storage writes it.
pub fn validate_stored_document(document: &Document, max_size: usize) -> Result<()> {
    check_field_names(document)?;
    check_document_size(document, max_size)
}

fn check_field_names(document: &Document) -> Result<()> {
    for (key, value) in document.iter() {
        if key.starts_with('$') {
            return Err(Error::write(
                ErrorCode::BadValue,
                format!("Document can't have $ prefixed field names: {}", key),
            ));
        }

        if key.contains('.') {
            return Err(Error::write(
                ErrorCode::BadValue,
                format!("Document can't have . in field names: {}", key),
            ));
        }

        if key == "_id" {
            match *value {
                Bson::Array(_) | Bson::RegExp(..) => {
                    return Err(Error::write(
                        ErrorCode::InvalidIdField,
                        format!("can't use a value of type {} for _id", update::type_name(value)),
                    ))
                }
                _ => (),
            }
        }
    }

    Ok(())
}

fn check_document_size(document: &Document, max_size: usize) -> Result<()> {
    let mut buffer = Vec::new();
    bson::encode_document(&mut buffer, document)?;

    if buffer.len() > max_size {
        return Err(Error::write(
            ErrorCode::DocumentTooLarge,
            format!(
                "document too large. size in bytes: {}, max size: {}",
                buffer.len(),
                max_size
            ),
        ));
    }

    Ok(())
}
