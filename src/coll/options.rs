//! Write models and executor options.
use bson;
use serde_derive::{Deserialize, Serialize};
use serde_json;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::common::WriteConcern;
use crate::Result;

/// Default cap on the number of items in a single batch.
pub const MAX_WRITE_BATCH_SIZE: usize = 1000;

/// Default cap on the encoded size of a single inserted document.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// A single write within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    Insert { document: bson::Document },
    Update {
        filter: bson::Document,
        update: bson::Document,
        multi: bool,
        upsert: bool,
    },
    Delete {
        filter: bson::Document,
        limit_one: bool,
    },
}

impl WriteModel {
    pub fn insert_one(document: bson::Document) -> WriteModel {
        WriteModel::Insert { document: document }
    }

    pub fn update_one(filter: bson::Document, update: bson::Document) -> WriteModel {
        WriteModel::Update {
            filter: filter,
            update: update,
            multi: false,
            upsert: false,
        }
    }

    pub fn update_many(filter: bson::Document, update: bson::Document) -> WriteModel {
        WriteModel::Update {
            filter: filter,
            update: update,
            multi: true,
            upsert: false,
        }
    }

    /// Replaces a single document. The replacement must not contain $ operators.
    pub fn replace_one(filter: bson::Document, replacement: bson::Document) -> WriteModel {
        WriteModel::update_one(filter, replacement)
    }

    pub fn delete_one(filter: bson::Document) -> WriteModel {
        WriteModel::Delete {
            filter: filter,
            limit_one: true,
        }
    }

    pub fn delete_many(filter: bson::Document) -> WriteModel {
        WriteModel::Delete {
            filter: filter,
            limit_one: false,
        }
    }

    /// Sets the upsert flag on an update model. Inserts and deletes are returned unchanged.
    pub fn upsert(self, upsert: bool) -> WriteModel {
        match self {
            WriteModel::Update { filter, update, multi, .. } => {
                WriteModel::Update {
                    filter: filter,
                    update: update,
                    multi: multi,
                    upsert: upsert,
                }
            }
            model => model,
        }
    }
}

/// Options controlling batch execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Write concern used when a request does not specify one.
    pub default_write_concern: WriteConcern,
    pub max_write_batch_size: usize,
    pub max_document_size: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        ExecutorOptions {
            default_write_concern: WriteConcern::new(),
            max_write_batch_size: MAX_WRITE_BATCH_SIZE,
            max_document_size: MAX_DOCUMENT_SIZE,
        }
    }
}

impl ExecutorOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses options from a JSON document. Omitted fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<ExecutorOptions> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ExecutorOptions> {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        ExecutorOptions::from_json_str(&contents)
    }
}
