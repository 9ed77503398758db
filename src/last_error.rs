//! The per-client record of the most recent write, as reported by getLastError.
use bson::{self, Bson};

use crate::coll::error::{ErrorCode, WriteError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastError {
    pub n: i64,
    // Only set for updates.
    pub updated_existing: Option<bool>,
    pub upserted: Option<Bson>,
    pub code: Option<ErrorCode>,
    pub message: Option<String>,
}

impl LastError {
    pub fn new() -> LastError {
        Default::default()
    }

    /// Clears the record at the start of a batch.
    pub fn reset(&mut self) {
        *self = LastError::new();
    }

    pub fn record_insert(&mut self, n: i64) {
        self.reset();
        self.n = n;
    }

    pub fn record_update(&mut self, updated_existing: bool, n: i64, upserted: Option<Bson>) {
        self.reset();
        self.n = n;
        self.updated_existing = Some(updated_existing);
        self.upserted = upserted;
    }

    pub fn record_delete(&mut self, n: i64) {
        self.reset();
        self.n = n;
    }

    pub fn raise_error(&mut self, error: &WriteError) {
        self.reset();
        self.code = Some(error.code);
        self.message = Some(error.message.clone());
    }

    pub fn is_error(&self) -> bool {
        self.code.is_some()
    }

    pub fn to_bson(&self) -> bson::Document {
        let mut document = bson::Document::new();
        document.insert("ok", Bson::FloatingPoint(1.0));
        document.insert("n", Bson::I64(self.n));

        match self.message {
            Some(ref message) => document.insert("err", Bson::String(message.to_owned())),
            None => document.insert("err", Bson::Null),
        };

        if let Some(code) = self.code {
            document.insert("code", Bson::I32(code.as_i32()));
        }

        if let Some(updated_existing) = self.updated_existing {
            document.insert("updatedExisting", Bson::Boolean(updated_existing));
        }

        if let Some(ref upserted) = self.upserted {
            document.insert("upserted", upserted.clone());
        }

        document
    }
}
