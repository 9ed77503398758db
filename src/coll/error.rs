//! Write errors for batch-level operations.
use bson::{self, Bson};
use serde_derive::{Deserialize, Serialize};
use std::{error, fmt};

use crate::common::WriteConcern;
use crate::Error;

/// The closed set of error codes reported by write batches. Values match the
/// server's numeric codes so responses stay wire-compatible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InternalError,
    BadValue,
    FailedToParse,
    TypeMismatch,
    InvalidLength,
    PathNotViable,
    WriteConcernFailed,
    ImmutableField,
    InvalidOptions,
    UnknownReplWriteConcern,
    UnsatisfiableWriteConcern,
    InvalidIdField,
    DocumentTooLarge,
    DuplicateKey,
}

impl ErrorCode {
    pub fn as_i32(&self) -> i32 {
        match *self {
            ErrorCode::InternalError => 1,
            ErrorCode::BadValue => 2,
            ErrorCode::FailedToParse => 9,
            ErrorCode::TypeMismatch => 14,
            ErrorCode::InvalidLength => 16,
            ErrorCode::PathNotViable => 28,
            ErrorCode::WriteConcernFailed => 64,
            ErrorCode::ImmutableField => 66,
            ErrorCode::InvalidOptions => 72,
            ErrorCode::UnknownReplWriteConcern => 79,
            ErrorCode::UnsatisfiableWriteConcern => 100,
            ErrorCode::InvalidIdField => 103,
            ErrorCode::DocumentTooLarge => 10334,
            ErrorCode::DuplicateKey => 11000,
        }
    }

    pub fn to_str(&self) -> &str {
        match *self {
            ErrorCode::InternalError => "InternalError",
            ErrorCode::BadValue => "BadValue",
            ErrorCode::FailedToParse => "FailedToParse",
            ErrorCode::TypeMismatch => "TypeMismatch",
            ErrorCode::InvalidLength => "InvalidLength",
            ErrorCode::PathNotViable => "PathNotViable",
            ErrorCode::WriteConcernFailed => "WriteConcernFailed",
            ErrorCode::ImmutableField => "ImmutableField",
            ErrorCode::InvalidOptions => "InvalidOptions",
            ErrorCode::UnknownReplWriteConcern => "UnknownReplWriteConcern",
            ErrorCode::UnsatisfiableWriteConcern => "UnsatisfiableWriteConcern",
            ErrorCode::InvalidIdField => "InvalidIdField",
            ErrorCode::DocumentTooLarge => "DocumentTooLarge",
            ErrorCode::DuplicateKey => "DuplicateKey",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.to_str())
    }
}

/// The error struct for a single failed write item, indicating its index in the
/// original batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WriteError {
    pub index: usize,
    pub code: ErrorCode,
    pub message: String,
}

/// The error struct for a write-concern related error.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConcernError {
    pub code: ErrorCode,
    pub details: WriteConcern,
    pub message: String,
    pub info: Option<bson::Document>,
}

/// A batch-level failure that is not attributable to any single item: the batch was
/// rejected before execution, or aborted part-way through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl WriteError {
    /// Returns a new WriteError containing the provided error information.
    pub fn new<T: ToString>(index: usize, code: ErrorCode, message: T) -> WriteError {
        WriteError {
            index: index,
            code: code,
            message: message.to_string(),
        }
    }

    /// Attributes a non-fatal crate error to the item at `index`.
    pub fn with_error(index: usize, err: &Error) -> WriteError {
        WriteError::new(index, err.code(), err.message())
    }
}

impl WriteConcernError {
    /// Returns a new WriteConcernError containing the provided error information.
    pub fn new<T: ToString>(code: ErrorCode, details: WriteConcern, message: T) -> WriteConcernError {
        WriteConcernError {
            code: code,
            details: details,
            message: message.to_string(),
            info: None,
        }
    }

    /// Attaches extra diagnostic information, reported as `errInfo`.
    pub fn with_info(mut self, info: bson::Document) -> WriteConcernError {
        self.info = Some(info);
        self
    }
}

impl CommandError {
    pub fn new<T: ToString>(code: ErrorCode, message: T) -> CommandError {
        CommandError {
            code: code,
            message: message.to_string(),
        }
    }
}

impl<'a> From<&'a Error> for CommandError {
    fn from(err: &'a Error) -> CommandError {
        CommandError::new(err.code(), err.message())
    }
}

impl From<WriteError> for bson::Document {
    fn from(error: WriteError) -> Self {
        let mut document = bson::Document::new();
        document.insert("index", Bson::I32(error.index as i32));
        document.insert("code", Bson::I32(error.code.as_i32()));
        document.insert("errmsg", Bson::String(error.message));
        document
    }
}

impl From<WriteConcernError> for bson::Document {
    fn from(error: WriteConcernError) -> Self {
        let mut document = bson::Document::new();
        document.insert("code", Bson::I32(error.code.as_i32()));
        document.insert("errmsg", Bson::String(error.message));

        if let Some(info) = error.info {
            document.insert("errInfo", Bson::Document(info));
        }

        document
    }
}

impl error::Error for WriteError {}

impl error::Error for WriteConcernError {}

impl error::Error for CommandError {}

impl fmt::Display for WriteError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "WriteError at index {} ({} {}): {}",
            self.index,
            self.code,
            self.code.as_i32(),
            self.message
        )
    }
}

impl fmt::Display for WriteConcernError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "WriteConcernError ({} {}): {}",
            self.code,
            self.code.as_i32(),
            self.message
        )
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} ({}): {}", self.code, self.code.as_i32(), self.message)
    }
}
