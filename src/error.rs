//! Error types for write-batch execution.
use bson::{self, oid};
use serde_json;
use std::{error, fmt, io, result, sync};

use crate::coll::error::ErrorCode;

/// A type for results generated by write-batch operations, where the error type is
/// hard-wired to `write_batch::Error`.
pub type Result<T> = result::Result<T, Error>;

/// The error type for write-batch operations.
#[derive(Debug)]
pub enum Error {
    /// A single write item failed validation or was rejected by storage.
    WriteFailure(ErrorCode, String),
    /// An argument was malformed or inconsistent with the operation.
    ArgumentError(String),
    /// The execution context for a namespace could not be acquired or was lost.
    ContextError(String),
    /// A lock protecting shared state was poisoned.
    LockError,
    /// A document could not be encoded.
    EncoderError(bson::EncoderError),
    /// A document could not be decoded.
    DecoderError(bson::DecoderError),
    /// An ObjectId could not be generated.
    OidError(oid::Error),
    /// A configuration document could not be parsed.
    JsonError(serde_json::Error),
    /// An I/O error, typically while reading configuration.
    IoError(io::Error),
}

impl Error {
    /// Builds a per-item failure with the given code.
    pub fn write<T: ToString>(code: ErrorCode, message: T) -> Error {
        Error::WriteFailure(code, message.to_string())
    }

    /// Returns true if this error must abort the whole batch rather than be recorded
    /// against a single item.
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::ContextError(_) | Error::LockError | Error::IoError(_) => true,
            _ => false,
        }
    }

    /// The stable error code reported to clients for this error.
    pub fn code(&self) -> ErrorCode {
        match *self {
            Error::WriteFailure(code, _) => code,
            Error::ArgumentError(_) | Error::EncoderError(_) | Error::DecoderError(_) => {
                ErrorCode::BadValue
            }
            Error::JsonError(_) => ErrorCode::FailedToParse,
            Error::ContextError(_) |
            Error::LockError |
            Error::OidError(_) |
            Error::IoError(_) => ErrorCode::InternalError,
        }
    }

    /// The human-readable message reported to clients for this error.
    pub fn message(&self) -> String {
        match *self {
            Error::WriteFailure(_, ref message) => message.to_owned(),
            _ => self.to_string(),
        }
    }
}

impl<'a> From<&'a str> for Error {
    fn from(s: &str) -> Error {
        Error::ArgumentError(s.to_owned())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::ArgumentError(s)
    }
}

impl From<bson::EncoderError> for Error {
    fn from(err: bson::EncoderError) -> Error {
        Error::EncoderError(err)
    }
}

impl From<bson::DecoderError> for Error {
    fn from(err: bson::DecoderError) -> Error {
        Error::DecoderError(err)
    }
}

impl From<oid::Error> for Error {
    fn from(err: oid::Error) -> Error {
        Error::OidError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Error {
        Error::LockError
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::WriteFailure(code, ref message) => {
                write!(fmt, "{} ({}): {}", code, code.as_i32(), message)
            }
            Error::ArgumentError(ref inner) => inner.fmt(fmt),
            Error::ContextError(ref inner) => write!(fmt, "Execution context error: {}", inner),
            Error::LockError => write!(fmt, "Lock poisoned."),
            Error::EncoderError(ref inner) => inner.fmt(fmt),
            Error::DecoderError(ref inner) => inner.fmt(fmt),
            Error::OidError(ref inner) => inner.fmt(fmt),
            Error::JsonError(ref inner) => inner.fmt(fmt),
            Error::IoError(ref inner) => inner.fmt(fmt),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::EncoderError(ref inner) => Some(inner),
            Error::DecoderError(ref inner) => Some(inner),
            Error::OidError(ref inner) => Some(inner),
            Error::JsonError(ref inner) => Some(inner),
            Error::IoError(ref inner) => Some(inner),
            _ => None,
        }
    }
}
