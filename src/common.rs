//! Shared write controls and namespace handling.
use bson::{self, Bson};
use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::coll::error::ErrorCode;
use crate::{Error, Result};

/// The acknowledgment requested by the `w` field of a write concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "AckRepr", into = "AckRepr")]
pub enum Acknowledgment {
    /// Wait for this many data-bearing members. Zero is unacknowledged.
    Nodes(i32),
    /// Wait for a majority of voting members.
    Majority,
    /// Wait for members satisfying a named replica set tag mode.
    Tag(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AckRepr {
    Nodes(i32),
    Mode(String),
}

impl From<AckRepr> for Acknowledgment {
    fn from(repr: AckRepr) -> Self {
        match repr {
            AckRepr::Nodes(n) => Acknowledgment::Nodes(n),
            AckRepr::Mode(ref mode) if mode == "majority" => Acknowledgment::Majority,
            AckRepr::Mode(mode) => Acknowledgment::Tag(mode),
        }
    }
}

impl From<Acknowledgment> for AckRepr {
    fn from(ack: Acknowledgment) -> Self {
        match ack {
            Acknowledgment::Nodes(n) => AckRepr::Nodes(n),
            Acknowledgment::Majority => AckRepr::Mode("majority".to_owned()),
            Acknowledgment::Tag(tag) => AckRepr::Mode(tag),
        }
    }
}

impl Default for Acknowledgment {
    fn default() -> Self {
        Acknowledgment::Nodes(1)
    }
}

impl From<Acknowledgment> for Bson {
    fn from(ack: Acknowledgment) -> Self {
        match ack {
            Acknowledgment::Nodes(n) => Bson::I32(n),
            Acknowledgment::Majority => Bson::String("majority".to_owned()),
            Acknowledgment::Tag(tag) => Bson::String(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConcern {
    pub w: Acknowledgment,   // Write replication
    #[serde(rename = "wtimeout")]
    pub w_timeout: i32,      // Used in conjunction with 'w'. Propagation timeout in ms.
    pub j: bool,             // If true, will block until write operations have been committed to journal.
    pub fsync: bool,         // If true and server is not journaling, blocks until server has synced all data files to disk.
}

impl Default for WriteConcern {
    fn default() -> Self {
        WriteConcern::new()
    }
}

impl WriteConcern {
    pub fn new() -> WriteConcern {
        WriteConcern {
            w: Acknowledgment::Nodes(1),
            w_timeout: 0,
            j: false,
            fsync: false,
        }
    }

    /// Returns true if the caller expects a reply for this write concern.
    pub fn is_acknowledged(&self) -> bool {
        self.w != Acknowledgment::Nodes(0) || self.j || self.fsync
    }

    pub fn to_bson(&self) -> bson::Document {
        let mut bson = bson::Document::new();
        bson.insert("w".to_owned(), Bson::from(self.w.clone()));
        bson.insert("wtimeout".to_owned(), Bson::I32(self.w_timeout));
        bson.insert("j".to_owned(), Bson::Boolean(self.j));
        bson.insert("fsync".to_owned(), Bson::Boolean(self.fsync));
        bson
    }

    /// Parses a request's `writeConcern` document. Omitted fields keep their defaults.
    pub fn parse(document: &bson::Document) -> Result<WriteConcern> {
        let mut concern = WriteConcern::new();

        for (key, value) in document.iter() {
            match key.as_str() {
                "w" => {
                    concern.w = match *value {
                        Bson::String(ref mode) if mode == "majority" => Acknowledgment::Majority,
                        Bson::String(ref tag) => Acknowledgment::Tag(tag.to_owned()),
                        _ => Acknowledgment::Nodes(parse_i32("w", value)?),
                    };
                }
                "wtimeout" => concern.w_timeout = parse_i32("wtimeout", value)?,
                "j" => concern.j = parse_flag("j", value)?,
                "fsync" => concern.fsync = parse_flag("fsync", value)?,
                // Accepted for compatibility; a batch reports through its own response.
                "getLastError" | "getlasterror" => (),
                _ => {
                    return Err(Error::write(
                        ErrorCode::FailedToParse,
                        format!("unrecognized write concern field: {}", key),
                    ))
                }
            }
        }

        Ok(concern)
    }

    /// Checks the internal consistency of this write concern.
    pub fn validate(&self) -> Result<()> {
        if self.j && self.fsync {
            return Err(Error::write(
                ErrorCode::InvalidOptions,
                "fsync and j options cannot be used together",
            ));
        }

        if let Acknowledgment::Nodes(n) = self.w {
            if n < 0 {
                return Err(Error::write(
                    ErrorCode::BadValue,
                    format!("w has to be a non-negative number, not {}", n),
                ));
            }
        }

        if let Acknowledgment::Tag(ref tag) = self.w {
            if tag.is_empty() {
                return Err(Error::write(ErrorCode::BadValue, "w cannot be an empty string"));
            }
        }

        if self.w_timeout < 0 {
            return Err(Error::write(
                ErrorCode::BadValue,
                format!("wtimeout has to be a non-negative number, not {}", self.w_timeout),
            ));
        }

        Ok(())
    }
}

fn parse_i32(field: &str, value: &Bson) -> Result<i32> {
    match *value {
        Bson::I32(n) => Ok(n),
        Bson::I64(n) if n >= i32::min_value() as i64 && n <= i32::max_value() as i64 => {
            Ok(n as i32)
        }
        Bson::FloatingPoint(f) if f.fract() == 0.0 && f.abs() <= i32::max_value() as f64 => {
            Ok(f as i32)
        }
        _ => Err(Error::write(
            ErrorCode::FailedToParse,
            format!("{} must be a number, found {:?}", field, value),
        )),
    }
}

fn parse_flag(field: &str, value: &Bson) -> Result<bool> {
    match *value {
        Bson::Boolean(b) => Ok(b),
        Bson::I32(n) => Ok(n != 0),
        Bson::I64(n) => Ok(n != 0),
        Bson::FloatingPoint(f) => Ok(f != 0.0),
        _ => Err(Error::write(
            ErrorCode::FailedToParse,
            format!("{} must be a boolean, found {:?}", field, value),
        )),
    }
}

/// A fully-qualified collection name, formatted as db_name.coll_name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new<D: Into<String>, C: Into<String>>(db: D, collection: C) -> Namespace {
        Namespace {
            db: db.into(),
            collection: collection.into(),
        }
    }

    /// Splits a namespace string on its first '.'.
    pub fn parse(namespace: &str) -> Result<Namespace> {
        match namespace.find('.') {
            Some(idx) if idx > 0 && idx + 1 < namespace.len() => {
                Ok(Namespace::new(&namespace[..idx], &namespace[idx + 1..]))
            }
            _ => Err(Error::ArgumentError(format!("Invalid namespace: '{}'", namespace))),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.db, self.collection)
    }
}
