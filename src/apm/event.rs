use chrono::{DateTime, Utc};
use std::fmt::{Display, Error, Formatter};

use crate::coll::error::WriteError;
use crate::coll::results::WriteEffect;
use crate::common::Namespace;

/// Emitted before a write item is handed to storage.
pub struct WriteStarted {
    pub namespace: Namespace,
    pub command_name: String,
    pub index: usize,
    pub started_at: DateTime<Utc>,
}

impl Display for WriteStarted {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), Error> {
        fmt.write_fmt(format_args!("WRITE.{} {}[{}] STARTED at {}", self.command_name,
                                   self.namespace, self.index, self.started_at.to_rfc3339()))
    }
}

/// Emitted once a write item has succeeded or failed. Durations are in nanoseconds.
pub enum WriteResult<'a> {
    Success {
        duration: u64,
        effect: &'a WriteEffect,
        command_name: String,
        namespace: Namespace,
        index: usize,
    },
    Failure {
        duration: u64,
        command_name: String,
        failure: &'a WriteError,
        namespace: Namespace,
        index: usize,
    },
}

impl<'a> WriteResult<'a> {
    pub fn index(&self) -> usize {
        match *self {
            WriteResult::Success { index, .. } |
            WriteResult::Failure { index, .. } => index,
        }
    }

    pub fn is_success(&self) -> bool {
        match *self {
            WriteResult::Success { .. } => true,
            WriteResult::Failure { .. } => false,
        }
    }
}

impl<'a> Display for WriteResult<'a> {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), Error> {
        match *self {
            WriteResult::Success { duration, effect, ref command_name, ref namespace, index } => {
                fmt.write_fmt(format_args!("WRITE.{} {}[{}] COMPLETED: {:?} ({} ns)", command_name,
                                           namespace, index, effect, duration))
            }
            WriteResult::Failure { duration, ref command_name, failure, ref namespace, index } => {
                fmt.write_fmt(format_args!("WRITE.{} {}[{}] FAILURE: {} ({} ns)", command_name,
                                           namespace, index, failure, duration))
            }
        }
    }
}
