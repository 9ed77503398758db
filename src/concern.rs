//! Write concern resolution and evaluation.
//!
//! A batch's effective write concern is resolved and validated before any item runs. After
//! the last attempted item, a `WriteConcernEvaluator` decides whether the acknowledgment
//! requirement was met; a failure there is reported next to, not instead of, the per-item
//! results.
use bson::{bson, doc, Document};
use std::collections::BTreeSet;
use std::result;
use tracing::debug;

use crate::coll::error::{ErrorCode, WriteConcernError};
use crate::coll::results::WriteStats;
use crate::common::{Acknowledgment, WriteConcern};
use crate::Result;

/// Returns the request's write concern if one was given, otherwise `default`, after checking
/// that it is internally consistent.
pub fn resolve(requested: Option<&Document>, default: &WriteConcern) -> Result<WriteConcern> {
    let concern = match requested {
        Some(document) => WriteConcern::parse(document)?,
        None => default.clone(),
    };

    concern.validate()?;
    Ok(concern)
}

/// Waits for the effects of a batch to satisfy a write concern.
pub trait WriteConcernEvaluator {
    fn wait_for(&self,
                concern: &WriteConcern,
                stats: &WriteStats)
                -> result::Result<(), WriteConcernError>;
}

impl<F> WriteConcernEvaluator for F
    where F: Fn(&WriteConcern, &WriteStats) -> result::Result<(), WriteConcernError>
{
    fn wait_for(&self,
                concern: &WriteConcern,
                stats: &WriteStats)
                -> result::Result<(), WriteConcernError> {
        self(concern, stats)
    }
}

/// Evaluates write concerns against a fixed description of the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEvaluator {
    pub data_bearing_members: i32,
    pub journaling: bool,
    /// Named tag modes configured on the replica set.
    pub tags: BTreeSet<String>,
}

impl TopologyEvaluator {
    pub fn new(data_bearing_members: i32, journaling: bool) -> TopologyEvaluator {
        TopologyEvaluator {
            data_bearing_members: data_bearing_members,
            journaling: journaling,
            tags: BTreeSet::new(),
        }
    }

    /// A single journaled server.
    pub fn standalone() -> TopologyEvaluator {
        TopologyEvaluator::new(1, true)
    }

    /// A journaled replica set with the given tag modes.
    pub fn replica_set<I, S>(data_bearing_members: i32, tags: I) -> TopologyEvaluator
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        let mut evaluator = TopologyEvaluator::new(data_bearing_members, true);
        evaluator.tags = tags.into_iter().map(Into::into).collect();
        evaluator
    }
}

impl WriteConcernEvaluator for TopologyEvaluator {
    fn wait_for(&self,
                concern: &WriteConcern,
                _stats: &WriteStats)
                -> result::Result<(), WriteConcernError> {
        if !concern.is_acknowledged() {
            return Ok(());
        }

        if concern.j && !self.journaling {
            return Err(WriteConcernError::new(
                ErrorCode::BadValue,
                concern.clone(),
                "cannot use 'j' option when a host does not have journaling enabled",
            ));
        }

        match concern.w {
            Acknowledgment::Nodes(n) if n > self.data_bearing_members => {
                debug!(w = n, members = self.data_bearing_members, "write concern exceeds members");

                if concern.w_timeout > 0 {
                    Err(WriteConcernError::new(
                        ErrorCode::WriteConcernFailed,
                        concern.clone(),
                        "waiting for replication timed out",
                    )
                    .with_info(doc! { "wtimeout": true }))
                } else {
                    Err(WriteConcernError::new(
                        ErrorCode::UnsatisfiableWriteConcern,
                        concern.clone(),
                        "Not enough data-bearing nodes",
                    ))
                }
            }
            Acknowledgment::Tag(ref tag) if !self.tags.contains(tag) => {
                Err(WriteConcernError::new(
                    ErrorCode::UnknownReplWriteConcern,
                    concern.clone(),
                    format!("No write concern mode named '{}' found in replica set configuration", tag),
                ))
            }
            _ => Ok(()),
        }
    }
}
