use std::sync::atomic::{AtomicI64, Ordering};

use crate::command_type::CommandType;

/// Per-kind operation counts, shared across batches.
#[derive(Debug, Default)]
pub struct OpCounters {
    insert: AtomicI64,
    update: AtomicI64,
    delete: AtomicI64,
}

impl OpCounters {
    pub fn new() -> OpCounters {
        Default::default()
    }

    /// Counts one attempted item of the given kind.
    pub fn record(&self, command_type: CommandType) {
        let counter = if command_type.is_insert() {
            &self.insert
        } else if command_type.is_update() {
            &self.update
        } else {
            &self.delete
        };

        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inserts(&self) -> i64 {
        self.insert.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> i64 {
        self.update.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> i64 {
        self.delete.load(Ordering::Relaxed)
    }
}
