//! Write Monitoring
//!
//! The APM module exposes runtime information about the items of a write batch. Every
//! attempted item is counted in `OpCounters` and triggers the start and completion hooks
//! registered on a `Listener`. Hooks observe only; nothing they do can change the outcome
//! of an item or of the batch.
mod counters;
mod event;
mod listener;

pub use self::counters::OpCounters;
pub use self::event::{WriteResult, WriteStarted};
pub use self::listener::{CompletionHook, Listener, StartHook};
