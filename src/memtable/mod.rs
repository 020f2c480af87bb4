//! MemTable Module
//!
//! In-memory write buffer for one tablet generation.
//!
//! ## Responsibilities
//! - Decode incoming tuples into arena-owned rows
//! - Keep rows sorted by key in a skip list index
//! - Apply the tablet's keys-type policy on key collisions
//! - Drain rows in key order into a rowset writer, exactly once
//!
//! ## Lifecycle
//! ```text
//!   ┌──────┐  flush()/close()  ┌──────────┐  sealed  ┌────────┐
//!   │ Open │ ────────────────► │ Flushing │ ───────► │ Closed │
//!   └──┬───┘                   └──────────┘          └────────┘
//!      │ insert()                (terminal on failure)
//!      └──────┘
//! ```
//!
//! ## Concurrency
//! Single writer: `insert` and `flush` take `&mut self`, so overlapping
//! calls on one instance are ruled out by the borrow checker. The only
//! state shared across memtables is the parent `MemTracker`.

mod table;

pub use table::{FlushStats, InsertKind, InsertOutcome, MemTable, MemTableStats};

use std::fmt;

/// Where a memtable is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemTableState {
    /// Accepting inserts
    Open,
    /// Draining, or a drain failed; no way back
    Flushing,
    /// Drained and sealed
    Closed,
}

impl fmt::Display for MemTableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemTableState::Open => "Open",
            MemTableState::Flushing => "Flushing",
            MemTableState::Closed => "Closed",
        };
        f.write_str(name)
    }
}
