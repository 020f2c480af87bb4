//! # tabletmem
//!
//! In-memory write buffer for one tablet of a columnar store:
//! - Arena-backed rows with a hierarchical memory budget
//! - Key-ordered skip list index
//! - Duplicate, unique and aggregate keys policies
//! - One-shot flush into a rowset writer
//!
//! ## Architecture Overview
//!
//! ```text
//!   tuples ──► MemTable::insert
//!                  │ decode into scratch row
//!                  ▼
//!           ┌─────────────┐  locate   ┌────────────────┐
//!           │  SkipList   │ ────────► │ AggregatePolicy│
//!           │ (row order) │   merge   │ (keys type)    │
//!           └──────┬──────┘           └────────────────┘
//!                  │ rows live in
//!                  ▼
//!           ┌─────────────┐  charges  ┌────────────────┐
//!           │    Arena    │ ────────► │   MemTracker   │
//!           └──────┬──────┘           │  (tablet/node) │
//!                  │                  └────────────────┘
//!   MemTable::flush│ finalize, key order
//!                  ▼
//!           ┌─────────────┐
//!           │RowsetWriter │ ──► FileRowsetWriter / MemRowsetWriter
//!           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod schema;
pub mod arena;
pub mod row;
pub mod skiplist;
pub mod aggregate;
pub mod memtable;
pub mod rowset;
pub mod metrics;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TabletError};
pub use config::MemTableConfig;
pub use arena::MemTracker;
pub use memtable::{FlushStats, InsertKind, InsertOutcome, MemTable, MemTableState};
pub use metrics::FlushMetrics;
pub use row::RowRef;
pub use rowset::{FileRowsetWriter, MemRowsetWriter, RowsetReader, RowsetWriter};
pub use schema::{AggregationType, ColumnDef, ColumnType, Datum, KeysType, Schema};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tabletmem
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
