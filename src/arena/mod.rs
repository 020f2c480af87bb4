//! Arena Module
//!
//! Memory ownership and accounting for buffered rows.
//!
//! ## Responsibilities
//! - Hand out stable handles to zeroed byte regions
//! - Store variable-length cell contents copied out of input tuples
//! - Meter every byte against a shared, hierarchical budget
//!
//! ## Layout
//! ```text
//!   MemTracker("load")  ◄── shared across memtables
//!        ▲
//!   MemTracker("memtable")
//!        ▲
//!   Arena ── chunk 0 ─┬─ row ─┬─ row ─┬─ varchar bytes ─┬─ ...
//!          ── chunk 1 ─┴─ row ─┴─ hll registers ─┴─ ...
//! ```

mod pool;
mod tracker;

pub use pool::{Arena, ArenaHandle, SliceRef};
pub use tracker::MemTracker;
