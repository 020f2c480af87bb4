//! Rowset Module
//!
//! Destinations for flushed rows.
//!
//! A memtable hands each row to a `RowsetWriter` in key order and seals
//! the writer once every row has been accepted. Two writers ship with the
//! crate: `MemRowsetWriter` records rows in memory, `FileRowsetWriter`
//! persists them in the format below.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "TBRS" (4) | Version: u16 (2) | Rows: u64 (8)  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [RowLen: u32][bincode(Vec<Option<Datum>>)]            │
//! │   ... repeated for each row, in key order ...           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   DataEnd: u64 (8) | DataCRC: u32 (4) | Padding (4)     │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod memory;
mod reader;

use std::path::PathBuf;

pub use builder::FileRowsetWriter;
pub use iterator::RowsetIterator;
pub use memory::MemRowsetWriter;
pub use reader::RowsetReader;

use crate::error::Result;
use crate::row::RowRef;
use crate::schema::Datum;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a tablet rowset file
pub(crate) const MAGIC: &[u8; 4] = b"TBRS";

/// Current rowset format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + RowCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: DataEnd (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Row frame prefix: RowLen (4)
pub(crate) const FRAME_HEADER_SIZE: usize = 4;

// =============================================================================
// Writer Contract
// =============================================================================

/// Sink for rows drained from a memtable
///
/// `add_row` is called once per row in ascending key order, then `seal`
/// exactly once if every row was accepted. Errors are passed back to the
/// flush caller unchanged.
pub trait RowsetWriter {
    fn add_row(&mut self, row: &RowRef<'_>) -> Result<()>;

    fn seal(&mut self) -> Result<()>;
}

impl<W: RowsetWriter + ?Sized> RowsetWriter for Box<W> {
    fn add_row(&mut self, row: &RowRef<'_>) -> Result<()> {
        (**self).add_row(row)
    }

    fn seal(&mut self) -> Result<()> {
        (**self).seal()
    }
}

// =============================================================================
// Rowset Metadata
// =============================================================================

/// Summary of a sealed rowset file
#[derive(Debug, Clone)]
pub struct Rowset {
    /// Path to the rowset file
    pub path: PathBuf,
    /// Number of rows in this rowset
    pub row_count: u64,
    /// Key cells of the first row (empty for an empty rowset)
    pub first_key: Vec<Option<Datum>>,
    /// Key cells of the last row
    pub last_key: Vec<Option<Datum>>,
    /// File size in bytes
    pub file_size: u64,
}
