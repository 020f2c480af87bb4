//! Row Module
//!
//! Contiguous, schema-laid-out row buffers living in the arena.
//!
//! ## Responsibilities
//! - Decode input tuples into row slots (`consume`)
//! - Read-only row views handed to rowset writers (`RowRef`)
//! - Key ordering over rows (`RowComparator`)

pub(crate) mod cell;
mod compare;

pub use compare::{Comparator, RowComparator};

use std::fmt;

use crate::arena::Arena;
use crate::schema::{Datum, Schema};

/// Read-only view of one buffered row
///
/// HLL cells read as a serialized sketch in both states; before finalize
/// the sketch is produced on the fly from the running registers.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    schema: &'a Schema,
    bytes: &'a [u8],
    arena: &'a Arena,
    finalized: bool,
}

impl<'a> RowRef<'a> {
    pub(crate) fn new(schema: &'a Schema, bytes: &'a [u8], arena: &'a Arena, finalized: bool) -> Self {
        Self {
            schema,
            bytes,
            arena,
            finalized,
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn num_columns(&self) -> usize {
        self.schema.num_columns()
    }

    /// Whether running state has been resolved for this row
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_null(&self, col: usize) -> bool {
        cell::is_null(self.schema, self.bytes, col)
    }

    /// Cell at `col`, `None` when null
    pub fn cell(&self, col: usize) -> Option<Datum> {
        if self.is_null(col) {
            return None;
        }
        let slot = &self.bytes[cell::slot_range(self.schema, col)];
        Some(cell::read_slot(
            self.schema.column(col).ty,
            slot,
            self.arena,
            self.finalized,
        ))
    }

    /// All cells in schema order
    pub fn to_datums(&self) -> Vec<Option<Datum>> {
        (0..self.num_columns()).map(|col| self.cell(col)).collect()
    }

    /// Key cells in key order
    pub fn key(&self) -> Vec<Option<Datum>> {
        self.schema
            .key_columns()
            .iter()
            .map(|&col| self.cell(col))
            .collect()
    }

    /// Raw row bytes (null bytes and slots)
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

impl fmt::Debug for RowRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_datums()).finish()
    }
}
