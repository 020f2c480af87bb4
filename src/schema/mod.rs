//! Schema Module
//!
//! Read-only tablet metadata shared by every component of a memtable.
//!
//! ## Responsibilities
//! - Column descriptors (type, nullability, aggregation)
//! - Key column positions, in schema order
//! - Fixed row footprint and per-cell offsets
//! - Input tuple contract (`Tuple`) and cell values (`Datum`)
//!
//! ## Row Layout
//! ```text
//! ┌──────┬────────────┬──────┬────────────┬─────┐
//! │Null 0│  Slot 0    │Null 1│  Slot 1    │ ... │
//! │ (1)  │(slot_size) │ (1)  │(slot_size) │     │
//! └──────┴────────────┴──────┴────────────┴─────┘
//! ```

mod column;
mod value;

pub use column::{AggregationType, ColumnDef, ColumnType, SLICE_SLOT_SIZE};
pub use value::{Datum, DecodedRow, Tuple};

use std::fmt;

use crate::error::{Result, TabletError};

/// Conflict-resolution semantics for records sharing a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeysType {
    /// Every record is kept; equal keys are ordered by insertion
    Duplicate,
    /// Last write wins on value columns
    Unique,
    /// Value columns are combined by their aggregation
    Aggregate,
}

impl KeysType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dup" | "duplicate" => Some(KeysType::Duplicate),
            "unique" => Some(KeysType::Unique),
            "agg" | "aggregate" => Some(KeysType::Aggregate),
            _ => None,
        }
    }
}

impl fmt::Display for KeysType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeysType::Duplicate => "DUP_KEYS",
            KeysType::Unique => "UNIQUE_KEYS",
            KeysType::Aggregate => "AGG_KEYS",
        };
        f.write_str(name)
    }
}

/// Immutable column layout of a tablet
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    /// Positions of key columns, in schema order
    key_columns: Vec<usize>,
    /// Offset of each column's null byte inside a row
    offsets: Vec<usize>,
    row_size: usize,
}

impl Schema {
    /// Build a schema, computing offsets and key positions
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        if columns.is_empty() {
            return Err(TabletError::Schema("schema has no columns".into()));
        }

        let mut offsets = Vec::with_capacity(columns.len());
        let mut key_columns = Vec::new();
        let mut row_size = 0;

        for (idx, column) in columns.iter().enumerate() {
            if column.is_key {
                if column.aggregation != AggregationType::None {
                    return Err(TabletError::Schema(format!(
                        "key column '{}' cannot carry aggregation {:?}",
                        column.name, column.aggregation
                    )));
                }
                if column.ty == ColumnType::Hll {
                    return Err(TabletError::Schema(format!(
                        "key column '{}' cannot be of type HLL",
                        column.name
                    )));
                }
                key_columns.push(idx);
            }
            offsets.push(row_size);
            row_size += 1 + column.ty.slot_size();
        }

        if key_columns.is_empty() {
            return Err(TabletError::Schema("schema has no key columns".into()));
        }

        Ok(Self {
            columns,
            key_columns,
            offsets,
            row_size,
        })
    }

    /// Check that the value columns make sense for the given keys type
    pub fn validate_for(&self, keys_type: KeysType) -> Result<()> {
        for column in self.columns.iter().filter(|c| !c.is_key) {
            match keys_type {
                KeysType::Aggregate => {
                    if column.aggregation == AggregationType::None {
                        return Err(TabletError::Schema(format!(
                            "value column '{}' needs an aggregation in an {} table",
                            column.name, keys_type
                        )));
                    }
                    if !column.aggregation.supports(column.ty) {
                        return Err(TabletError::Schema(format!(
                            "aggregation {:?} is not valid for column '{}' of type {}",
                            column.aggregation, column.name, column.ty
                        )));
                    }
                }
                KeysType::Duplicate | KeysType::Unique => {
                    if column.ty == ColumnType::Hll {
                        return Err(TabletError::Schema(format!(
                            "HLL column '{}' is only allowed in {} tables",
                            column.name,
                            KeysType::Aggregate
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> &ColumnDef {
        &self.columns[idx]
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Key column positions in comparison order
    pub fn key_columns(&self) -> &[usize] {
        &self.key_columns
    }

    /// Offset of column `idx`'s null byte; its slot follows immediately
    pub fn cell_offset(&self, idx: usize) -> usize {
        self.offsets[idx]
    }

    /// Fixed footprint of one row in bytes
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Whether any column keeps running state until flush
    pub fn has_running_state(&self) -> bool {
        self.columns
            .iter()
            .any(|c| !c.is_key && c.aggregation.has_running_state())
    }
}
