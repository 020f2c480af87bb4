//! Cell values and the input tuple contract
//!
//! `Datum` is the owned, typed form of one cell, used both for decoded
//! input and for finalized rows handed to rowset writers.

use serde::{Deserialize, Serialize};

use super::ColumnType;

/// A single non-null cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    LargeInt(i128),
    Float(f32),
    Double(f64),
    /// Varchar contents, or a serialized HLL sketch after finalize
    Bytes(Vec<u8>),
}

impl Datum {
    /// Whether this value can be stored in a column of type `ty`.
    /// HLL columns accept any value: it is hashed into the sketch.
    pub fn fits(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (Datum::TinyInt(_), ColumnType::TinyInt)
                | (Datum::SmallInt(_), ColumnType::SmallInt)
                | (Datum::Int(_), ColumnType::Int)
                | (Datum::BigInt(_), ColumnType::BigInt)
                | (Datum::LargeInt(_), ColumnType::LargeInt)
                | (Datum::Float(_), ColumnType::Float)
                | (Datum::Double(_), ColumnType::Double)
                | (Datum::Bytes(_), ColumnType::Varchar)
                | (_, ColumnType::Hll)
        )
    }

    /// Canonical little-endian bytes, used for hashing into HLL sketches
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Datum::TinyInt(v) => v.to_le_bytes().to_vec(),
            Datum::SmallInt(v) => v.to_le_bytes().to_vec(),
            Datum::Int(v) => v.to_le_bytes().to_vec(),
            Datum::BigInt(v) => v.to_le_bytes().to_vec(),
            Datum::LargeInt(v) => v.to_le_bytes().to_vec(),
            Datum::Float(v) => v.to_le_bytes().to_vec(),
            Datum::Double(v) => v.to_le_bytes().to_vec(),
            Datum::Bytes(v) => v.clone(),
        }
    }

    /// Parse a text field into a datum of type `ty`.
    /// HLL fields are kept as raw bytes and hashed on insert.
    pub fn parse(text: &str, ty: ColumnType) -> Option<Self> {
        let datum = match ty {
            ColumnType::TinyInt => Datum::TinyInt(text.parse().ok()?),
            ColumnType::SmallInt => Datum::SmallInt(text.parse().ok()?),
            ColumnType::Int => Datum::Int(text.parse().ok()?),
            ColumnType::BigInt => Datum::BigInt(text.parse().ok()?),
            ColumnType::LargeInt => Datum::LargeInt(text.parse().ok()?),
            ColumnType::Float => Datum::Float(text.parse().ok()?),
            ColumnType::Double => Datum::Double(text.parse().ok()?),
            ColumnType::Varchar | ColumnType::Hll => Datum::Bytes(text.as_bytes().to_vec()),
        };
        Some(datum)
    }
}

impl From<i8> for Datum {
    fn from(v: i8) -> Self {
        Datum::TinyInt(v)
    }
}

impl From<i16> for Datum {
    fn from(v: i16) -> Self {
        Datum::SmallInt(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int(v)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::BigInt(v)
    }
}

impl From<i128> for Datum {
    fn from(v: i128) -> Self {
        Datum::LargeInt(v)
    }
}

impl From<f32> for Datum {
    fn from(v: f32) -> Self {
        Datum::Float(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Double(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Datum::Bytes(v)
    }
}

/// A decoded input record, one optional cell per schema column
///
/// The memtable never parses wire bytes: whatever produces tuples has
/// already split them into typed cells.
pub trait Tuple {
    /// Number of cells in this tuple
    fn num_cells(&self) -> usize;

    /// Cell at `column`, `None` when null
    fn cell(&self, column: usize) -> Option<&Datum>;

    fn is_null(&self, column: usize) -> bool {
        self.cell(column).is_none()
    }
}

/// Owned tuple backed by a vector of cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRow {
    cells: Vec<Option<Datum>>,
}

impl DecodedRow {
    pub fn new(cells: Vec<Option<Datum>>) -> Self {
        Self { cells }
    }

    pub fn into_cells(self) -> Vec<Option<Datum>> {
        self.cells
    }
}

impl From<Vec<Option<Datum>>> for DecodedRow {
    fn from(cells: Vec<Option<Datum>>) -> Self {
        Self { cells }
    }
}

impl Tuple for DecodedRow {
    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, column: usize) -> Option<&Datum> {
        self.cells.get(column).and_then(|c| c.as_ref())
    }
}

impl Tuple for [Option<Datum>] {
    fn num_cells(&self) -> usize {
        self.len()
    }

    fn cell(&self, column: usize) -> Option<&Datum> {
        self.get(column).and_then(|c| c.as_ref())
    }
}

impl Tuple for Vec<Option<Datum>> {
    fn num_cells(&self) -> usize {
        self.len()
    }

    fn cell(&self, column: usize) -> Option<&Datum> {
        self.get(column).and_then(|c| c.as_ref())
    }
}
