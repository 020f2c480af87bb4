//! Column descriptors
//!
//! Defines the per-column type, slot width, nullability and aggregation.

use std::fmt;

use crate::arena::SliceRef;

/// Width of a slot that references bytes stored in the arena
pub const SLICE_SLOT_SIZE: usize = SliceRef::ENCODED_SIZE;

/// Physical type of a column cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    LargeInt,
    Float,
    Double,
    /// Variable-length bytes, stored in the arena
    Varchar,
    /// HyperLogLog sketch (running state while buffered, serialized after finalize)
    Hll,
}

impl ColumnType {
    /// Bytes occupied by this column's slot inside a row (null byte excluded)
    pub fn slot_size(&self) -> usize {
        match self {
            ColumnType::TinyInt => 1,
            ColumnType::SmallInt => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::BigInt | ColumnType::Double => 8,
            ColumnType::LargeInt => 16,
            ColumnType::Varchar | ColumnType::Hll => SLICE_SLOT_SIZE,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnType::Varchar | ColumnType::Hll)
    }

    /// Parse the short names used by the CLI (`int`, `bigint`, `varchar`, ...)
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "int" => ColumnType::Int,
            "bigint" => ColumnType::BigInt,
            "largeint" => ColumnType::LargeInt,
            "float" => ColumnType::Float,
            "double" => ColumnType::Double,
            "varchar" | "string" => ColumnType::Varchar,
            "hll" => ColumnType::Hll,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::LargeInt => "LARGEINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Hll => "HLL",
        };
        f.write_str(name)
    }
}

/// How a value column combines two cells with equal keys
///
/// Null handling is fixed per aggregation:
/// - `Sum`, `Min`, `Max`, `HllUnion`: null is the identity element
/// - `Replace`: the incoming cell wins, null included
/// - `ReplaceIfNotNull`: an incoming null leaves the resident cell alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    None,
    Sum,
    Min,
    Max,
    Replace,
    ReplaceIfNotNull,
    HllUnion,
}

impl AggregationType {
    /// Whether the column keeps running state that must be finalized at flush
    pub fn has_running_state(&self) -> bool {
        matches!(self, AggregationType::HllUnion)
    }

    /// Whether this aggregation can be applied to a column of `ty`
    pub fn supports(&self, ty: ColumnType) -> bool {
        match self {
            AggregationType::None => true,
            AggregationType::Sum => ty.is_numeric(),
            AggregationType::Min | AggregationType::Max => ty != ColumnType::Hll,
            AggregationType::Replace | AggregationType::ReplaceIfNotNull => {
                ty != ColumnType::Hll
            }
            AggregationType::HllUnion => ty == ColumnType::Hll,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let agg = match name.to_ascii_lowercase().as_str() {
            "none" => AggregationType::None,
            "sum" => AggregationType::Sum,
            "min" => AggregationType::Min,
            "max" => AggregationType::Max,
            "replace" => AggregationType::Replace,
            "replace_if_not_null" => AggregationType::ReplaceIfNotNull,
            "hll_union" => AggregationType::HllUnion,
            _ => return None,
        };
        Some(agg)
    }
}

/// Descriptor of one column in a tablet schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub is_key: bool,
    pub nullable: bool,
    pub aggregation: AggregationType,
}

impl ColumnDef {
    /// A non-nullable key column
    pub fn key(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_key: true,
            nullable: false,
            aggregation: AggregationType::None,
        }
    }

    /// A nullable value column with the given aggregation
    pub fn value(name: impl Into<String>, ty: ColumnType, aggregation: AggregationType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_key: false,
            nullable: true,
            aggregation,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}
