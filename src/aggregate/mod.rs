//! Aggregate Module
//!
//! Keys-type policy for rows whose keys collide, plus flush-time
//! finalization of running state.
//!
//! ## Responsibilities
//! - Unique keys: overwrite the resident row's value cells
//! - Aggregate keys: fold each value cell with its column's aggregation
//! - Finalize: turn running state (HLL registers) into its final value
//!
//! Key cells are never touched: they already compare equal.

pub mod hll;

use std::sync::Arc;

use crate::arena::{Arena, ArenaHandle, SliceRef};
use crate::row::cell::{self, NULL};
use crate::schema::{AggregationType, ColumnType, KeysType, Schema};

use hll::HLL_REGISTERS;

/// Null byte plus the widest slot (LARGEINT)
const MAX_CELL_SIZE: usize = 1 + 16;

/// Merge and finalize rules for one tablet
#[derive(Debug, Clone)]
pub struct AggregatePolicy {
    schema: Arc<Schema>,
    keys_type: KeysType,
}

impl AggregatePolicy {
    pub fn new(schema: Arc<Schema>, keys_type: KeysType) -> Self {
        Self { schema, keys_type }
    }

    pub fn keys_type(&self) -> KeysType {
        self.keys_type
    }

    /// Whether equal keys collapse into one resident row
    pub fn merges(&self) -> bool {
        self.keys_type != KeysType::Duplicate
    }

    /// Whether rows carry running state that flush must resolve
    pub fn needs_finalize(&self) -> bool {
        self.keys_type == KeysType::Aggregate && self.schema.has_running_state()
    }

    /// Fold `incoming` into `resident`, in place
    ///
    /// `incoming` is only read; it stays owned by the caller.
    pub fn merge(&self, arena: &mut Arena, resident: ArenaHandle, incoming: ArenaHandle) {
        debug_assert!(self.merges(), "duplicate-key tables never merge");

        for col in 0..self.schema.num_columns() {
            let column = self.schema.column(col);
            if column.is_key {
                continue;
            }
            let aggregation = match self.keys_type {
                KeysType::Unique => AggregationType::Replace,
                KeysType::Aggregate => column.aggregation,
                KeysType::Duplicate => return,
            };
            self.merge_cell(arena, resident, incoming, col, aggregation);
        }
    }

    /// Resolve every running-state cell of `row` to its final value
    ///
    /// Must run exactly once per row, right before the row leaves the
    /// memtable; a no-op for tables without running state.
    pub fn finalize(&self, arena: &mut Arena, row: ArenaHandle) {
        if !self.needs_finalize() {
            return;
        }
        let row_size = self.schema.row_size();

        for col in 0..self.schema.num_columns() {
            let column = self.schema.column(col);
            if column.is_key || !column.aggregation.has_running_state() {
                continue;
            }
            let range = cell::slot_range(&self.schema, col);
            let bytes = arena.slice(row, row_size);
            if cell::is_null(&self.schema, bytes, col) {
                continue;
            }

            let registers = SliceRef::decode(&bytes[range.clone()]);
            let serialized = hll::serialize_registers(arena.bytes(registers));
            let finalized = arena.append(&serialized);
            finalized.encode(&mut arena.slice_mut(row, row_size)[range]);
        }
    }

    fn merge_cell(
        &self,
        arena: &mut Arena,
        resident: ArenaHandle,
        incoming: ArenaHandle,
        col: usize,
        aggregation: AggregationType,
    ) {
        let row_size = self.schema.row_size();
        let ty = self.schema.column(col).ty;
        let offset = self.schema.cell_offset(col);
        let width = 1 + ty.slot_size();

        let mut new_cell = [0u8; MAX_CELL_SIZE];
        new_cell[..width].copy_from_slice(&arena.slice(incoming, row_size)[offset..offset + width]);
        let new_cell = &new_cell[..width];
        let new_null = new_cell[0] == NULL;
        let old_null = arena.slice(resident, row_size)[offset] == NULL;

        let overwrite = match aggregation {
            AggregationType::None => false,
            AggregationType::Replace => true,
            AggregationType::ReplaceIfNotNull => !new_null,
            // null is the identity element from here on
            _ if new_null => false,
            _ if old_null => true,
            AggregationType::Sum => {
                let old = arena.slice_mut(resident, row_size);
                sum_slot(ty, &mut old[offset + 1..offset + width], &new_cell[1..]);
                false
            }
            AggregationType::Min | AggregationType::Max => {
                let old = &arena.slice(resident, row_size)[offset + 1..offset + width];
                let ordering = cell::compare_slots(ty, &new_cell[1..], old, arena);
                match aggregation {
                    AggregationType::Min => ordering.is_lt(),
                    _ => ordering.is_gt(),
                }
            }
            AggregationType::HllUnion => {
                let src = SliceRef::decode(&new_cell[1..]);
                let dst = SliceRef::decode(&arena.slice(resident, row_size)[offset + 1..offset + width]);
                let mut registers = [0u8; HLL_REGISTERS];
                registers.copy_from_slice(arena.bytes(src));
                hll::merge_registers(arena.slice_mut(dst.handle(), HLL_REGISTERS), &registers);
                false
            }
        };

        if overwrite {
            arena.slice_mut(resident, row_size)[offset..offset + width].copy_from_slice(new_cell);
        }
    }
}

/// `old += new` for a numeric slot; integers wrap on overflow
fn sum_slot(ty: ColumnType, old: &mut [u8], new: &[u8]) {
    match ty {
        ColumnType::TinyInt => {
            let v = i8::from_le_bytes(cell::fixed(old)).wrapping_add(i8::from_le_bytes(cell::fixed(new)));
            old.copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::SmallInt => {
            let v = i16::from_le_bytes(cell::fixed(old)).wrapping_add(i16::from_le_bytes(cell::fixed(new)));
            old.copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::Int => {
            let v = i32::from_le_bytes(cell::fixed(old)).wrapping_add(i32::from_le_bytes(cell::fixed(new)));
            old.copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::BigInt => {
            let v = i64::from_le_bytes(cell::fixed(old)).wrapping_add(i64::from_le_bytes(cell::fixed(new)));
            old.copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::LargeInt => {
            let v = i128::from_le_bytes(cell::fixed(old)).wrapping_add(i128::from_le_bytes(cell::fixed(new)));
            old.copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::Float => {
            let v = f32::from_le_bytes(cell::fixed(old)) + f32::from_le_bytes(cell::fixed(new));
            old.copy_from_slice(&v.to_le_bytes());
        }
        ColumnType::Double => {
            let v = f64::from_le_bytes(cell::fixed(old)) + f64::from_le_bytes(cell::fixed(new));
            old.copy_from_slice(&v.to_le_bytes());
        }
        // rejected by schema validation
        ColumnType::Varchar | ColumnType::Hll => {}
    }
}
