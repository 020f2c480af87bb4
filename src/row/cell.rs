//! Cell encoding
//!
//! Writes decoded tuple cells into row slots (the copy boundary between the
//! caller's tuple and arena-owned bytes) and reads slots back as `Datum`s.

use std::cmp::Ordering;

use crate::aggregate::hll::{self, HLL_REGISTERS};
use crate::arena::{Arena, ArenaHandle, SliceRef};
use crate::error::{Result, TabletError};
use crate::schema::{ColumnType, Datum, Schema};

pub(crate) const NOT_NULL: u8 = 0;
pub(crate) const NULL: u8 = 1;

/// Byte range of column `col`'s slot within a row
pub(crate) fn slot_range(schema: &Schema, col: usize) -> std::ops::Range<usize> {
    let start = schema.cell_offset(col) + 1;
    start..start + schema.column(col).ty.slot_size()
}

pub(crate) fn is_null(schema: &Schema, row: &[u8], col: usize) -> bool {
    row[schema.cell_offset(col)] == NULL
}

/// Decode one input cell into the row at `row`
///
/// Variable-length contents are appended to the arena, never borrowed from
/// the tuple. HLL cells get fresh dense registers seeded with the value.
pub(crate) fn consume(
    schema: &Schema,
    arena: &mut Arena,
    row: ArenaHandle,
    col: usize,
    cell: Option<&Datum>,
) -> Result<()> {
    let column = schema.column(col);
    let row_size = schema.row_size();

    let datum = match cell {
        None => {
            if !column.nullable {
                return Err(TabletError::Decode {
                    column: col,
                    reason: format!("null value for non-nullable column '{}'", column.name),
                });
            }
            let bytes = arena.slice_mut(row, row_size);
            bytes[schema.cell_offset(col)] = NULL;
            bytes[slot_range(schema, col)].fill(0);
            return Ok(());
        }
        Some(datum) => datum,
    };

    if !datum.fits(column.ty) {
        return Err(TabletError::Decode {
            column: col,
            reason: format!("{:?} does not fit column '{}' of type {}", datum, column.name, column.ty),
        });
    }

    let slice = match column.ty {
        ColumnType::Varchar => match datum {
            Datum::Bytes(bytes) => Some(arena.append(bytes)),
            _ => None,
        },
        ColumnType::Hll => {
            let handle = arena.allocate(HLL_REGISTERS);
            let registers = arena.slice_mut(handle, HLL_REGISTERS);
            hll::update_registers(registers, hll::hash_value(&datum.canonical_bytes()));
            Some(SliceRef {
                chunk: handle.chunk(),
                offset: handle.offset(),
                len: HLL_REGISTERS as u32,
            })
        }
        _ => None,
    };

    let bytes = arena.slice_mut(row, row_size);
    bytes[schema.cell_offset(col)] = NOT_NULL;
    let slot = &mut bytes[slot_range(schema, col)];
    match (slice, datum) {
        (Some(slice), _) => slice.encode(slot),
        (None, Datum::TinyInt(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::SmallInt(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::Int(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::BigInt(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::LargeInt(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::Float(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::Double(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (None, Datum::Bytes(_)) => unreachable!("byte cells always go through the arena"),
    }
    Ok(())
}

/// Read a non-null slot as a datum.
/// `finalized` selects how HLL slots are interpreted.
pub(crate) fn read_slot(ty: ColumnType, slot: &[u8], arena: &Arena, finalized: bool) -> Datum {
    match ty {
        ColumnType::TinyInt => Datum::TinyInt(i8::from_le_bytes(fixed(slot))),
        ColumnType::SmallInt => Datum::SmallInt(i16::from_le_bytes(fixed(slot))),
        ColumnType::Int => Datum::Int(i32::from_le_bytes(fixed(slot))),
        ColumnType::BigInt => Datum::BigInt(i64::from_le_bytes(fixed(slot))),
        ColumnType::LargeInt => Datum::LargeInt(i128::from_le_bytes(fixed(slot))),
        ColumnType::Float => Datum::Float(f32::from_le_bytes(fixed(slot))),
        ColumnType::Double => Datum::Double(f64::from_le_bytes(fixed(slot))),
        ColumnType::Varchar => Datum::Bytes(arena.bytes(SliceRef::decode(slot)).to_vec()),
        ColumnType::Hll => {
            let bytes = arena.bytes(SliceRef::decode(slot));
            if finalized {
                Datum::Bytes(bytes.to_vec())
            } else {
                Datum::Bytes(hll::serialize_registers(bytes))
            }
        }
    }
}

/// Type-specific order of two non-null slots
pub(crate) fn compare_slots(ty: ColumnType, a: &[u8], b: &[u8], arena: &Arena) -> Ordering {
    match ty {
        ColumnType::TinyInt => i8::from_le_bytes(fixed(a)).cmp(&i8::from_le_bytes(fixed(b))),
        ColumnType::SmallInt => i16::from_le_bytes(fixed(a)).cmp(&i16::from_le_bytes(fixed(b))),
        ColumnType::Int => i32::from_le_bytes(fixed(a)).cmp(&i32::from_le_bytes(fixed(b))),
        ColumnType::BigInt => i64::from_le_bytes(fixed(a)).cmp(&i64::from_le_bytes(fixed(b))),
        ColumnType::LargeInt => i128::from_le_bytes(fixed(a)).cmp(&i128::from_le_bytes(fixed(b))),
        ColumnType::Float => f32::from_le_bytes(fixed(a)).total_cmp(&f32::from_le_bytes(fixed(b))),
        ColumnType::Double => f64::from_le_bytes(fixed(a)).total_cmp(&f64::from_le_bytes(fixed(b))),
        ColumnType::Varchar | ColumnType::Hll => arena
            .bytes(SliceRef::decode(a))
            .cmp(arena.bytes(SliceRef::decode(b))),
    }
}

/// Copy a slot into a fixed-size array for `from_le_bytes`
pub(crate) fn fixed<const N: usize>(slot: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&slot[..N]);
    buf
}
