//! Row and Comparator Tests
//!
//! Tests verify:
//! - Key ordering per column type (signed ints, floats, varchar bytes)
//! - Nulls sort first
//! - Multi-column keys compare column by column
//! - RowRef accessors
//! - Footprint contract violations panic

use std::cmp::Ordering;
use std::sync::Arc;

use tabletmem::arena::{Arena, MemTracker};
use tabletmem::row::{Comparator, RowComparator};
use tabletmem::schema::DecodedRow;
use tabletmem::{
    AggregationType, ColumnDef, ColumnType, Datum, KeysType, MemTable, MemTableConfig, Schema,
};

// =============================================================================
// Helpers
// =============================================================================

fn memtable(columns: Vec<ColumnDef>, keys_type: KeysType) -> MemTable {
    let schema = Arc::new(Schema::new(columns).expect("valid schema"));
    let root = MemTracker::root("test", None);
    MemTable::new(1, schema, keys_type, &root, &MemTableConfig::default()).expect("memtable")
}

fn first_cells(table: &MemTable) -> Vec<Option<Datum>> {
    table.iter().map(|row| row.cell(0)).collect()
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_signed_ints_order_numerically() {
    let mut table = memtable(vec![ColumnDef::key("k", ColumnType::BigInt)], KeysType::Duplicate);

    for k in [5i64, -1, 300, i64::MIN, 0, -256] {
        table.insert(&vec![Some(Datum::BigInt(k))]).unwrap();
    }

    let keys: Vec<Option<Datum>> = [i64::MIN, -256, -1, 0, 5, 300]
        .into_iter()
        .map(|k| Some(Datum::BigInt(k)))
        .collect();
    assert_eq!(first_cells(&table), keys);
}

#[test]
fn test_largeint_keys_order_numerically() {
    let mut table = memtable(vec![ColumnDef::key("k", ColumnType::LargeInt)], KeysType::Duplicate);

    for k in [i128::MAX, -(1i128 << 100), 1, -1] {
        table.insert(&vec![Some(Datum::LargeInt(k))]).unwrap();
    }

    let keys: Vec<i128> = table
        .iter()
        .map(|row| match row.cell(0) {
            Some(Datum::LargeInt(v)) => v,
            other => panic!("unexpected cell {:?}", other),
        })
        .collect();
    assert_eq!(keys, vec![-(1i128 << 100), -1, 1, i128::MAX]);
}

#[test]
fn test_float_keys_use_total_order() {
    let mut table = memtable(vec![ColumnDef::key("k", ColumnType::Double)], KeysType::Duplicate);

    for k in [2.5f64, f64::NEG_INFINITY, 0.0, -1.5, f64::INFINITY, -0.0] {
        table.insert(&vec![Some(Datum::Double(k))]).unwrap();
    }

    let keys: Vec<f64> = table
        .iter()
        .map(|row| match row.cell(0) {
            Some(Datum::Double(v)) => v,
            other => panic!("unexpected cell {:?}", other),
        })
        .collect();

    assert_eq!(keys.len(), 6);
    for pair in keys.windows(2) {
        assert_eq!(pair[0].total_cmp(&pair[1]), Ordering::Less);
    }
    // -0.0 before 0.0 under total order
    assert!(keys[2].is_sign_negative() && keys[2] == 0.0);
    assert!(keys[3].is_sign_positive() && keys[3] == 0.0);
}

#[test]
fn test_varchar_keys_order_bytewise() {
    let mut table = memtable(vec![ColumnDef::key("k", ColumnType::Varchar)], KeysType::Duplicate);

    let inputs: Vec<Vec<u8>> = vec![
        b"b".to_vec(),
        b"ab".to_vec(),
        vec![0xff, 0x00],
        b"a".to_vec(),
        Vec::new(),
        b"B".to_vec(),
    ];
    for k in &inputs {
        table.insert(&vec![Some(Datum::Bytes(k.clone()))]).unwrap();
    }

    let mut expected = inputs.clone();
    expected.sort();
    let expected: Vec<Option<Datum>> = expected.into_iter().map(|k| Some(Datum::Bytes(k))).collect();
    assert_eq!(first_cells(&table), expected);
}

#[test]
fn test_nulls_sort_first() {
    let mut table = memtable(
        vec![ColumnDef::key("k", ColumnType::Int).nullable(true)],
        KeysType::Duplicate,
    );

    table.insert(&vec![Some(Datum::Int(i32::MIN))]).unwrap();
    table.insert(&vec![None]).unwrap();
    table.insert(&vec![Some(Datum::Int(-7))]).unwrap();

    assert_eq!(
        first_cells(&table),
        vec![None, Some(Datum::Int(i32::MIN)), Some(Datum::Int(-7))]
    );
}

#[test]
fn test_composite_key_compares_column_by_column() {
    let mut table = memtable(
        vec![
            ColumnDef::key("region", ColumnType::Varchar),
            ColumnDef::key("day", ColumnType::Int),
            ColumnDef::value("hits", ColumnType::BigInt, AggregationType::Sum),
        ],
        KeysType::Aggregate,
    );

    for (region, day) in [("west", 2), ("east", 9), ("west", 1), ("east", 3)] {
        table
            .insert(&vec![
                Some(Datum::from(region)),
                Some(Datum::Int(day)),
                Some(Datum::BigInt(1)),
            ])
            .unwrap();
    }

    let keys: Vec<Vec<Option<Datum>>> = table.iter().map(|row| row.key()).collect();
    assert_eq!(
        keys,
        vec![
            vec![Some(Datum::from("east")), Some(Datum::Int(3))],
            vec![Some(Datum::from("east")), Some(Datum::Int(9))],
            vec![Some(Datum::from("west")), Some(Datum::Int(1))],
            vec![Some(Datum::from("west")), Some(Datum::Int(2))],
        ]
    );
}

#[test]
fn test_value_columns_do_not_affect_order() {
    let mut table = memtable(
        vec![
            ColumnDef::value("v", ColumnType::Int, AggregationType::None),
            ColumnDef::key("k", ColumnType::Int),
        ],
        KeysType::Duplicate,
    );

    table.insert(&vec![Some(Datum::Int(1)), Some(Datum::Int(20))]).unwrap();
    table.insert(&vec![Some(Datum::Int(99)), Some(Datum::Int(10))]).unwrap();

    let keys: Vec<Vec<Option<Datum>>> = table.iter().map(|row| row.key()).collect();
    assert_eq!(keys, vec![vec![Some(Datum::Int(10))], vec![Some(Datum::Int(20))]]);
}

// =============================================================================
// RowRef Tests
// =============================================================================

#[test]
fn test_row_ref_accessors() {
    let mut table = memtable(
        vec![
            ColumnDef::key("id", ColumnType::Int),
            ColumnDef::value("name", ColumnType::Varchar, AggregationType::None),
            ColumnDef::value("score", ColumnType::Float, AggregationType::None),
        ],
        KeysType::Duplicate,
    );

    let row = DecodedRow::new(vec![Some(Datum::Int(4)), Some(Datum::from("ada")), None]);
    table.insert(&row).unwrap();

    let view = table.iter().next().expect("one row");
    assert_eq!(view.num_columns(), 3);
    assert!(!view.is_null(1));
    assert!(view.is_null(2));
    assert_eq!(view.cell(1), Some(Datum::from("ada")));
    assert_eq!(view.key(), vec![Some(Datum::Int(4))]);
    assert_eq!(view.to_datums(), row.into_cells());
    assert_eq!(view.as_bytes().len(), view.schema().row_size());
    assert!(!view.is_finalized());
    assert!(format!("{:?}", view).contains("Int(4)"));
}

// =============================================================================
// Comparator Contract Tests
// =============================================================================

#[test]
fn test_comparator_name() {
    let schema = Arc::new(Schema::new(vec![ColumnDef::key("k", ColumnType::Int)]).unwrap());
    assert_eq!(RowComparator::new(schema).name(), "tabletmem.RowComparator");
}

#[test]
#[should_panic(expected = "schema footprint")]
fn test_comparator_panics_on_wrong_row_length() {
    let schema = Arc::new(Schema::new(vec![ColumnDef::key("k", ColumnType::Int)]).unwrap());
    let comparator = RowComparator::new(Arc::clone(&schema));
    let arena = Arena::new(64, MemTracker::root("test", None));

    let good = vec![0u8; schema.row_size()];
    let short = vec![0u8; schema.row_size() - 1];
    comparator.compare(&good, &short, &arena);
}

#[test]
fn test_comparator_on_raw_int_rows() {
    let schema = Arc::new(Schema::new(vec![ColumnDef::key("k", ColumnType::Int)]).unwrap());
    let comparator = RowComparator::new(Arc::clone(&schema));
    let arena = Arena::new(64, MemTracker::root("test", None));

    // [null byte][i32 le]
    let mut a = vec![0u8; schema.row_size()];
    let mut b = vec![0u8; schema.row_size()];
    a[1..5].copy_from_slice(&(-3i32).to_le_bytes());
    b[1..5].copy_from_slice(&2i32.to_le_bytes());

    assert_eq!(comparator.compare(&a, &b, &arena), Ordering::Less);
    assert_eq!(comparator.compare(&b, &a, &arena), Ordering::Greater);
    assert_eq!(comparator.compare(&a, &a, &arena), Ordering::Equal);

    // null key sorts first
    b[0] = 1;
    assert_eq!(comparator.compare(&a, &b, &arena), Ordering::Greater);
}
