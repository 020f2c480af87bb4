//! MemTable Tests
//!
//! Tests verify:
//! - Keys-type policies (duplicate, unique, aggregate)
//! - Per-aggregation merge semantics and null handling
//! - Decode errors and scratch row reuse
//! - Memory accounting and limits
//! - Flush ordering, finalize and failure handling
//! - Lifecycle state transitions

use std::sync::Arc;

use proptest::prelude::*;
use tabletmem::aggregate::hll::HyperLogLog;
use tabletmem::{
    AggregationType, ColumnDef, ColumnType, Datum, InsertKind, KeysType, MemRowsetWriter,
    MemTable, MemTableConfig, MemTableState, MemTracker, RowsetWriter, Schema, TabletError,
};

// =============================================================================
// Helpers
// =============================================================================

fn build(columns: Vec<ColumnDef>, keys_type: KeysType) -> MemTable {
    build_with(columns, keys_type, &MemTableConfig::default())
}

fn build_with(columns: Vec<ColumnDef>, keys_type: KeysType, config: &MemTableConfig) -> MemTable {
    let schema = Arc::new(Schema::new(columns).expect("valid schema"));
    let root = MemTracker::root("load", None);
    MemTable::new(7, schema, keys_type, &root, config).expect("memtable")
}

/// (k INT key, v BIGINT value)
fn kv_table(keys_type: KeysType, agg: AggregationType) -> MemTable {
    build(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::BigInt, agg),
        ],
        keys_type,
    )
}

fn kv(k: i32, v: Option<i64>) -> Vec<Option<Datum>> {
    vec![Some(Datum::Int(k)), v.map(Datum::BigInt)]
}

fn rows(table: &MemTable) -> Vec<Vec<Option<Datum>>> {
    table.iter().map(|row| row.to_datums()).collect()
}

fn flushed(table: &mut MemTable) -> Vec<Vec<Option<Datum>>> {
    let writer = MemRowsetWriter::new();
    let mut sink = writer.clone();
    table.flush(&mut sink).expect("flush");
    assert!(writer.is_sealed());
    writer.rows()
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty_and_open() {
    let table = kv_table(KeysType::Duplicate, AggregationType::None);

    assert!(table.is_empty());
    assert_eq!(table.len(), 0);
    assert_eq!(table.state(), MemTableState::Open);
    assert_eq!(table.tablet_id(), 7);
    assert_eq!(table.keys_type(), KeysType::Duplicate);
    // the scratch row is already allocated
    assert!(table.memory_usage() > 0);
}

#[test]
fn test_aggregate_table_requires_aggregations() {
    let schema = Arc::new(
        Schema::new(vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::Int, AggregationType::None),
        ])
        .unwrap(),
    );
    let root = MemTracker::root("load", None);

    let result = MemTable::new(1, schema, KeysType::Aggregate, &root, &MemTableConfig::default());
    assert!(matches!(result, Err(TabletError::Schema(_))));
}

#[test]
fn test_invalid_config_rejected() {
    let schema = Arc::new(Schema::new(vec![ColumnDef::key("k", ColumnType::Int)]).unwrap());
    let root = MemTracker::root("load", None);
    let config = MemTableConfig::builder().skiplist_branching(1).build();

    let result = MemTable::new(1, schema, KeysType::Duplicate, &root, &config);
    assert!(matches!(result, Err(TabletError::Config(_))));
}

// =============================================================================
// Keys-Type Policy Tests
// =============================================================================

#[test]
fn test_aggregate_sum_merges_equal_keys() {
    let mut table = kv_table(KeysType::Aggregate, AggregationType::Sum);

    let first = table.insert(&kv(1, Some(10))).unwrap();
    let second = table.insert(&kv(1, Some(20))).unwrap();

    assert_eq!(first.kind, InsertKind::Inserted);
    assert_eq!(second.kind, InsertKind::Merged);
    assert_eq!(table.len(), 1);
    assert_eq!(rows(&table), vec![kv(1, Some(30))]);

    let stats = table.stats();
    assert_eq!(stats.rows_inserted, 2);
    assert_eq!(stats.rows_merged, 1);
    assert_eq!(stats.rows_resident, 1);
}

#[test]
fn test_unique_last_write_wins() {
    let mut table = kv_table(KeysType::Unique, AggregationType::None);

    table.insert(&kv(1, Some(10))).unwrap();
    table.insert(&kv(2, Some(5))).unwrap();
    table.insert(&kv(1, Some(20))).unwrap();
    table.insert(&kv(2, None)).unwrap();

    assert_eq!(rows(&table), vec![kv(1, Some(20)), kv(2, None)]);
}

#[test]
fn test_duplicate_keeps_every_row_in_insertion_order() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);

    table.insert(&kv(2, Some(1))).unwrap();
    table.insert(&kv(1, Some(2))).unwrap();
    table.insert(&kv(2, Some(3))).unwrap();
    let outcome = table.insert(&kv(1, Some(4))).unwrap();

    assert_eq!(outcome.kind, InsertKind::Inserted);
    let expected = vec![kv(1, Some(2)), kv(1, Some(4)), kv(2, Some(1)), kv(2, Some(3))];
    assert_eq!(rows(&table), expected);
    // the writer sees the same sequence
    assert_eq!(flushed(&mut table), expected);
}

// =============================================================================
// Aggregation Semantics Tests
// =============================================================================

#[test]
fn test_sum_treats_null_as_identity() {
    let mut table = kv_table(KeysType::Aggregate, AggregationType::Sum);

    table.insert(&kv(1, None)).unwrap();
    table.insert(&kv(1, Some(3))).unwrap();
    table.insert(&kv(1, None)).unwrap();
    table.insert(&kv(1, Some(4))).unwrap();
    table.insert(&kv(2, None)).unwrap();

    assert_eq!(rows(&table), vec![kv(1, Some(7)), kv(2, None)]);
}

#[test]
fn test_sum_wraps_on_overflow() {
    let mut table = build(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::TinyInt, AggregationType::Sum),
        ],
        KeysType::Aggregate,
    );

    table.insert(&vec![Some(Datum::Int(1)), Some(Datum::TinyInt(127))]).unwrap();
    table.insert(&vec![Some(Datum::Int(1)), Some(Datum::TinyInt(1))]).unwrap();

    assert_eq!(
        rows(&table),
        vec![vec![Some(Datum::Int(1)), Some(Datum::TinyInt(-128))]]
    );
}

#[test]
fn test_sum_of_doubles() {
    let mut table = build(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::Double, AggregationType::Sum),
        ],
        KeysType::Aggregate,
    );

    for v in [0.5, 1.25, 2.0] {
        table.insert(&vec![Some(Datum::Int(1)), Some(Datum::Double(v))]).unwrap();
    }

    assert_eq!(
        rows(&table),
        vec![vec![Some(Datum::Int(1)), Some(Datum::Double(3.75))]]
    );
}

#[test]
fn test_min_and_max() {
    let mut table = build(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("lo", ColumnType::Int, AggregationType::Min),
            ColumnDef::value("hi", ColumnType::Varchar, AggregationType::Max),
        ],
        KeysType::Aggregate,
    );

    for (lo, hi) in [(5, "pear"), (-3, "apple"), (9, "zoo"), (0, "kiwi")] {
        table
            .insert(&vec![Some(Datum::Int(1)), Some(Datum::Int(lo)), Some(Datum::from(hi))])
            .unwrap();
    }
    table.insert(&vec![Some(Datum::Int(1)), None, None]).unwrap();

    assert_eq!(
        rows(&table),
        vec![vec![
            Some(Datum::Int(1)),
            Some(Datum::Int(-3)),
            Some(Datum::from("zoo"))
        ]]
    );
}

#[test]
fn test_replace_and_replace_if_not_null() {
    let mut table = build(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("r", ColumnType::Varchar, AggregationType::Replace),
            ColumnDef::value("rn", ColumnType::Varchar, AggregationType::ReplaceIfNotNull),
        ],
        KeysType::Aggregate,
    );

    table
        .insert(&vec![Some(Datum::Int(1)), Some(Datum::from("a")), Some(Datum::from("a"))])
        .unwrap();
    table
        .insert(&vec![Some(Datum::Int(1)), Some(Datum::from("b")), None])
        .unwrap();
    table.insert(&vec![Some(Datum::Int(1)), None, None]).unwrap();

    assert_eq!(
        rows(&table),
        vec![vec![Some(Datum::Int(1)), None, Some(Datum::from("a"))]]
    );
}

#[test]
fn test_replaced_varchar_outlives_later_inserts() {
    let mut table = build(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("s", ColumnType::Varchar, AggregationType::Replace),
        ],
        KeysType::Unique,
    );

    table.insert(&vec![Some(Datum::Int(1)), Some(Datum::from("first"))]).unwrap();
    table.insert(&vec![Some(Datum::Int(1)), Some(Datum::from("second"))]).unwrap();
    for k in 2..200 {
        table
            .insert(&vec![Some(Datum::Int(k)), Some(Datum::from("filler value"))])
            .unwrap();
    }

    let first = table.iter().next().expect("row");
    assert_eq!(first.cell(1), Some(Datum::from("second")));
}

#[test]
fn test_hll_union_finalizes_on_flush() {
    let mut table = build(
        vec![
            ColumnDef::key("page", ColumnType::Int),
            ColumnDef::value("uv", ColumnType::Hll, AggregationType::HllUnion),
        ],
        KeysType::Aggregate,
    );

    for user in 0..2000i64 {
        table
            .insert(&vec![Some(Datum::Int(1)), Some(Datum::BigInt(user % 1000))])
            .unwrap();
    }
    table.insert(&vec![Some(Datum::Int(2)), None]).unwrap();

    // before flush the running registers read back as a sketch as well
    let live = table.iter().next().expect("row");
    assert!(!live.is_finalized());
    let live_sketch = match live.cell(1) {
        Some(Datum::Bytes(b)) => b,
        other => panic!("unexpected cell {:?}", other),
    };

    let out = flushed(&mut table);
    assert_eq!(out.len(), 2);
    let sketch = match &out[0][1] {
        Some(Datum::Bytes(b)) => b.clone(),
        other => panic!("unexpected cell {:?}", other),
    };
    assert_eq!(sketch, live_sketch);
    assert_eq!(out[1][1], None);

    let estimate = HyperLogLog::deserialize(&sketch).unwrap().estimate();
    assert!(
        (850..=1150).contains(&estimate),
        "estimate {} too far from 1000",
        estimate
    );

    assert!(table.iter().all(|row| row.is_finalized()));
}

// =============================================================================
// Decode Error Tests
// =============================================================================

#[test]
fn test_wrong_arity_rejected() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);

    let err = table.insert(&vec![Some(Datum::Int(1))]).unwrap_err();
    assert!(matches!(err, TabletError::Decode { .. }));
    assert!(table.is_empty());
}

#[test]
fn test_type_mismatch_rejected() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);

    let err = table
        .insert(&vec![Some(Datum::Int(1)), Some(Datum::from("nope"))])
        .unwrap_err();
    assert!(matches!(err, TabletError::Decode { column: 1, .. }));
    assert!(table.is_empty());
}

#[test]
fn test_null_key_rejected_when_not_nullable() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);

    let err = table.insert(&kv_null_key()).unwrap_err();
    assert!(matches!(err, TabletError::Decode { column: 0, .. }));
}

fn kv_null_key() -> Vec<Option<Datum>> {
    vec![None, Some(Datum::BigInt(1))]
}

#[test]
fn test_failed_decode_does_not_poison_next_insert() {
    let mut table = kv_table(KeysType::Aggregate, AggregationType::Sum);

    table.insert(&kv(1, Some(1))).unwrap();
    // key decodes, value does not: the partially written scratch row
    // must not leak into the index
    assert!(table
        .insert(&vec![Some(Datum::Int(2)), Some(Datum::Int(5))])
        .is_err());
    table.insert(&kv(3, Some(3))).unwrap();

    assert_eq!(rows(&table), vec![kv(1, Some(1)), kv(3, Some(3))]);
}

// =============================================================================
// Memory Tests
// =============================================================================

#[test]
fn test_memory_usage_never_decreases() {
    let mut table = kv_table(KeysType::Unique, AggregationType::None);
    let mut last = table.memory_usage();

    for i in 0..2000 {
        table.insert(&kv(i % 50, Some(i as i64))).unwrap();
        let now = table.memory_usage();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn test_mem_limit_reported_but_row_stored() {
    let config = MemTableConfig::builder()
        .arena_chunk_size(1024)
        .mem_limit(8 * 1024)
        .build();
    let mut table = build_with(
        vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::BigInt, AggregationType::None),
        ],
        KeysType::Duplicate,
        &config,
    );
    assert!(table.check_mem_limit().is_ok());

    let mut inserted = 0;
    loop {
        let outcome = table.insert(&kv(inserted, Some(0))).unwrap();
        inserted += 1;
        if outcome.mem_limit_exceeded {
            break;
        }
        assert!(inserted < 10_000, "limit never reported");
    }

    assert_eq!(table.len(), inserted as usize);
    match table.check_mem_limit() {
        Err(TabletError::MemLimitExceeded { consumption, limit }) => {
            assert_eq!(limit, 8 * 1024);
            assert!(consumption > limit);
        }
        other => panic!("expected MemLimitExceeded, got {:?}", other),
    }

    // inserts keep succeeding past the limit
    let outcome = table.insert(&kv(-1, Some(0))).unwrap();
    assert!(outcome.mem_limit_exceeded);
}

#[test]
fn test_memtables_share_parent_budget() {
    let root = MemTracker::root("load", Some(150 * 1024));
    let schema = Arc::new(
        Schema::new(vec![
            ColumnDef::key("k", ColumnType::Int),
            ColumnDef::value("v", ColumnType::BigInt, AggregationType::None),
        ])
        .unwrap(),
    );
    let config = MemTableConfig::default();

    // each memtable starts with one 64 KiB chunk
    let a = MemTable::new(1, Arc::clone(&schema), KeysType::Duplicate, &root, &config).unwrap();
    let b = MemTable::new(2, Arc::clone(&schema), KeysType::Duplicate, &root, &config).unwrap();

    assert_eq!(root.consumption(), a.memory_usage() + b.memory_usage());
    assert!(a.check_mem_limit().is_ok());

    let c = MemTable::new(3, schema, KeysType::Duplicate, &root, &config).unwrap();
    assert!(matches!(
        c.check_mem_limit(),
        Err(TabletError::MemLimitExceeded { limit: 153_600, .. })
    ));

    drop(a);
    drop(b);
    drop(c);
    assert_eq!(root.consumption(), 0);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_emits_rows_in_key_order() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);
    for k in [5, 3, 9, 1] {
        table.insert(&kv(k, Some(k as i64 * 10))).unwrap();
    }

    let writer = MemRowsetWriter::new();
    let mut sink = writer.clone();
    let stats = table.flush(&mut sink).unwrap();

    assert_eq!(stats.rows, 4);
    assert_eq!(table.state(), MemTableState::Closed);
    assert_eq!(writer.seal_count(), 1);
    assert_eq!(
        writer.rows(),
        vec![
            kv(1, Some(10)),
            kv(3, Some(30)),
            kv(5, Some(50)),
            kv(9, Some(90))
        ]
    );
}

#[test]
fn test_empty_flush_seals_empty_rowset() {
    let mut table = kv_table(KeysType::Aggregate, AggregationType::Sum);

    let writer = MemRowsetWriter::new();
    let mut sink = writer.clone();
    let stats = table.flush(&mut sink).unwrap();

    assert_eq!(stats.rows, 0);
    assert!(writer.is_empty());
    assert!(writer.is_sealed());
    assert_eq!(table.state(), MemTableState::Closed);
}

#[test]
fn test_writer_failure_stops_flush() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);
    for k in 0..10 {
        table.insert(&kv(k, Some(0))).unwrap();
    }

    let writer = MemRowsetWriter::failing_at(3);
    let mut sink = writer.clone();
    let err = table.flush(&mut sink).unwrap_err();

    assert!(matches!(err, TabletError::RowsetWrite(_)));
    assert_eq!(writer.len(), 3);
    assert!(!writer.is_sealed());
    assert_eq!(table.state(), MemTableState::Flushing);

    // a failed flush is terminal
    let retry = table.flush(&mut MemRowsetWriter::new()).unwrap_err();
    assert!(matches!(retry, TabletError::InvalidState { op: "flush", .. }));
}

#[test]
fn test_seal_failure_leaves_memtable_flushing() {
    let mut table = kv_table(KeysType::Unique, AggregationType::None);
    table.insert(&kv(2, Some(20))).unwrap();
    table.insert(&kv(1, Some(10))).unwrap();

    let writer = MemRowsetWriter::failing_seal();
    let mut sink = writer.clone();
    let err = table.flush(&mut sink).unwrap_err();

    assert!(matches!(err, TabletError::RowsetWrite(_)));
    // every row was handed over before seal was attempted
    assert_eq!(writer.rows(), vec![kv(1, Some(10)), kv(2, Some(20))]);
    assert!(!writer.is_sealed());
    assert_eq!(table.state(), MemTableState::Flushing);

    let retry = table.flush(&mut MemRowsetWriter::new()).unwrap_err();
    assert!(matches!(retry, TabletError::InvalidState { op: "flush", .. }));
    let insert = table.insert(&kv(3, Some(30))).unwrap_err();
    assert!(matches!(insert, TabletError::InvalidState { op: "insert", .. }));
}

#[test]
fn test_insert_after_flush_rejected() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);
    table.insert(&kv(1, Some(1))).unwrap();
    table.flush(&mut MemRowsetWriter::new()).unwrap();

    let err = table.insert(&kv(2, Some(2))).unwrap_err();
    assert!(matches!(err, TabletError::InvalidState { op: "insert", .. }));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_close_is_flush() {
    let mut table = kv_table(KeysType::Unique, AggregationType::None);
    table.insert(&kv(1, Some(1))).unwrap();

    let writer = MemRowsetWriter::new();
    let mut sink = writer.clone();
    let stats = table.close(&mut sink).unwrap();

    assert_eq!(stats.rows, 1);
    assert_eq!(table.state(), MemTableState::Closed);
    assert!(table.close(&mut MemRowsetWriter::new()).is_err());
}

#[test]
fn test_flush_through_trait_object() {
    let mut table = kv_table(KeysType::Duplicate, AggregationType::None);
    table.insert(&kv(1, Some(1))).unwrap();

    let recorded = MemRowsetWriter::new();
    let mut boxed: Box<dyn RowsetWriter> = Box::new(recorded.clone());
    table.flush(boxed.as_mut()).unwrap();

    assert_eq!(recorded.rows(), vec![kv(1, Some(1))]);
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_flush_order_is_independent_of_insert_order(
        keys in proptest::collection::vec(-1000i32..1000, 1..200)
    ) {
        let mut table = kv_table(KeysType::Aggregate, AggregationType::Sum);
        for &k in &keys {
            table.insert(&kv(k, Some(1))).unwrap();
        }

        let mut expected: std::collections::BTreeMap<i32, i64> = Default::default();
        for &k in &keys {
            *expected.entry(k).or_default() += 1;
        }
        let expected: Vec<Vec<Option<Datum>>> =
            expected.into_iter().map(|(k, n)| kv(k, Some(n))).collect();

        prop_assert_eq!(flushed(&mut table), expected);
    }
}
