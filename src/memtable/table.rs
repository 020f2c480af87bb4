//! MemTable implementation
//!
//! Skip list of arena rows plus a single scratch row for decoding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::aggregate::AggregatePolicy;
use crate::arena::{Arena, ArenaHandle, MemTracker};
use crate::config::MemTableConfig;
use crate::error::{Result, TabletError};
use crate::row::{cell, RowComparator, RowRef};
use crate::rowset::RowsetWriter;
use crate::schema::{KeysType, Schema, Tuple};
use crate::skiplist::SkipList;

use super::MemTableState;

/// What happened to an inserted tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertKind {
    /// Became a new resident row
    Inserted,
    /// Folded into an existing row with the same key
    Merged,
}

/// Result of a successful insert
///
/// The row is always stored. `mem_limit_exceeded` tells the caller the
/// shared budget is over its limit and an earlier flush is advisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub kind: InsertKind,
    pub mem_limit_exceeded: bool,
}

/// Counters about what the memtable has absorbed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemTableStats {
    /// Tuples accepted by `insert`
    pub rows_inserted: u64,
    /// Tuples merged into an existing row
    pub rows_merged: u64,
    /// Rows currently resident in the index
    pub rows_resident: u64,
}

/// Outcome of a completed flush, for the caller's metrics sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub rows: u64,
    pub duration: Duration,
}

/// In-memory write buffer for one tablet
pub struct MemTable {
    tablet_id: i64,
    schema: Arc<Schema>,
    policy: AggregatePolicy,
    arena: Arena,
    index: SkipList<RowComparator>,
    /// Row being decoded; `None` only between a commit and its replacement
    scratch: Option<ArenaHandle>,
    state: MemTableState,
    /// Leading rows (in index order) whose running state is resolved
    finalized_rows: usize,
    rows_inserted: u64,
    rows_merged: u64,
    over_limit_reported: bool,
}

impl MemTable {
    /// Create an empty memtable charging its arena to a child of `parent`
    pub fn new(
        tablet_id: i64,
        schema: Arc<Schema>,
        keys_type: KeysType,
        parent: &Arc<MemTracker>,
        config: &MemTableConfig,
    ) -> Result<Self> {
        config.validate()?;
        schema.validate_for(keys_type)?;

        let tracker = parent.child("memtable", config.mem_limit);
        let mut arena = Arena::new(config.arena_chunk_size, tracker);
        let row_size = schema.row_size();
        let scratch = arena.allocate(row_size);

        let index = SkipList::new(
            RowComparator::new(Arc::clone(&schema)),
            row_size,
            keys_type == KeysType::Duplicate,
            config.skiplist_max_height,
            config.skiplist_branching,
            config.skiplist_seed,
        );

        tracing::debug!(
            "Created memtable for tablet {} ({}, {} columns, {}-byte rows)",
            tablet_id,
            keys_type,
            schema.num_columns(),
            row_size
        );

        Ok(Self {
            tablet_id,
            policy: AggregatePolicy::new(Arc::clone(&schema), keys_type),
            schema,
            arena,
            index,
            scratch: Some(scratch),
            state: MemTableState::Open,
            finalized_rows: 0,
            rows_inserted: 0,
            rows_merged: 0,
            over_limit_reported: false,
        })
    }

    // =========================================================================
    // Insert Path
    // =========================================================================

    /// Decode `tuple` into the scratch row and add it to the index
    ///
    /// A new key commits the scratch row to the index and a fresh one is
    /// allocated; an existing key merges into the resident row and the
    /// scratch row is reused by the next call.
    pub fn insert<T: Tuple + ?Sized>(&mut self, tuple: &T) -> Result<InsertOutcome> {
        self.ensure_open("insert")?;

        let num_columns = self.schema.num_columns();
        if tuple.num_cells() != num_columns {
            return Err(TabletError::Decode {
                column: tuple.num_cells().min(num_columns),
                reason: format!(
                    "tuple has {} cells, schema has {} columns",
                    tuple.num_cells(),
                    num_columns
                ),
            });
        }

        let row_size = self.schema.row_size();
        let scratch = match self.scratch {
            Some(handle) => handle,
            None => {
                let handle = self.arena.allocate(row_size);
                self.scratch = Some(handle);
                handle
            }
        };

        for col in 0..num_columns {
            cell::consume(&self.schema, &mut self.arena, scratch, col, tuple.cell(col))?;
        }

        let (resident, existed) = self.index.insert_or_locate(scratch, &mut self.arena);
        let kind = if existed {
            self.policy.merge(&mut self.arena, resident, scratch);
            self.rows_merged += 1;
            InsertKind::Merged
        } else {
            // scratch now belongs to the index
            self.scratch = Some(self.arena.allocate(row_size));
            InsertKind::Inserted
        };
        self.rows_inserted += 1;

        let mem_limit_exceeded = self.arena.tracker().limit_exceeded();
        if mem_limit_exceeded && !self.over_limit_reported {
            self.over_limit_reported = true;
            tracing::warn!(
                "Tablet {} memtable over memory limit at {} bytes",
                self.tablet_id,
                self.memory_usage()
            );
        }

        tracing::trace!("Tablet {} insert: {:?}", self.tablet_id, kind);
        Ok(InsertOutcome {
            kind,
            mem_limit_exceeded,
        })
    }

    /// Bytes consumed by this memtable's arena; never decreases
    pub fn memory_usage(&self) -> u64 {
        self.arena.consumption()
    }

    /// Fail with `MemLimitExceeded` if this memtable's tracker, or any
    /// tracker above it, is over its limit
    pub fn check_mem_limit(&self) -> Result<()> {
        match self.arena.tracker().exceeded_tracker() {
            Some(tracker) => Err(TabletError::MemLimitExceeded {
                consumption: tracker.consumption(),
                limit: tracker.limit().unwrap_or_default(),
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Flush Path
    // =========================================================================

    /// Drain every row in key order into `writer`, then seal it
    ///
    /// Each row is finalized immediately before it is handed over. The
    /// first writer error stops the drain and is returned as is; the
    /// memtable stays in `Flushing` and cannot be used again.
    pub fn flush<W: RowsetWriter + ?Sized>(&mut self, writer: &mut W) -> Result<FlushStats> {
        self.ensure_open("flush")?;
        self.state = MemTableState::Flushing;

        let start = Instant::now();
        let row_size = self.schema.row_size();
        let mut rows = 0u64;

        for handle in self.index.iter() {
            self.policy.finalize(&mut self.arena, handle);
            self.finalized_rows += 1;

            let row = RowRef::new(&self.schema, self.arena.slice(handle, row_size), &self.arena, true);
            if let Err(e) = writer.add_row(&row) {
                tracing::warn!(
                    "Tablet {} flush failed at row {}: {}",
                    self.tablet_id,
                    rows,
                    e
                );
                return Err(e);
            }
            rows += 1;
        }

        if let Err(e) = writer.seal() {
            tracing::warn!("Tablet {} flush failed to seal rowset: {}", self.tablet_id, e);
            return Err(e);
        }

        self.state = MemTableState::Closed;
        let duration = start.elapsed();
        tracing::info!(
            "Flushed tablet {} memtable: {} rows, {} bytes, {:?}",
            self.tablet_id,
            rows,
            self.memory_usage(),
            duration
        );

        Ok(FlushStats { rows, duration })
    }

    /// Same as `flush`: ends the memtable's useful life
    pub fn close<W: RowsetWriter + ?Sized>(&mut self, writer: &mut W) -> Result<FlushStats> {
        self.flush(writer)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Resident rows in key order
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> + '_ {
        let row_size = self.schema.row_size();
        self.index.iter().enumerate().map(move |(pos, handle)| {
            RowRef::new(
                &self.schema,
                self.arena.slice(handle, row_size),
                &self.arena,
                pos < self.finalized_rows,
            )
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn state(&self) -> MemTableState {
        self.state
    }

    pub fn tablet_id(&self) -> i64 {
        self.tablet_id
    }

    pub fn keys_type(&self) -> KeysType {
        self.policy.keys_type()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The tracker this memtable's arena reports into
    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        self.arena.tracker()
    }

    pub fn stats(&self) -> MemTableStats {
        MemTableStats {
            rows_inserted: self.rows_inserted,
            rows_merged: self.rows_merged,
            rows_resident: self.index.len() as u64,
        }
    }

    fn ensure_open(&self, op: &'static str) -> Result<()> {
        if self.state != MemTableState::Open {
            return Err(TabletError::InvalidState {
                op,
                state: self.state.to_string(),
            });
        }
        Ok(())
    }
}
