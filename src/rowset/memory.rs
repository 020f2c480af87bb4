//! In-memory rowset writer
//!
//! Records flushed rows so callers and tests can inspect them. Clones
//! share one buffer, so a handle kept outside the flush sees the rows.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TabletError};
use crate::row::RowRef;
use crate::schema::Datum;

use super::RowsetWriter;

#[derive(Debug, Default)]
struct Recorded {
    rows: Vec<Vec<Option<Datum>>>,
    seal_count: usize,
    /// Reject the add at this zero-based position
    fail_at: Option<usize>,
    fail_seal: bool,
}

/// `RowsetWriter` that keeps rows in memory
#[derive(Debug, Clone, Default)]
pub struct MemRowsetWriter {
    inner: Arc<Mutex<Recorded>>,
}

impl MemRowsetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer that rejects the `n`th row (zero-based) and every row
    /// after it
    pub fn failing_at(n: usize) -> Self {
        let writer = Self::default();
        writer.inner.lock().fail_at = Some(n);
        writer
    }

    /// A writer that accepts every row but rejects `seal`
    pub fn failing_seal() -> Self {
        let writer = Self::default();
        writer.inner.lock().fail_seal = true;
        writer
    }

    /// Copy of the rows accepted so far
    pub fn rows(&self) -> Vec<Vec<Option<Datum>>> {
        self.inner.lock().rows.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().seal_count > 0
    }

    /// How many times `seal` succeeded
    pub fn seal_count(&self) -> usize {
        self.inner.lock().seal_count
    }
}

impl RowsetWriter for MemRowsetWriter {
    fn add_row(&mut self, row: &RowRef<'_>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.seal_count > 0 {
            return Err(TabletError::RowsetWrite("add_row after seal".into()));
        }
        if let Some(n) = inner.fail_at {
            if inner.rows.len() >= n {
                return Err(TabletError::RowsetWrite(format!(
                    "rejected row {}",
                    inner.rows.len()
                )));
            }
        }
        inner.rows.push(row.to_datums());
        Ok(())
    }

    fn seal(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.seal_count > 0 {
            return Err(TabletError::RowsetWrite("rowset sealed twice".into()));
        }
        if inner.fail_seal {
            return Err(TabletError::RowsetWrite("rejected seal".into()));
        }
        inner.seal_count += 1;
        Ok(())
    }
}
