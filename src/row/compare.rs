//! Row comparators
//!
//! Total order over row buffers, used by the skip list index.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::arena::Arena;
use crate::schema::Schema;

use super::cell;

/// Orders two row buffers that live in the same arena
pub trait Comparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8], arena: &Arena) -> Ordering;

    fn name(&self) -> &'static str;
}

/// Compares the key columns of two rows, in schema key order
///
/// - Numeric keys use numeric order (floats: IEEE total order)
/// - Varchar keys use lexicographic byte order
/// - Null sorts before every non-null value of the same column
///
/// Rows whose length differs from the schema's row footprint are a
/// contract violation and panic.
#[derive(Debug, Clone)]
pub struct RowComparator {
    schema: Arc<Schema>,
}

impl RowComparator {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }
}

impl Comparator for RowComparator {
    fn compare(&self, a: &[u8], b: &[u8], arena: &Arena) -> Ordering {
        let row_size = self.schema.row_size();
        assert!(
            a.len() == row_size && b.len() == row_size,
            "row comparator: rows of {} and {} bytes do not match the {}-byte schema footprint",
            a.len(),
            b.len(),
            row_size
        );

        for &col in self.schema.key_columns() {
            let ordering = match (
                cell::is_null(&self.schema, a, col),
                cell::is_null(&self.schema, b, col),
            ) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => {
                    let range = cell::slot_range(&self.schema, col);
                    cell::compare_slots(
                        self.schema.column(col).ty,
                        &a[range.clone()],
                        &b[range],
                        arena,
                    )
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn name(&self) -> &'static str {
        "tabletmem.RowComparator"
    }
}
