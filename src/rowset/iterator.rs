//! Rowset Iterator
//!
//! Sequential decoding of the row frames in a rowset data block.

use bytes::{Buf, Bytes};

use crate::error::{Result, TabletError};
use crate::schema::Datum;

use super::FRAME_HEADER_SIZE;

/// Iterator over rowset rows in key order
pub struct RowsetIterator {
    data: Bytes,
    /// Set after a malformed frame; nothing more is yielded
    failed: bool,
}

impl RowsetIterator {
    pub(super) fn new(data: Bytes) -> Self {
        Self {
            data,
            failed: false,
        }
    }
}

impl Iterator for RowsetIterator {
    type Item = Result<Vec<Option<Datum>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.data.has_remaining() {
            return None;
        }

        if self.data.remaining() < FRAME_HEADER_SIZE {
            self.failed = true;
            return Some(Err(TabletError::RowsetCorruption(format!(
                "Truncated row frame header: {} bytes left",
                self.data.remaining()
            ))));
        }

        let len = self.data.get_u32_le() as usize;
        if self.data.remaining() < len {
            self.failed = true;
            return Some(Err(TabletError::RowsetCorruption(format!(
                "Row frame claims {} bytes, {} left",
                len,
                self.data.remaining()
            ))));
        }

        let payload = self.data.split_to(len);
        match bincode::deserialize::<Vec<Option<Datum>>>(&payload) {
            Ok(row) => Some(Ok(row)),
            Err(e) => {
                self.failed = true;
                Some(Err(e.into()))
            }
        }
    }
}
