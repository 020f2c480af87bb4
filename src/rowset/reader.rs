//! Rowset Reader
//!
//! Opens a sealed rowset file and verifies it before handing out rows.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::{Buf, Bytes};

use crate::error::{Result, TabletError};
use crate::schema::Datum;

use super::iterator::RowsetIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Verified, fully loaded rowset file
pub struct RowsetReader {
    path: PathBuf,
    /// Data block only: header and footer stripped
    data: Bytes,
    row_count: u64,
}

impl RowsetReader {
    /// Open a rowset file and validate header, footer and data CRC
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        let file_size = contents.len() as u64;

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(TabletError::RowsetCorruption(format!(
                "{:?} is {} bytes, too short for a rowset",
                path, file_size
            )));
        }

        let mut contents = Bytes::from(contents);

        // Header
        let mut header = contents.split_to(HEADER_SIZE as usize);
        if &header[0..4] != MAGIC {
            return Err(TabletError::RowsetCorruption(format!(
                "Invalid rowset magic: expected TBRS, got {:?}",
                &header[0..4]
            )));
        }
        header.advance(4);

        let version = header.get_u16_le();
        if version != VERSION {
            return Err(TabletError::RowsetCorruption(format!(
                "Unsupported rowset version: {}",
                version
            )));
        }
        let row_count = header.get_u64_le();

        // Footer
        let mut footer = contents.split_off(contents.len() - FOOTER_SIZE as usize);
        let data_end = footer.get_u64_le();
        let data_crc = footer.get_u32_le();

        if data_end != file_size - FOOTER_SIZE {
            return Err(TabletError::RowsetCorruption(format!(
                "Data block ends at {} but footer starts at {}",
                data_end,
                file_size - FOOTER_SIZE
            )));
        }

        let actual_crc = crc32fast::hash(&contents);
        if actual_crc != data_crc {
            return Err(TabletError::RowsetCorruption(format!(
                "Data CRC mismatch: expected {:08x}, got {:08x}",
                data_crc, actual_crc
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            data: contents,
            row_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row count recorded in the header
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Rows in the order they were written
    pub fn iter(&self) -> RowsetIterator {
        RowsetIterator::new(self.data.clone())
    }

    /// Decode every row, checking the count against the header
    pub fn read_all(&self) -> Result<Vec<Vec<Option<Datum>>>> {
        let rows = self.iter().collect::<Result<Vec<_>>>()?;
        if rows.len() as u64 != self.row_count {
            return Err(TabletError::RowsetCorruption(format!(
                "Header says {} rows, data block holds {}",
                self.row_count,
                rows.len()
            )));
        }
        Ok(rows)
    }
}
