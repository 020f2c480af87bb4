//! Rowset file writer
//!
//! Persists flushed rows to a new rowset file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};

use crate::error::{Result, TabletError};
use crate::row::RowRef;
use crate::schema::Datum;

use super::{Rowset, RowsetWriter, FRAME_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// `RowsetWriter` that streams rows into a rowset file
pub struct FileRowsetWriter {
    /// Output file path
    path: PathBuf,
    /// `None` once sealed
    writer: Option<BufWriter<File>>,
    /// Number of rows written
    row_count: u64,
    /// Current write position
    current_offset: u64,
    first_key: Option<Vec<Option<Datum>>>,
    last_key: Option<Vec<Option<Datum>>>,
    /// Running CRC over the data block
    data_hasher: crc32fast::Hasher,
    /// Reused frame buffer
    frame: BytesMut,
    /// Metadata, available after `seal`
    rowset: Option<Rowset>,
}

impl FileRowsetWriter {
    /// Create the file and write its header
    ///
    /// The row count in the header is a placeholder until `seal`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // Placeholder for row count

        tracing::debug!("Created rowset file {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            row_count: 0,
            current_offset: HEADER_SIZE,
            first_key: None,
            last_key: None,
            data_hasher: crc32fast::Hasher::new(),
            frame: BytesMut::with_capacity(256),
            rowset: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Metadata of the sealed file, `None` before `seal`
    pub fn rowset(&self) -> Option<&Rowset> {
        self.rowset.as_ref()
    }

    fn sealed_error(&self) -> TabletError {
        TabletError::RowsetWrite(format!("rowset {:?} is already sealed", self.path))
    }
}

impl RowsetWriter for FileRowsetWriter {
    fn add_row(&mut self, row: &RowRef<'_>) -> Result<()> {
        if self.writer.is_none() {
            return Err(self.sealed_error());
        }

        let cells = row.to_datums();
        let payload = bincode::serialize(&cells)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            TabletError::RowsetWrite(format!("row of {} bytes is too large", payload.len()))
        })?;

        // Frame: [row_len(4)][payload]
        self.frame.clear();
        self.frame.reserve(FRAME_HEADER_SIZE + payload.len());
        self.frame.put_u32_le(len);
        self.frame.put_slice(&payload);

        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(&self.frame)?;
        }
        self.data_hasher.update(&self.frame);
        self.current_offset += self.frame.len() as u64;
        self.row_count += 1;

        let key = row.key();
        if self.first_key.is_none() {
            self.first_key = Some(key.clone());
        }
        self.last_key = Some(key);

        Ok(())
    }

    /// Write the footer, patch the row count and sync
    fn seal(&mut self) -> Result<()> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => return Err(self.sealed_error()),
        };

        let data_end = self.current_offset;
        let data_crc = self.data_hasher.clone().finalize();

        // Footer: data_end (8) + data_crc (4) + padding (4)
        writer.write_all(&data_end.to_le_bytes())?;
        writer.write_all(&data_crc.to_le_bytes())?;
        writer.write_all(&[0u8; 4])?;

        writer.flush()?;

        let mut file = writer
            .into_inner()
            .map_err(|e| TabletError::RowsetWrite(format!("Failed to flush rowset: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.row_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        tracing::debug!(
            "Sealed rowset {:?}: {} rows, {} bytes",
            self.path,
            self.row_count,
            file_size
        );

        self.rowset = Some(Rowset {
            path: self.path.clone(),
            row_count: self.row_count,
            first_key: self.first_key.take().unwrap_or_default(),
            last_key: self.last_key.take().unwrap_or_default(),
            file_size,
        });
        Ok(())
    }
}
