//! Chunked arena
//!
//! Bump allocator over a chain of zeroed chunks. Allocations are addressed
//! by `(chunk, offset)` handles, never by pointer, so growing the chain
//! cannot invalidate anything handed out earlier.

use std::sync::Arc;

use super::MemTracker;

/// Location of a fixed-size allocation inside an `Arena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaHandle {
    chunk: u32,
    offset: u32,
}

impl ArenaHandle {
    pub fn chunk(&self) -> u32 {
        self.chunk
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// Location and length of variable-length bytes inside an `Arena`
///
/// Stored inline in row slots as `[chunk: u32][offset: u32][len: u32]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceRef {
    pub chunk: u32,
    pub offset: u32,
    pub len: u32,
}

impl SliceRef {
    pub const ENCODED_SIZE: usize = 12;

    pub fn handle(&self) -> ArenaHandle {
        ArenaHandle {
            chunk: self.chunk,
            offset: self.offset,
        }
    }

    pub fn encode(&self, dst: &mut [u8]) {
        dst[0..4].copy_from_slice(&self.chunk.to_le_bytes());
        dst[4..8].copy_from_slice(&self.offset.to_le_bytes());
        dst[8..12].copy_from_slice(&self.len.to_le_bytes());
    }

    pub fn decode(src: &[u8]) -> Self {
        let mut word = [0u8; 4];
        word.copy_from_slice(&src[0..4]);
        let chunk = u32::from_le_bytes(word);
        word.copy_from_slice(&src[4..8]);
        let offset = u32::from_le_bytes(word);
        word.copy_from_slice(&src[8..12]);
        let len = u32::from_le_bytes(word);
        Self { chunk, offset, len }
    }
}

/// Bulk-owned byte store for one memtable generation
///
/// ## Accounting:
/// - Whole chunks are charged to the tracker when they are created
/// - `charge` accounts for memory held outside chunks (index nodes)
/// - Consumption only grows; everything is released when the arena drops
pub struct Arena {
    chunks: Vec<Vec<u8>>,
    /// Bytes handed out from the last chunk
    used: usize,
    chunk_size: usize,
    consumption: u64,
    tracker: Arc<MemTracker>,
}

impl Arena {
    pub fn new(chunk_size: usize, tracker: Arc<MemTracker>) -> Self {
        Self {
            chunks: Vec::new(),
            used: 0,
            chunk_size: chunk_size.max(1),
            consumption: 0,
            tracker,
        }
    }

    /// Reserve `size` zeroed bytes
    pub fn allocate(&mut self, size: usize) -> ArenaHandle {
        let fits = self
            .chunks
            .last()
            .map(|chunk| chunk.len() - self.used >= size)
            .unwrap_or(false);

        if !fits {
            self.grow(size);
        }

        let handle = ArenaHandle {
            chunk: (self.chunks.len() - 1) as u32,
            offset: self.used as u32,
        };
        self.used += size;
        handle
    }

    /// Copy `bytes` into the arena
    pub fn append(&mut self, bytes: &[u8]) -> SliceRef {
        let handle = self.allocate(bytes.len());
        self.slice_mut(handle, bytes.len()).copy_from_slice(bytes);
        SliceRef {
            chunk: handle.chunk,
            offset: handle.offset,
            len: bytes.len() as u32,
        }
    }

    pub fn slice(&self, handle: ArenaHandle, len: usize) -> &[u8] {
        let start = handle.offset as usize;
        &self.chunks[handle.chunk as usize][start..start + len]
    }

    pub fn slice_mut(&mut self, handle: ArenaHandle, len: usize) -> &mut [u8] {
        let start = handle.offset as usize;
        &mut self.chunks[handle.chunk as usize][start..start + len]
    }

    pub fn bytes(&self, slice: SliceRef) -> &[u8] {
        self.slice(slice.handle(), slice.len as usize)
    }

    /// Account for `bytes` held on behalf of this arena outside its chunks
    pub fn charge(&mut self, bytes: u64) {
        self.consumption += bytes;
        self.tracker.consume(bytes);
    }

    /// Bytes charged to this arena so far
    pub fn consumption(&self) -> u64 {
        self.consumption
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn tracker(&self) -> &Arc<MemTracker> {
        &self.tracker
    }

    fn grow(&mut self, min_size: usize) {
        let size = self.chunk_size.max(min_size);
        self.chunks.push(vec![0u8; size]);
        self.used = 0;
        self.charge(size as u64);
        tracing::debug!(
            "Arena grew to {} chunks ({} bytes charged to '{}')",
            self.chunks.len(),
            self.consumption,
            self.tracker.label()
        );
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.tracker.release(self.consumption);
    }
}
