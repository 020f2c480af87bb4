//! Configuration for tabletmem
//!
//! Centralized memtable configuration with sensible defaults.

use crate::error::{Result, TabletError};
use crate::skiplist::MAX_HEIGHT_LIMIT;

/// Per-memtable tuning knobs
#[derive(Debug, Clone)]
pub struct MemTableConfig {
    // -------------------------------------------------------------------------
    // Arena Configuration
    // -------------------------------------------------------------------------
    /// Size of each chunk in the arena chain (in bytes).
    /// Allocations larger than this get a dedicated chunk.
    pub arena_chunk_size: usize,

    /// Optional byte limit for this memtable's own tracker
    pub mem_limit: Option<u64>,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Tallest tower a skip list node may get
    pub skiplist_max_height: usize,

    /// 1-in-N chance of growing a tower by one level
    pub skiplist_branching: u32,

    /// Seed for the tower height generator
    pub skiplist_seed: u64,
}

impl Default for MemTableConfig {
    fn default() -> Self {
        Self {
            arena_chunk_size: 64 * 1024, // 64 KB
            mem_limit: None,
            skiplist_max_height: 12,
            skiplist_branching: 4,
            skiplist_seed: 0xdead_beef,
        }
    }
}

impl MemTableConfig {
    /// Create a new config builder
    pub fn builder() -> MemTableConfigBuilder {
        MemTableConfigBuilder::default()
    }

    /// Reject settings the arena or index cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.arena_chunk_size == 0 {
            return Err(TabletError::Config("arena_chunk_size must be > 0".into()));
        }
        if self.arena_chunk_size > u32::MAX as usize {
            return Err(TabletError::Config(format!(
                "arena_chunk_size {} does not fit a 32-bit offset",
                self.arena_chunk_size
            )));
        }
        if self.skiplist_max_height == 0 || self.skiplist_max_height > MAX_HEIGHT_LIMIT {
            return Err(TabletError::Config(format!(
                "skiplist_max_height must be in 1..={}, got {}",
                MAX_HEIGHT_LIMIT, self.skiplist_max_height
            )));
        }
        if self.skiplist_branching < 2 {
            return Err(TabletError::Config(format!(
                "skiplist_branching must be >= 2, got {}",
                self.skiplist_branching
            )));
        }
        Ok(())
    }
}

/// Builder for MemTableConfig
#[derive(Default)]
pub struct MemTableConfigBuilder {
    config: MemTableConfig,
}

impl MemTableConfigBuilder {
    /// Set the arena chunk size (in bytes)
    pub fn arena_chunk_size(mut self, size: usize) -> Self {
        self.config.arena_chunk_size = size;
        self
    }

    /// Set the byte limit for the memtable's tracker
    pub fn mem_limit(mut self, limit: u64) -> Self {
        self.config.mem_limit = Some(limit);
        self
    }

    /// Set the maximum skip list height
    pub fn skiplist_max_height(mut self, height: usize) -> Self {
        self.config.skiplist_max_height = height;
        self
    }

    /// Set the skip list branching factor
    pub fn skiplist_branching(mut self, branching: u32) -> Self {
        self.config.skiplist_branching = branching;
        self
    }

    /// Set the seed used for tower heights
    pub fn skiplist_seed(mut self, seed: u64) -> Self {
        self.config.skiplist_seed = seed;
        self
    }

    pub fn build(self) -> MemTableConfig {
        self.config
    }
}
