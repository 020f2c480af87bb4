//! Error types for tabletmem
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TabletError
pub type Result<T> = std::result::Result<T, TabletError>;

/// Unified error type for memtable operations
#[derive(Debug, Error)]
pub enum TabletError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Schema / Input Errors
    // -------------------------------------------------------------------------
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Cannot decode column {column}: {reason}")]
    Decode { column: usize, reason: String },

    // -------------------------------------------------------------------------
    // Memory Errors
    // -------------------------------------------------------------------------
    #[error("Memory limit exceeded: consumption {consumption} bytes, limit {limit} bytes")]
    MemLimitExceeded { consumption: u64, limit: u64 },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Cannot {op} a memtable in state {state}")]
    InvalidState { op: &'static str, state: String },

    // -------------------------------------------------------------------------
    // Rowset Errors
    // -------------------------------------------------------------------------
    #[error("Rowset write failed: {0}")]
    RowsetWrite(String),

    #[error("Rowset corruption detected: {0}")]
    RowsetCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TabletError {
    fn from(e: bincode::Error) -> Self {
        TabletError::Serialization(e.to_string())
    }
}
