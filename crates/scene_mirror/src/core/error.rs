//! Synchronization errors
//!
//! Per-operation failures of the trackers and the material resolver. Host and
//! renderer errors pass through unchanged; everything here is recoverable and
//! ends up as a log line at the operation boundary.

use thiserror::Error;

use crate::host::HostError;
use crate::render::RenderError;

/// Failure of one synchronization step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// A host query failed (object gone, attribute missing, not ready)
    #[error("host query failed: {0}")]
    Host(#[from] HostError),

    /// The renderer rejected a call
    #[error("renderer call failed: {0}")]
    Render(#[from] RenderError),

    /// Valid host input the mirror does not support
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Input the mirror deliberately ignores
    #[error("skipped: {0}")]
    Skipped(String),
}

impl SyncError {
    /// Log the error at the level matching its class
    pub fn log(&self, operation: &str) {
        match self {
            SyncError::Skipped(_) => log::debug!("{}: {}", operation, self),
            _ => log::warn!("{}: {}", operation, self),
        }
    }
}

/// Result type for synchronization steps
pub type SyncResult<T> = Result<T, SyncError>;
