//! # Core Module
//!
//! Shared configuration and error types for every synchronization subsystem.
//!
//! ## Organization
//!
//! - **Config**: `SyncConfig` and its per-subsystem sections
//! - **Context**: `SyncContext`, the collaborators borrowed for one step
//! - **Error**: `SyncError`, the recoverable failure of one synchronization step

pub mod config;
pub mod context;
pub mod error;

// Re-export foundation for convenience
pub use crate::foundation;

// Re-export commonly used config types
pub use config::{
    SyncConfig,
    MeshConfig,
    LightConfig,
    MaterialConfig,
    CameraConfig,
    LoggingConfig,
    WindingOrder,
    Config,
    ConfigError,
};

pub use context::SyncContext;
pub use error::{SyncError, SyncResult};
