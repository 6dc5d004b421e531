//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and transform composition
//! - Generational handle maps
//! - Logging utilities
//! - Internal invariant reporting

pub mod math;
pub mod collections;
pub mod logging;
#[macro_use]
pub mod invariant;
