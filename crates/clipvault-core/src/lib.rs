//! # clipvault-core
//!
//! Core types, traits, and abstractions for clipvault.
//!
//! This crate provides the canonical record model, the backup report, the
//! error taxonomy and the store boundary that the other clipvault crates
//! depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod stats;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use stats::BackupStats;
pub use traits::*;
