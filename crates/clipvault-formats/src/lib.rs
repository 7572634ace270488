//! # clipvault-formats
//!
//! Backup dialect support for clipvault: the [`FormatProcessor`] contract,
//! one processor per supported format, and the ordered
//! [`ProcessorRegistry`] that detects which one a restore source belongs to.

pub mod dates;
pub mod formats;
pub mod labels;
pub mod processor;
pub mod registry;
pub mod source;

pub use formats::*;
pub use labels::LabelBook;
pub use processor::{
    ExportOutput, ExportSnapshot, FormatKind, FormatLimits, FormatProcessor, ParsedBackup,
};
pub use registry::{ProcessorMatch, ProcessorRegistry};
pub use source::SourceBuffer;
