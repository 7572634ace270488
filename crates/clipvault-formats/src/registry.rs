//! Ordered processor registry (the detection chain).
//!
//! Processors are tried in registration order and the first whose `detect`
//! accepts the source wins. The order is part of the contract: specific
//! formats come first and loose ones last, because a file is assumed to
//! belong to exactly one dialect. A matched processor that fails to parse or
//! produces nothing means "nothing to restore"; the chain does not fall
//! through to later processors.

use std::time::Instant;

use chrono::{DateTime, Utc};
use clipvault_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::formats::{
    ClipLogProcessor, ClipboardAppProcessor, LegacyFlatJsonProcessor, LegacyV1Processor,
    NativeProcessor, NotesAppProcessor, SimpleNotesProcessor, StickyNotesProcessor,
};
use crate::processor::{FormatKind, FormatLimits, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

/// Ordered list of format processors.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn FormatProcessor>>,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// The standard chain, most specific format first:
    ///
    /// 1. native (current)
    /// 2. clipboard app lists
    /// 3. simple notes
    /// 4. legacy v1 binary
    /// 5. sticky notes (gzip)
    /// 6. notes app (zip)
    /// 7. clip log text
    /// 8. flat JSON with `clips` (loosest, always last)
    pub fn standard(limits: FormatLimits) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NativeProcessor::new()));
        registry.register(Box::new(ClipboardAppProcessor::new(limits)));
        registry.register(Box::new(SimpleNotesProcessor::new(limits)));
        registry.register(Box::new(LegacyV1Processor::new()));
        registry.register(Box::new(StickyNotesProcessor::new(limits)));
        registry.register(Box::new(NotesAppProcessor::new(limits)));
        registry.register(Box::new(ClipLogProcessor::new()));
        registry.register(Box::new(LegacyFlatJsonProcessor::new()));
        registry
    }

    /// Append a processor to the end of the chain.
    pub fn register(&mut self, processor: Box<dyn FormatProcessor>) {
        self.processors.push(processor);
    }

    /// Formats in chain order.
    pub fn kinds(&self) -> Vec<FormatKind> {
        self.processors.iter().map(|p| p.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// First processor able to write backups.
    pub fn exporter(&self) -> Option<&dyn FormatProcessor> {
        self.processors
            .iter()
            .find(|p| p.supports_export())
            .map(|p| p.as_ref())
    }

    /// Pair `source` with the first processor that recognizes it.
    pub fn detect(&self, source: SourceBuffer) -> Result<ProcessorMatch<'_>> {
        for processor in &self.processors {
            if processor.detect(&source) {
                info!(
                    subsystem = "formats",
                    component = "registry",
                    op = "detect",
                    format = %processor.kind(),
                    source = source.name().unwrap_or("-"),
                    byte_len = source.len(),
                    "Backup format detected"
                );
                return Ok(ProcessorMatch {
                    processor: processor.as_ref(),
                    source,
                });
            }
            debug!(
                subsystem = "formats",
                component = "registry",
                format = %processor.kind(),
                "Format not matched"
            );
        }
        Err(Error::FormatUnrecognized)
    }

    /// Detect and parse in one step.
    pub fn restore(
        &self,
        source: SourceBuffer,
        now: DateTime<Utc>,
    ) -> Result<(FormatKind, ParsedBackup)> {
        let matched = self.detect(source)?;
        let kind = matched.kind();
        Ok((kind, matched.parse(now)))
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::standard(FormatLimits::default())
    }
}

/// A source paired with the processor selected for it. Lives for one restore.
pub struct ProcessorMatch<'a> {
    processor: &'a dyn FormatProcessor,
    source: SourceBuffer,
}

impl<'a> ProcessorMatch<'a> {
    pub fn kind(&self) -> FormatKind {
        self.processor.kind()
    }

    pub fn source(&self) -> &SourceBuffer {
        &self.source
    }

    /// Parse the source with the matched processor.
    ///
    /// A parse error is logged and treated as an empty backup.
    pub fn parse(self, now: DateTime<Utc>) -> ParsedBackup {
        let start = Instant::now();
        let kind = self.processor.kind();
        match self.processor.parse(&self.source, now) {
            Ok(parsed) => {
                debug!(
                    subsystem = "formats",
                    component = "registry",
                    op = "parse",
                    format = %kind,
                    clip_count = parsed.clips.len(),
                    catalog_count = parsed.catalog.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Backup parsed"
                );
                parsed
            }
            Err(e) => {
                warn!(
                    subsystem = "formats",
                    component = "registry",
                    op = "parse",
                    format = %kind,
                    error = %e,
                    "Matched format failed to parse, nothing to restore"
                );
                ParsedBackup::default()
            }
        }
    }
}
