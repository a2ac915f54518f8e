//! FDD section splitting and FDD→FSD remapping.
//!
//! Raw FDD text is split into numbered sections ([`SectionSplitter`]), then
//! merged into one payload per output section according to a static
//! [`MappingConfig`] ([`remap`]). Both steps are pure and never fail on
//! input text; only loading the mapping can fail.

mod mapping;
mod payload;
mod splitter;
mod template;

use std::sync::Arc;

use tracing::{info, instrument};

use fsdgen_shared::{ParserConfig, Result};

pub use mapping::{
    MappingConfig, MappingEntry, MappingMiss, MergedPayload, RemapOutcome, SectionPayload, remap,
    remap_with_report,
};
pub use payload::{FDD_KEY, RawDocument};
pub use splitter::{DEFAULT_HEADING_MARKER, Section, SectionId, SectionMap, SectionSplitter, split};
pub use template::{BibleSection, BibleTemplate};

/// Splitter and shared mapping bundled for per-request use.
///
/// Cheap to clone; the mapping is shared read-only across clones.
#[derive(Debug, Clone)]
pub struct FddParser {
    splitter: SectionSplitter,
    mapping: Arc<MappingConfig>,
}

impl FddParser {
    pub fn new(splitter: SectionSplitter, mapping: Arc<MappingConfig>) -> Self {
        Self { splitter, mapping }
    }

    /// Build from the `[parser]` config section and an already-loaded mapping.
    pub fn from_config(config: &ParserConfig, mapping: Arc<MappingConfig>) -> Result<Self> {
        Ok(Self::new(SectionSplitter::from_config(config)?, mapping))
    }

    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }

    /// Split the document and remap it onto the configured output sections.
    #[instrument(skip_all, fields(fdd_len = document.as_str().len()))]
    pub fn extract(&self, document: &RawDocument) -> RemapOutcome {
        let sections = self.splitter.split(document.as_str());
        let outcome = remap_with_report(&sections, &self.mapping);

        info!(
            fdd_sections = sections.len(),
            fsd_sections = outcome.payload.len(),
            missing = outcome.misses.len(),
            "parsed FDD into section payloads"
        );

        outcome
    }
}
