//! Core domain types shared by the fsdgen crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for generation job identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// GeneratedSection
// ---------------------------------------------------------------------------

/// One finished output section, in the order it should be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSection {
    /// Output (FSD) section name.
    pub section_name: String,
    /// Generated body text, without a heading.
    pub content: String,
}

// ---------------------------------------------------------------------------
// DocumentMeta
// ---------------------------------------------------------------------------

/// Metadata for a rendered document written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Final location of the document.
    pub path: PathBuf,
    /// SHA-256 of the written bytes.
    pub sha256: String,
    /// Size of the written file.
    pub size_bytes: usize,
    /// Number of sections rendered.
    pub section_count: usize,
}
