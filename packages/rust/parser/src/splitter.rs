//! FDD section splitter.
//!
//! Recognises headings of the form `<marker> <number>.` (by default
//! `SECTION: 3.`) anywhere in the text and partitions the document into
//! numbered sections. The number is the only lookup key; any title text that
//! follows the heading stays in the body, because titles frequently run into
//! body text with no separator.
//!
//! A marker quoted inside a body is indistinguishable from a real heading and
//! starts a new section. There is no escaping mechanism.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use fsdgen_shared::{DuplicateSections, FsdGenError, Result};

/// Heading marker used when none is configured.
pub const DEFAULT_HEADING_MARKER: &str = "SECTION:";

/// Separator placed between bodies when sections are merged.
pub(crate) const BODY_SEPARATOR: &str = "\n\n";

static DEFAULT_SPLITTER: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(DEFAULT_HEADING_MARKER, DuplicateSections::KeepLast)
        .expect("default heading marker compiles")
});

// ---------------------------------------------------------------------------
// SectionId
// ---------------------------------------------------------------------------

/// Numeric section identifier, stored as its canonical digit string.
///
/// Leading zeros are dropped so `"01"` and `"1"` address the same section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    /// Build an identifier from ASCII digits (surrounding whitespace allowed).
    pub fn from_digits(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let canonical = trimmed.trim_start_matches('0');
        Some(Self(if canonical.is_empty() {
            "0".to_string()
        } else {
            canonical.to_string()
        }))
    }

    /// The canonical digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SectionId {
    type Err = FsdGenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_digits(s)
            .ok_or_else(|| FsdGenError::validation(format!("section id '{s}' is not numeric")))
    }
}

// ---------------------------------------------------------------------------
// Section / SectionMap
// ---------------------------------------------------------------------------

/// One heading occurrence and the text it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Section number from the heading.
    pub id: SectionId,
    /// First non-empty line of the body, for display only. Never used for lookups.
    pub title: Option<String>,
    /// Exact heading text that was matched (e.g. `SECTION: 2.`).
    pub heading: String,
    /// Body with leading/trailing whitespace removed; inner blank lines kept.
    pub body: String,
    /// Untrimmed text between this heading and the next one.
    pub raw_body: String,
    /// Byte offset of the heading in the source text.
    pub offset: usize,
}

/// Parsed sections keyed by number, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SectionMap {
    sections: IndexMap<SectionId, Section>,
}

impl SectionMap {
    /// Look up a section by number.
    pub fn get(&self, id: &SectionId) -> Option<&Section> {
        self.sections.get(id)
    }

    /// Trimmed body of a section, if present.
    pub fn body(&self, id: &SectionId) -> Option<&str> {
        self.sections.get(id).map(|s| s.body.as_str())
    }

    pub fn contains(&self, id: &SectionId) -> bool {
        self.sections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Section numbers in order of first appearance.
    pub fn ids(&self) -> impl Iterator<Item = &SectionId> {
        self.sections.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    fn absorb(&mut self, section: Section, policy: DuplicateSections) {
        let Some(existing) = self.sections.get_mut(&section.id) else {
            self.sections.insert(section.id.clone(), section);
            return;
        };

        warn!(section = %section.id, ?policy, "duplicate section heading");

        match policy {
            DuplicateSections::KeepLast => *existing = section,
            DuplicateSections::Concatenate => {
                if existing.body.is_empty() {
                    existing.body = section.body;
                } else if !section.body.is_empty() {
                    existing.body.push_str(BODY_SEPARATOR);
                    existing.body.push_str(&section.body);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Splitter
// ---------------------------------------------------------------------------

/// Compiled heading matcher plus the duplicate-heading policy.
#[derive(Debug, Clone)]
pub struct SectionSplitter {
    heading_re: Regex,
    duplicates: DuplicateSections,
}

impl SectionSplitter {
    /// Build a splitter for `<marker><whitespace?><digits>.` headings.
    pub fn new(marker: &str, duplicates: DuplicateSections) -> Result<Self> {
        if marker.trim().is_empty() {
            return Err(FsdGenError::config("heading marker must not be empty"));
        }

        // `[0-9]` rather than `\d`, which would also accept non-ASCII digits.
        let pattern = format!(r"{}\s*([0-9]+)\.", regex::escape(marker));
        let heading_re = Regex::new(&pattern)
            .map_err(|e| FsdGenError::config(format!("invalid heading marker '{marker}': {e}")))?;

        Ok(Self {
            heading_re,
            duplicates,
        })
    }

    /// Splitter configured from the `[parser]` config section.
    pub fn from_config(config: &fsdgen_shared::ParserConfig) -> Result<Self> {
        Self::new(&config.heading_marker, config.duplicate_sections)
    }

    pub fn duplicates(&self) -> DuplicateSections {
        self.duplicates
    }

    /// Every heading occurrence in order, duplicates included.
    ///
    /// Text before the first heading has no identifier and is dropped.
    pub fn scan(&self, text: &str) -> Vec<Section> {
        let headings: Vec<(usize, usize, &str)> = self
            .heading_re
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1)?;
                Some((whole.start(), whole.end(), number.as_str()))
            })
            .collect();

        let mut sections = Vec::with_capacity(headings.len());

        for (i, &(start, end, number)) in headings.iter().enumerate() {
            let Some(id) = SectionId::from_digits(number) else {
                continue;
            };
            let body_end = headings.get(i + 1).map_or(text.len(), |next| next.0);
            let raw_body = &text[end..body_end];
            let body = raw_body.trim();

            sections.push(Section {
                id,
                title: best_effort_title(body),
                heading: text[start..end].to_string(),
                body: body.to_string(),
                raw_body: raw_body.to_string(),
                offset: start,
            });
        }

        sections
    }

    /// Partition `text` into a [`SectionMap`].
    ///
    /// Never fails: text with no recognisable heading yields an empty map.
    pub fn split(&self, text: &str) -> SectionMap {
        let mut map = SectionMap::default();
        for section in self.scan(text) {
            map.absorb(section, self.duplicates);
        }

        debug!(sections = map.len(), text_len = text.len(), "split FDD into sections");
        map
    }
}

impl Default for SectionSplitter {
    fn default() -> Self {
        DEFAULT_SPLITTER.clone()
    }
}

/// Split with the default `SECTION:` marker and keep-last duplicate policy.
pub fn split(text: &str) -> SectionMap {
    DEFAULT_SPLITTER.split(text)
}

fn best_effort_title(body: &str) -> Option<String> {
    body.lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
}
