//! FDD→FSD mapping configuration and the section remapper.
//!
//! The mapping file is JSON keyed by output (FSD) section name:
//!
//! ```json
//! {
//!   "Overview": { "from_udd_sections": ["1", "2"] },
//!   "Interfaces": { "from_udd_sections": ["5"] }
//! }
//! ```
//!
//! Key order is significant: it becomes the order of the merged payload and,
//! downstream, the order sections appear in the generated document.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use fsdgen_shared::{FsdGenError, Result};

use crate::splitter::{BODY_SEPARATOR, SectionId, SectionMap};

// ---------------------------------------------------------------------------
// MappingConfig
// ---------------------------------------------------------------------------

/// Wire shape of one mapping entry. Sibling fields are ignored.
#[derive(Debug, Deserialize)]
struct RawMappingEntry {
    from_udd_sections: Vec<String>,
}

/// Source sections feeding one output section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Source section numbers, in merge order. Repeats are kept.
    pub from_udd_sections: Vec<SectionId>,
}

/// Validated, immutable mapping from output section name to its sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingConfig {
    entries: IndexMap<String, MappingEntry>,
}

impl MappingConfig {
    /// Load and validate a mapping file.
    ///
    /// Any failure here is a startup error; callers must not go on to serve
    /// requests without a mapping.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FsdGenError::mapping(path, format!("cannot read mapping file: {e}")))?;

        let config = Self::parse(&content, path)?;
        info!(output_sections = config.len(), "mapping config loaded");
        Ok(config)
    }

    /// Build a mapping from an in-memory JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::parse(json, Path::new("<inline>"))
    }

    fn parse(json: &str, path: &Path) -> Result<Self> {
        let raw: IndexMap<String, RawMappingEntry> = serde_json::from_str(json)
            .map_err(|e| FsdGenError::mapping(path, format!("malformed mapping: {e}")))?;

        let mut entries = IndexMap::with_capacity(raw.len());
        for (name, entry) in raw {
            let ids = entry
                .from_udd_sections
                .iter()
                .map(|raw_id| {
                    SectionId::from_digits(raw_id).ok_or_else(|| {
                        FsdGenError::mapping(
                            path,
                            format!("section '{name}': identifier '{raw_id}' is not numeric"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            entries.insert(
                name,
                MappingEntry {
                    from_udd_sections: ids,
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn get(&self, output_section: &str) -> Option<&MappingEntry> {
        self.entries.get(output_section)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Output section names in configured order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// MergedPayload
// ---------------------------------------------------------------------------

/// Merged source text for one output section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPayload {
    pub content: String,
}

/// Merged payload per output section, in mapping order.
///
/// Serializes as `{ "<section>": { "content": "..." } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergedPayload {
    sections: IndexMap<String, SectionPayload>,
}

impl MergedPayload {
    pub fn get(&self, output_section: &str) -> Option<&SectionPayload> {
        self.sections.get(output_section)
    }

    /// Merged content of a section, if the section is configured.
    pub fn content(&self, output_section: &str) -> Option<&str> {
        self.sections.get(output_section).map(|p| p.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionPayload)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A configured source section that was not present in the parsed FDD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingMiss {
    pub output_section: String,
    pub source_id: SectionId,
}

/// Remap result with the misses that [`remap`] drops silently.
#[derive(Debug, Clone, Default)]
pub struct RemapOutcome {
    pub payload: MergedPayload,
    pub misses: Vec<MappingMiss>,
}

impl RemapOutcome {
    /// True when every configured source section was found.
    pub fn is_complete(&self) -> bool {
        self.misses.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Remapper
// ---------------------------------------------------------------------------

/// Merge source section bodies into one payload per configured output section.
///
/// Every configured section is present in the result, possibly with empty
/// content. Absent source sections are skipped without any signal in the
/// return value; use [`remap_with_report`] to see them.
pub fn remap(sections: &SectionMap, config: &MappingConfig) -> MergedPayload {
    remap_with_report(sections, config).payload
}

/// Like [`remap`], but also reports each configured source section that was missing.
pub fn remap_with_report(sections: &SectionMap, config: &MappingConfig) -> RemapOutcome {
    let mut payload = IndexMap::with_capacity(config.len());
    let mut misses = Vec::new();

    for (name, entry) in config.iter() {
        let mut merged = String::new();

        for source_id in &entry.from_udd_sections {
            match sections.body(source_id) {
                Some(body) => {
                    merged.push_str(body);
                    merged.push_str(BODY_SEPARATOR);
                }
                None => {
                    debug!(output_section = name, %source_id, "mapped source section not in FDD");
                    misses.push(MappingMiss {
                        output_section: name.to_string(),
                        source_id: source_id.clone(),
                    });
                }
            }
        }

        payload.insert(
            name.to_string(),
            SectionPayload {
                content: merged.trim().to_string(),
            },
        );
    }

    debug!(
        output_sections = payload.len(),
        misses = misses.len(),
        "remapped FDD sections"
    );

    RemapOutcome {
        payload: MergedPayload { sections: payload },
        misses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::split;

    fn mapping(json: &str) -> MappingConfig {
        MappingConfig::from_json_str(json).unwrap()
    }

    #[test]
    fn merges_listed_sections_in_order() {
        let sections = split("SECTION: 1. PurposeDo X.\n\nSECTION: 2. ScopeDo Y.");
        let config = mapping(r#"{"Intro": {"from_udd_sections": ["1", "2"]}}"#);

        let payload = remap(&sections, &config);
        assert_eq!(payload.content("Intro"), Some("PurposeDo X.\n\nScopeDo Y."));

        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"Intro":{"content":"PurposeDo X.\n\nScopeDo Y."}}"#);
    }

    #[test]
    fn listed_order_wins_over_source_order() {
        let sections = split("SECTION: 1. A\nSECTION: 2. B");
        let config = mapping(r#"{"Reversed": {"from_udd_sections": ["2", "1"]}}"#);
        assert_eq!(remap(&sections, &config).content("Reversed"), Some("B\n\nA"));
    }

    #[test]
    fn output_order_follows_config_not_source() {
        let sections = split("SECTION: 3. c\nSECTION: 1. a\nSECTION: 2. b");
        let config = mapping(
            r#"{
                "Zeta": {"from_udd_sections": ["1"]},
                "Alpha": {"from_udd_sections": ["3"]},
                "Mid": {"from_udd_sections": ["2"]}
            }"#,
        );

        let payload = remap(&sections, &config);
        assert_eq!(payload.section_names().collect::<Vec<_>>(), ["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn empty_input_maps_every_key_to_empty_content() {
        let sections = split("");
        let config = mapping(
            r#"{"A": {"from_udd_sections": ["1"]}, "B": {"from_udd_sections": []}}"#,
        );

        let payload = remap(&sections, &config);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.content("A"), Some(""));
        assert_eq!(payload.content("B"), Some(""));

        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"A":{"content":""},"B":{"content":""}}"#);
    }

    #[test]
    fn missing_identifiers_are_skipped_and_reported() {
        let sections = split("SECTION: 1. one\nSECTION: 3. three");
        let config = mapping(r#"{"Mixed": {"from_udd_sections": ["1", "2", "3"]}}"#);

        let outcome = remap_with_report(&sections, &config);
        assert_eq!(outcome.payload.content("Mixed"), Some("one\n\nthree"));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.misses.len(), 1);
        assert_eq!(outcome.misses[0].output_section, "Mixed");
        assert_eq!(outcome.misses[0].source_id.as_str(), "2");
    }

    #[test]
    fn repeated_identifier_is_not_deduplicated() {
        let sections = split("SECTION: 1. twice");
        let config = mapping(r#"{"Echo": {"from_udd_sections": ["1", "1"]}}"#);
        assert_eq!(remap(&sections, &config).content("Echo"), Some("twice\n\ntwice"));
    }

    #[test]
    fn empty_leading_body_does_not_leave_separator() {
        let sections = split("SECTION: 1.\nSECTION: 2. two");
        let config = mapping(r#"{"S": {"from_udd_sections": ["1", "2"]}}"#);
        assert_eq!(remap(&sections, &config).content("S"), Some("two"));
    }

    #[test]
    fn key_set_equals_config_key_set() {
        let config = mapping(
            r#"{"A": {"from_udd_sections": ["9"]}, "B": {"from_udd_sections": ["1"]}, "C": {"from_udd_sections": []}}"#,
        );
        for text in ["", "SECTION: 1. x", "no headings", "SECTION: 9. y SECTION: 1. z"] {
            let payload = remap(&split(text), &config);
            assert_eq!(
                payload.section_names().collect::<Vec<_>>(),
                config.section_names().collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn mapping_ids_with_leading_zeros_match() {
        let sections = split("SECTION: 4. four");
        let config = mapping(r#"{"S": {"from_udd_sections": ["04"]}}"#);
        assert_eq!(remap(&sections, &config).content("S"), Some("four"));
    }

    #[test]
    fn extra_entry_fields_are_ignored() {
        let config = mapping(
            r#"{"S": {"from_udd_sections": ["1"], "description": "ignored", "required": true}}"#,
        );
        assert_eq!(config.get("S").unwrap().from_udd_sections.len(), 1);
    }

    #[test]
    fn malformed_mapping_is_a_mapping_load_error() {
        let cases = [
            "not json",
            r#"["1", "2"]"#,
            r#"{"S": {"sections": ["1"]}}"#,
            r#"{"S": {"from_udd_sections": "1"}}"#,
            r#"{"S": {"from_udd_sections": [1]}}"#,
            r#"{"S": {"from_udd_sections": ["Purpose"]}}"#,
        ];

        for json in cases {
            let err = MappingConfig::from_json_str(json).unwrap_err();
            assert!(
                matches!(err, FsdGenError::MappingLoad { .. }),
                "expected MappingLoad for {json}, got {err}"
            );
        }
    }

    #[test]
    fn load_missing_file_fails() {
        let path = std::env::temp_dir().join(format!("fsdgen-missing-{}.json", uuid::Uuid::now_v7()));
        let err = MappingConfig::load(&path).unwrap_err();
        assert!(err.is_startup_fatal());
    }

    #[test]
    fn load_fixture_mapping() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/mapping/mapping.json");
        let config = MappingConfig::load(&path).unwrap();
        assert_eq!(
            config.section_names().collect::<Vec<_>>(),
            [
                "Overview",
                "Business Requirements",
                "Functional Design",
                "Interfaces",
                "Error Handling",
                "Assumptions and Open Points",
            ]
        );
        assert_eq!(
            config.get("Functional Design").unwrap().from_udd_sections.len(),
            2
        );
    }
}
