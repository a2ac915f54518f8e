//! Per-section content writer.
//!
//! For each merged payload entry, builds a prompt from the section's bible
//! guidance and payload, asks the [`TextGenerator`] for the section body, and
//! records the result as an explicit success or failure.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use fsdgen_parser::{BibleTemplate, MergedPayload, SectionPayload};
use fsdgen_shared::{FailurePolicy, FsdGenError, GeneratedSection, Result};

use crate::llm::TextGenerator;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of generating one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionResult {
    Generated(String),
    Failed(String),
}

/// One output section and how its generation went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOutcome {
    pub section_name: String,
    pub result: SectionResult,
}

impl SectionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.result, SectionResult::Failed(_))
    }
}

/// Turn outcomes into renderable sections according to `policy`.
///
/// With [`FailurePolicy::Abort`] the first failure is returned as an error.
pub fn resolve_outcomes(
    outcomes: Vec<SectionOutcome>,
    policy: FailurePolicy,
) -> Result<Vec<GeneratedSection>> {
    outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            SectionResult::Generated(content) => Ok(GeneratedSection {
                section_name: outcome.section_name,
                content,
            }),
            SectionResult::Failed(error) => match policy {
                FailurePolicy::Placeholder => Ok(GeneratedSection {
                    content: format!(
                        "[ERROR generating section '{}': {error}]",
                        outcome.section_name
                    ),
                    section_name: outcome.section_name,
                }),
                FailurePolicy::Abort => Err(FsdGenError::Generation(format!(
                    "section '{}' failed: {error}",
                    outcome.section_name
                ))),
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Render the generation prompt for one output section.
pub fn build_prompt(section_name: &str, bible: &str, payload: &SectionPayload) -> String {
    let payload_json = serde_json::to_string_pretty(payload).unwrap_or_default();

    format!(
        "You are an expert SAP ABAP solution design writer.\n\
         \n\
         SECTION: {section_name}\n\
         \n\
         BIBLE (Authoritative Guidance):\n\
         {bible}\n\
         \n\
         PAYLOAD:\n\
         {payload_json}\n\
         \n\
         INSTRUCTIONS:\n\
         - Follow the BIBLE strictly.\n\
         - Use ONLY the payload fields.\n\
         - Do NOT invent details.\n\
         - Do NOT hallucinate.\n\
         - Return ONLY the section body without headings.\n"
    )
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for generation runs.
pub trait GenerationProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each section is generated.
    fn section_started(&self, section_name: &str, current: usize, total: usize);
}

/// No-op generation progress.
pub struct SilentProgress;

impl GenerationProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn section_started(&self, _section_name: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Drives one generation call per output section.
#[derive(Clone)]
pub struct ContentWriter {
    generator: Arc<dyn TextGenerator>,
}

impl ContentWriter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate every section of `payload`, in payload order.
    ///
    /// Never fails as a whole: a section that cannot be generated is reported
    /// as [`SectionResult::Failed`] and the run continues.
    #[instrument(skip_all, fields(model = %self.generator.model_name(), sections = payload.len()))]
    pub async fn run(
        &self,
        payload: &MergedPayload,
        template: &BibleTemplate,
        progress: &dyn GenerationProgress,
    ) -> Vec<SectionOutcome> {
        for title in template.titles() {
            if payload.get(title).is_none() {
                warn!(section = title, "bible section has no mapping entry, skipping");
            }
        }

        let total = payload.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, (section_name, section_payload)) in payload.iter().enumerate() {
            progress.section_started(section_name, i + 1, total);

            let bible = template.get(section_name).unwrap_or_else(|| {
                warn!(section = section_name, "no bible guidance for section");
                ""
            });

            outcomes.push(self.generate_section(section_name, bible, section_payload).await);
        }

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        info!(generated = total - failed, failed, "section generation complete");

        outcomes
    }

    /// Generate a single section.
    pub async fn generate_section(
        &self,
        section_name: &str,
        bible: &str,
        payload: &SectionPayload,
    ) -> SectionOutcome {
        info!(section = section_name, "generating section");

        let prompt = build_prompt(section_name, bible, payload);
        let result = match self.generator.generate(&prompt).await {
            Ok(text) => SectionResult::Generated(text),
            Err(e) => {
                warn!(section = section_name, error = %e, "section generation failed");
                SectionResult::Failed(e.to_string())
            }
        };

        SectionOutcome {
            section_name: section_name.to_string(),
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{ScriptedGenerator, section_of};
    use fsdgen_parser::{MappingConfig, remap, split};

    fn payload() -> MergedPayload {
        let sections = split("SECTION: 1. Purpose text\nSECTION: 2. Interface text");
        let mapping = MappingConfig::from_json_str(
            r#"{"Overview": {"from_udd_sections": ["1"]},
                "Interfaces": {"from_udd_sections": ["2"]},
                "Open Points": {"from_udd_sections": ["3"]}}"#,
        )
        .unwrap();
        remap(&sections, &mapping)
    }

    fn template() -> BibleTemplate {
        BibleTemplate::parse("# Overview\nBe brief.\n# Interfaces\nList each one.\n# Glossary\nTerms.")
    }

    #[test]
    fn prompt_contains_bible_and_payload_json() {
        let prompt = build_prompt(
            "Overview",
            "Be brief.",
            &SectionPayload {
                content: "Line \"one\"\nLine two".into(),
            },
        );

        assert!(prompt.starts_with("You are an expert SAP ABAP solution design writer."));
        assert_eq!(section_of(&prompt), "Overview");
        assert!(prompt.contains("BIBLE (Authoritative Guidance):\nBe brief.\n"));
        assert!(prompt.contains("PAYLOAD:\n{\n  \"content\": \"Line \\\"one\\\"\\nLine two\"\n}"));
        assert!(prompt.contains("- Return ONLY the section body without headings."));
    }

    #[tokio::test]
    async fn run_follows_payload_order_and_uses_bible() {
        let generator = Arc::new(ScriptedGenerator::default());
        let writer = ContentWriter::new(generator.clone());

        let outcomes = writer.run(&payload(), &template(), &SilentProgress).await;

        let names: Vec<_> = outcomes.iter().map(|o| o.section_name.as_str()).collect();
        assert_eq!(names, ["Overview", "Interfaces", "Open Points"]);
        assert_eq!(
            outcomes[0].result,
            SectionResult::Generated("Generated body for Overview.".into())
        );

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].contains("List each one."));
        assert!(prompts[1].contains("Interface text"));
        // No guidance and no source text, still generated.
        assert!(prompts[2].contains("\"content\": \"\""));
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let writer = ContentWriter::new(Arc::new(ScriptedGenerator::failing_on(&["Interfaces"])));
        let outcomes = writer.run(&payload(), &template(), &SilentProgress).await;

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].is_failed());
        assert!(outcomes[1].is_failed());
        assert!(!outcomes[2].is_failed());
    }

    #[test]
    fn placeholder_policy_inlines_error_marker() {
        let outcomes = vec![
            SectionOutcome {
                section_name: "A".into(),
                result: SectionResult::Generated("ok".into()),
            },
            SectionOutcome {
                section_name: "B".into(),
                result: SectionResult::Failed("timeout".into()),
            },
        ];

        let sections = resolve_outcomes(outcomes, FailurePolicy::Placeholder).unwrap();
        assert_eq!(sections[0].content, "ok");
        assert_eq!(sections[1].section_name, "B");
        assert_eq!(sections[1].content, "[ERROR generating section 'B': timeout]");
    }

    #[test]
    fn abort_policy_returns_first_failure() {
        let outcomes = vec![
            SectionOutcome {
                section_name: "A".into(),
                result: SectionResult::Failed("first".into()),
            },
            SectionOutcome {
                section_name: "B".into(),
                result: SectionResult::Failed("second".into()),
            },
        ];

        let err = resolve_outcomes(outcomes, FailurePolicy::Abort).unwrap_err();
        assert!(err.to_string().contains("section 'A' failed: first"));
    }
}
