//! End-to-end `generate` pipeline: FDD → sections → payload → FSD document.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use fsdgen_parser::{BibleTemplate, FddParser, MappingMiss, RawDocument};
use fsdgen_shared::{DocumentMeta, FailurePolicy, FsdGenError, JobId, Result};

use crate::jobs::{JobRecord, JobStatus, JobStore};
use crate::llm::TextGenerator;
use crate::render::{DocumentRenderer, MarkdownRenderer, write_document};
use crate::writer::{ContentWriter, GenerationProgress, resolve_outcomes};

/// Title used when none is configured.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Functional Specification";

/// Output settings for one generation run.
#[derive(Clone)]
pub struct GenerateConfig {
    /// Directory the document is written to.
    pub output_dir: PathBuf,
    /// Top-level document heading.
    pub document_title: String,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub on_section_failure: FailurePolicy,
}

impl GenerateConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            renderer: Arc::new(MarkdownRenderer),
            on_section_failure: FailurePolicy::default(),
        }
    }
}

/// Result of the `generate` pipeline.
#[derive(Debug)]
pub struct GenerateResult {
    pub document: DocumentMeta,
    /// Mapped FDD sections that were absent from the input.
    pub misses: Vec<MappingMiss>,
    /// Output sections whose generation failed.
    pub failed_sections: Vec<String>,
    pub elapsed: Duration,
}

/// Output file stem for a job: `Functional_Spec_<job_id>`.
pub fn default_file_stem(job_id: &JobId) -> String {
    format!("Functional_Spec_{job_id}")
}

/// Run the full pipeline for one document.
///
/// 1. Split and remap the FDD
/// 2. Generate each output section
/// 3. Resolve failures per policy
/// 4. Render and write the document
#[instrument(skip_all, fields(file_stem = %file_stem))]
pub async fn generate_fsd(
    raw: &RawDocument,
    parser: &FddParser,
    template: &BibleTemplate,
    generator: Arc<dyn TextGenerator>,
    config: &GenerateConfig,
    file_stem: &str,
    progress: &dyn GenerationProgress,
) -> Result<GenerateResult> {
    let start = Instant::now();

    // --- Phase 1: Parse ---
    progress.phase("Parsing FDD");
    if raw.is_empty() {
        warn!("FDD is empty, every section will be generated from guidance only");
    }
    let outcome = parser.extract(raw);
    for miss in &outcome.misses {
        warn!(
            output_section = %miss.output_section,
            source_id = %miss.source_id,
            "mapped FDD section not found"
        );
    }

    // --- Phase 2: Generate ---
    progress.phase("Generating sections");
    let writer = ContentWriter::new(generator);
    let outcomes = writer.run(&outcome.payload, template, progress).await;
    let failed_sections: Vec<String> = outcomes
        .iter()
        .filter(|o| o.is_failed())
        .map(|o| o.section_name.clone())
        .collect();

    let sections = resolve_outcomes(outcomes, config.on_section_failure)?;

    // --- Phase 3: Render ---
    progress.phase("Writing document");
    let document = write_document(
        &config.output_dir,
        file_stem,
        config.renderer.as_ref(),
        &config.document_title,
        &sections,
    )?;

    let elapsed = start.elapsed();
    info!(
        path = %document.path.display(),
        sections = document.section_count,
        failed = failed_sections.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "generate pipeline complete"
    );

    Ok(GenerateResult {
        document,
        misses: outcome.misses,
        failed_sections,
        elapsed,
    })
}

// ---------------------------------------------------------------------------
// Generation: shared, read-only pipeline inputs
// ---------------------------------------------------------------------------

/// Everything a run needs besides the document itself.
///
/// Shared read-only across concurrent jobs.
#[derive(Clone)]
pub struct Generation {
    pub parser: FddParser,
    pub template: Arc<BibleTemplate>,
    pub generator: Arc<dyn TextGenerator>,
    pub config: GenerateConfig,
}

impl Generation {
    pub async fn run(
        &self,
        raw: &RawDocument,
        file_stem: &str,
        progress: &dyn GenerationProgress,
    ) -> Result<GenerateResult> {
        generate_fsd(
            raw,
            &self.parser,
            &self.template,
            Arc::clone(&self.generator),
            &self.config,
            file_stem,
            progress,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

/// Runs generations as background tasks and tracks them in a [`JobStore`].
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    generation: Arc<Generation>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, generation: Arc<Generation>) -> Self {
        Self { store, generation }
    }

    /// Register a job and start it on the tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn submit(&self, raw: RawDocument, progress: Arc<dyn GenerationProgress>) -> JobId {
        let job_id = JobId::new();
        self.store.insert(job_id);
        self.store.evict_expired();

        let store = Arc::clone(&self.store);
        let generation = Arc::clone(&self.generation);

        tokio::spawn(async move {
            let stem = default_file_stem(&job_id);
            let status = match generation.run(&raw, &stem, progress.as_ref()).await {
                Ok(result) => JobStatus::Done {
                    file_path: result.document.path,
                },
                Err(e) => {
                    warn!(%job_id, error = %e, "generation job failed");
                    JobStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            if let Err(e) = store.set_status(&job_id, status) {
                warn!(%job_id, error = %e, "job finished after its record was evicted");
            }
        });

        info!(%job_id, "job submitted");
        job_id
    }

    pub fn status(&self, job_id: &JobId) -> Option<JobRecord> {
        self.store.get(job_id)
    }

    /// Poll until the job finishes.
    pub async fn wait(&self, job_id: &JobId, poll: Duration) -> Result<JobRecord> {
        loop {
            match self.store.get(job_id) {
                Some(record) if record.status.is_finished() => return Ok(record),
                Some(_) => tokio::time::sleep(poll).await,
                None => return Err(FsdGenError::Job(format!("unknown job {job_id}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::jobs::InMemoryJobStore;
    use crate::llm::test_support::ScriptedGenerator;
    use crate::writer::SilentProgress;
    use fsdgen_parser::{MappingConfig, SectionSplitter};
    use fsdgen_shared::ParserConfig;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name)
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("fsdgen-pipeline-test-{}", uuid::Uuid::now_v7()))
    }

    fn generation(generator: ScriptedGenerator, output_dir: &Path, policy: FailurePolicy) -> Generation {
        let mapping = MappingConfig::load(&fixture("mapping/mapping.json")).unwrap();
        let template = BibleTemplate::load(&fixture("templates/bible.md")).unwrap();
        Generation {
            parser: FddParser::from_config(&ParserConfig::default(), Arc::new(mapping)).unwrap(),
            template: Arc::new(template),
            generator: Arc::new(generator),
            config: GenerateConfig {
                on_section_failure: policy,
                ..GenerateConfig::new(output_dir)
            },
        }
    }

    fn sample() -> RawDocument {
        RawDocument::from_path(&fixture("fdd/sample-fdd.json")).unwrap()
    }

    #[test]
    fn file_stem_uses_job_id() {
        let id: JobId = "01890a5d-ac96-774b-bcce-b302099a8057".parse().unwrap();
        assert_eq!(
            default_file_stem(&id),
            "Functional_Spec_01890a5d-ac96-774b-bcce-b302099a8057"
        );
    }

    #[tokio::test]
    async fn generates_document_in_mapping_order() {
        let out = temp_dir();
        let generation = generation(ScriptedGenerator::default(), &out, FailurePolicy::Placeholder);

        let result = generation.run(&sample(), "spec", &SilentProgress).await.unwrap();

        assert_eq!(result.document.path, out.join("spec.md"));
        assert_eq!(result.document.section_count, 6);
        assert_eq!(result.misses.len(), 1);
        assert!(result.failed_sections.is_empty());

        let doc = std::fs::read_to_string(&result.document.path).unwrap();
        assert!(doc.starts_with("# Functional Specification\n\n## Overview\n\nGenerated body for Overview."));
        let overview = doc.find("## Overview").unwrap();
        let interfaces = doc.find("## Interfaces").unwrap();
        let open_points = doc.find("## Assumptions and Open Points").unwrap();
        assert!(overview < interfaces && interfaces < open_points);

        let _ = std::fs::remove_dir_all(&out);
    }

    #[tokio::test]
    async fn placeholder_policy_keeps_going() {
        let out = temp_dir();
        let generation = generation(
            ScriptedGenerator::failing_on(&["Interfaces"]),
            &out,
            FailurePolicy::Placeholder,
        );

        let result = generation.run(&sample(), "spec", &SilentProgress).await.unwrap();
        assert_eq!(result.failed_sections, ["Interfaces"]);

        let doc = std::fs::read_to_string(&result.document.path).unwrap();
        assert!(doc.contains("## Interfaces\n\n[ERROR generating section 'Interfaces': "));
        assert!(doc.contains("Generated body for Error Handling."));

        let _ = std::fs::remove_dir_all(&out);
    }

    #[tokio::test]
    async fn abort_policy_writes_nothing() {
        let out = temp_dir();
        let generation = generation(
            ScriptedGenerator::failing_on(&["Overview"]),
            &out,
            FailurePolicy::Abort,
        );

        let err = generation.run(&sample(), "spec", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, FsdGenError::Generation(_)));
        assert!(!out.join("spec.md").exists());
    }

    #[tokio::test]
    async fn empty_document_still_renders_every_section() {
        let out = temp_dir();
        let mapping =
            MappingConfig::from_json_str(r#"{"Only": {"from_udd_sections": ["1"]}}"#).unwrap();
        let generation = Generation {
            parser: FddParser::new(SectionSplitter::default(), Arc::new(mapping)),
            template: Arc::new(BibleTemplate::default()),
            generator: Arc::new(ScriptedGenerator::default()),
            config: GenerateConfig::new(&out),
        };

        let result = generation
            .run(&RawDocument::default(), "empty", &SilentProgress)
            .await
            .unwrap();
        assert_eq!(result.document.section_count, 1);
        assert_eq!(result.misses.len(), 1);

        let _ = std::fs::remove_dir_all(&out);
    }

    #[tokio::test]
    async fn job_runner_records_done_status() {
        let out = temp_dir();
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::default());
        let runner = JobRunner::new(
            Arc::clone(&store),
            Arc::new(generation(ScriptedGenerator::default(), &out, FailurePolicy::Placeholder)),
        );

        let job_id = runner.submit(sample(), Arc::new(SilentProgress));
        assert!(runner.status(&job_id).is_some());

        let record = runner.wait(&job_id, Duration::from_millis(10)).await.unwrap();
        let expected = out.join(format!("{}.md", default_file_stem(&job_id)));
        assert_eq!(record.status, JobStatus::Done { file_path: expected.clone() });
        assert!(expected.exists());

        let _ = std::fs::remove_dir_all(&out);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_jobs_share_one_generation() {
        let out = temp_dir();
        let runner = JobRunner::new(
            Arc::new(InMemoryJobStore::default()),
            Arc::new(generation(ScriptedGenerator::default(), &out, FailurePolicy::Placeholder)),
        );

        let first = runner.submit(sample(), Arc::new(SilentProgress));
        let second = runner.submit(sample(), Arc::new(SilentProgress));
        assert_ne!(first, second);

        let poll = Duration::from_millis(10);
        let (a, b) = tokio::join!(runner.wait(&first, poll), runner.wait(&second, poll));

        let mut paths = Vec::new();
        for record in [a.unwrap(), b.unwrap()] {
            match record.status {
                JobStatus::Done { file_path } => {
                    let doc = std::fs::read_to_string(&file_path).unwrap();
                    assert!(doc.contains("## Assumptions and Open Points"));
                    paths.push(file_path);
                }
                other => panic!("expected done, got {other:?}"),
            }
        }
        assert_ne!(paths[0], paths[1]);
        assert_eq!(paths[0], out.join(format!("{}.md", default_file_stem(&first))));
        assert_eq!(paths[1], out.join(format!("{}.md", default_file_stem(&second))));

        let _ = std::fs::remove_dir_all(&out);
    }

    #[tokio::test]
    async fn job_runner_records_failure() {
        let out = temp_dir();
        let runner = JobRunner::new(
            Arc::new(InMemoryJobStore::default()),
            Arc::new(generation(
                ScriptedGenerator::failing_on(&["Overview"]),
                &out,
                FailurePolicy::Abort,
            )),
        );

        let job_id = runner.submit(sample(), Arc::new(SilentProgress));
        let record = runner.wait(&job_id, Duration::from_millis(10)).await.unwrap();
        match record.status {
            JobStatus::Failed { error } => assert!(error.contains("Overview")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_on_unknown_job_errors() {
        let out = temp_dir();
        let runner = JobRunner::new(
            Arc::new(InMemoryJobStore::default()),
            Arc::new(generation(ScriptedGenerator::default(), &out, FailurePolicy::Placeholder)),
        );
        assert!(runner.wait(&JobId::new(), Duration::from_millis(1)).await.is_err());
    }
}
