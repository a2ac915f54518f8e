//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use fsdgen_core::jobs::{InMemoryJobStore, JobStatus};
use fsdgen_core::llm::OpenAiCompatClient;
use fsdgen_core::pipeline::{GenerateConfig, Generation, JobRunner};
use fsdgen_core::writer::GenerationProgress;
use fsdgen_parser::{BibleTemplate, FddParser, MappingConfig, RawDocument, SectionSplitter};
use fsdgen_shared::{AppConfig, init_config, load_config, validate_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// How often `generate` checks on its job.
const JOB_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// fsdgen: functional design documents in, functional specs out.
#[derive(Parser)]
#[command(
    name = "fsdgen",
    version,
    about = "Generate SAP ABAP functional specifications from functional design documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate an FSD document from an FDD.
    Generate {
        /// FDD input: a `.json` request payload or plain text.
        #[arg(short, long)]
        input: PathBuf,

        /// Mapping file (defaults to `paths.mapping`).
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Bible template (defaults to `paths.template`).
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output directory (defaults to `paths.output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Model override.
        #[arg(long, env = "FSDGEN_MODEL")]
        model: Option<String>,
    },

    /// Print the remapped section payload as JSON, without generating.
    Parse {
        /// FDD input: a `.json` request payload or plain text.
        #[arg(short, long)]
        input: PathBuf,

        /// Mapping file (defaults to `paths.mapping`).
        #[arg(long)]
        mapping: Option<PathBuf>,
    },

    /// List the numbered sections found in an FDD.
    Sections {
        /// FDD input: a `.json` request payload or plain text.
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "fsdgen=info",
        1 => "fsdgen=debug",
        _ => "fsdgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            input,
            mapping,
            template,
            out,
            model,
        } => {
            cmd_generate(
                &input,
                mapping.as_deref(),
                template.as_deref(),
                out.as_deref(),
                model,
            )
            .await
        }
        Command::Parse { input, mapping } => cmd_parse(&input, mapping.as_deref()),
        Command::Sections { input } => cmd_sections(&input),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Load the mapping named on the command line or in config.
///
/// A missing or malformed mapping is fatal. An empty one is valid but
/// produces an empty document.
fn load_mapping(config: &AppConfig, path: Option<&Path>) -> Result<Arc<MappingConfig>> {
    let path = path.map_or_else(|| PathBuf::from(&config.paths.mapping), Path::to_path_buf);
    let mapping = MappingConfig::load(&path)?;
    if mapping.is_empty() {
        warn!(path = %path.display(), "mapping defines no output sections");
    }
    Ok(Arc::new(mapping))
}

async fn cmd_generate(
    input: &Path,
    mapping: Option<&Path>,
    template: Option<&Path>,
    out: Option<&Path>,
    model: Option<String>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(model) = model {
        config.llm.model = model;
    }

    let mapping = load_mapping(&config, mapping)?;
    validate_api_key(&config)?;

    let template_path =
        template.map_or_else(|| PathBuf::from(&config.paths.template), Path::to_path_buf);
    let template = BibleTemplate::load(&template_path)?;
    if template.is_empty() {
        warn!(path = %template_path.display(), "bible template has no sections");
    }

    let output_dir = out.map_or_else(|| PathBuf::from(&config.paths.output_dir), Path::to_path_buf);
    let document = RawDocument::from_path(input)?;

    let generation = Generation {
        parser: FddParser::from_config(&config.parser, mapping)?,
        template: Arc::new(template),
        generator: Arc::new(OpenAiCompatClient::from_config(&config.llm)?),
        config: GenerateConfig {
            on_section_failure: config.generation.on_section_failure,
            ..GenerateConfig::new(output_dir)
        },
    };

    info!(
        input = %input.display(),
        model = %config.llm.model,
        "generating functional spec"
    );

    let progress = Arc::new(CliProgress::new());
    let runner = JobRunner::new(
        Arc::new(InMemoryJobStore::new(&config.jobs)),
        Arc::new(generation),
    );

    let job_id = runner.submit(document, progress.clone());
    let record = runner.wait(&job_id, JOB_POLL_INTERVAL).await?;
    progress.finish();

    match record.status {
        JobStatus::Done { file_path } => {
            let elapsed = record.updated_at - record.created_at;
            println!();
            println!("  Functional spec generated!");
            println!("  Job:   {job_id}");
            println!("  Path:  {}", file_path.display());
            println!(
                "  Time:  {:.1}s",
                elapsed.num_milliseconds() as f64 / 1000.0
            );
            println!();
            Ok(())
        }
        JobStatus::Failed { error } => Err(eyre!("job {job_id} failed: {error}")),
        JobStatus::Pending => Err(eyre!("job {job_id} did not finish")),
    }
}

fn cmd_parse(input: &Path, mapping: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let mapping = load_mapping(&config, mapping)?;
    let parser = FddParser::from_config(&config.parser, mapping)?;

    info!(fsd_sections = parser.mapping().len(), "parsing FDD");
    let outcome = parser.extract(&RawDocument::from_path(input)?);
    for miss in &outcome.misses {
        warn!(
            output_section = %miss.output_section,
            source_id = %miss.source_id,
            "mapped FDD section not found"
        );
    }

    println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
    Ok(())
}

fn cmd_sections(input: &Path) -> Result<()> {
    let config = load_config()?;
    let splitter = SectionSplitter::from_config(&config.parser)?;
    let sections = splitter.split(RawDocument::from_path(input)?.as_str());

    if sections.is_empty() {
        println!("No sections found (marker: '{}').", config.parser.heading_marker);
        return Ok(());
    }

    println!(
        "{} sections (duplicates: {:?})",
        sections.len(),
        splitter.duplicates()
    );
    println!("{:>4}  {:>7}  TITLE", "ID", "CHARS");
    for section in sections.iter() {
        println!(
            "{:>4}  {:>7}  {}",
            section.id,
            section.body.chars().count(),
            section.title.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl GenerationProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn section_started(&self, section_name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Generating [{current}/{total}] {section_name}"));
    }
}
