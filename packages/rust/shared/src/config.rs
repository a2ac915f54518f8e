//! Application configuration for fsdgen.
//!
//! User config lives at `~/.fsdgen/fsdgen.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FsdGenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "fsdgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".fsdgen";

// ---------------------------------------------------------------------------
// Config structs (matching fsdgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input/output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// FDD section splitting.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Text generation service.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-section generation behaviour.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Job bookkeeping.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// FDD→FSD mapping file (JSON).
    #[serde(default = "default_mapping_path")]
    pub mapping: String,

    /// Per-section bible template.
    #[serde(default = "default_template_path")]
    pub template: String,

    /// Directory generated documents are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            mapping: default_mapping_path(),
            template: default_template_path(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_mapping_path() -> String {
    "mapping/mapping.json".into()
}
fn default_template_path() -> String {
    "templates/bible.md".into()
}
fn default_output_dir() -> String {
    ".".into()
}

/// What to do when the same section number appears more than once in an FDD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateSections {
    /// The last occurrence replaces earlier ones.
    #[default]
    KeepLast,
    /// Bodies of every occurrence are joined in order of appearance.
    Concatenate,
}

/// `[parser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Literal token preceding a section number, e.g. `SECTION: 3.`.
    #[serde(default = "default_heading_marker")]
    pub heading_marker: String,

    /// Policy for repeated section numbers.
    #[serde(default)]
    pub duplicate_sections: DuplicateSections,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            heading_marker: default_heading_marker(),
            duplicate_sections: DuplicateSections::default(),
        }
    }
}

fn default_heading_marker() -> String {
    "SECTION:".into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for section generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Parse and validate `base_url`.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            FsdGenError::config(format!("invalid llm.base_url '{}': {e}", self.base_url))
        })
    }

    /// Read the API key from the `api_key_env` variable. Empty counts as unset.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                FsdGenError::config(format!(
                    "LLM API key not found. Set the {} environment variable.",
                    self.api_key_env
                ))
            })
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4.1".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_timeout_secs() -> u64 {
    120
}

/// How a failed section generation is reflected in the output document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Substitute an inline error marker and keep going.
    #[default]
    Placeholder,
    /// Fail the whole document.
    Abort,
}

/// `[generation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Behaviour when a single section fails to generate.
    #[serde(default)]
    pub on_section_failure: FailurePolicy,
}

/// `[jobs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Seconds a job record is retained after its last update.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Upper bound on retained job records.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_jobs: default_max_jobs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}
fn default_max_jobs() -> usize {
    256
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.fsdgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FsdGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.fsdgen/fsdgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FsdGenError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FsdGenError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FsdGenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FsdGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FsdGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    config.llm.api_key().map(|_| ())
}
