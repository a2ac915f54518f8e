//! Shared types, error model, and configuration for fsdgen.
//!
//! This crate is the foundation depended on by all other fsdgen crates.
//! It provides:
//! - [`FsdGenError`]: the unified error type
//! - Domain types ([`JobId`], [`GeneratedSection`], [`DocumentMeta`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DuplicateSections, FailurePolicy, GenerationConfig, JobsConfig, LlmConfig,
    ParserConfig, PathsConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{FsdGenError, Result};
pub use types::{DocumentMeta, GeneratedSection, JobId};
