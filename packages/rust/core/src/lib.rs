//! Core generation pipeline for fsdgen.
//!
//! Ties the parser's section payloads to per-section text generation,
//! document rendering, and background job tracking (`generate`).

pub mod jobs;
pub mod llm;
pub mod pipeline;
pub mod render;
pub mod writer;
