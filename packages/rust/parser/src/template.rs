//! Per-section authoring guidance ("bible") templates.
//!
//! A template is plain text where every line starting with `#` opens a
//! section titled by the rest of the line. The lines that follow, up to the
//! next `#` line, are that section's guidance.

use std::path::Path;

use tracing::{debug, instrument};

use fsdgen_shared::{FsdGenError, Result};

/// Guidance for one output section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibleSection {
    pub title: String,
    pub guidance: String,
}

/// Ordered collection of bible sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibleTemplate {
    sections: Vec<BibleSection>,
}

impl BibleTemplate {
    /// Read and parse a template file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FsdGenError::io(path, e))?;
        let template = Self::parse(&content);
        debug!(sections = template.len(), "bible template loaded");
        Ok(template)
    }

    /// Parse template text. Sections with no guidance are dropped, as is any
    /// text before the first heading.
    pub fn parse(text: &str) -> Self {
        let mut sections = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in text.lines() {
            let line = line.trim_end();

            if line.starts_with('#') {
                if let Some((title, lines)) = current.take() {
                    push_section(&mut sections, title, &lines);
                }
                current = Some((line.trim_start_matches('#').trim().to_string(), Vec::new()));
            } else if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }

        if let Some((title, lines)) = current.take() {
            push_section(&mut sections, title, &lines);
        }

        Self { sections }
    }

    /// Guidance for the first section with exactly this title.
    pub fn get(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.guidance.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.title.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BibleSection> {
        self.sections.iter()
    }
}

fn push_section(sections: &mut Vec<BibleSection>, title: String, lines: &[&str]) {
    let guidance = lines.join("\n").trim().to_string();
    if guidance.is_empty() {
        debug!(%title, "skipping bible section without guidance");
        return;
    }
    sections.push(BibleSection { title, guidance });
}
