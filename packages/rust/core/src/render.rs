//! Document rendering and output.
//!
//! Renderers turn ordered `(section name, content)` pairs into a document;
//! [`write_document`] puts the result on disk atomically.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use fsdgen_shared::{DocumentMeta, FsdGenError, GeneratedSection, Result};

/// Renders generated sections into a document body.
pub trait DocumentRenderer: Send + Sync {
    /// Render sections in the given order under `title`.
    fn render(&self, title: &str, sections: &[GeneratedSection]) -> String;

    /// File extension for rendered output, without the dot.
    fn extension(&self) -> &'static str;
}

/// Markdown output: `# title`, then one `## section` per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, title: &str, sections: &[GeneratedSection]) -> String {
        let mut blocks = vec![format!("# {title}")];

        for section in sections {
            blocks.push(format!("## {}", section.section_name));
            let content = section.content.trim();
            if !content.is_empty() {
                blocks.push(content.to_string());
            }
        }

        let mut doc = blocks.join("\n\n");
        doc.push('\n');
        doc
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

/// Render and write a document to `<dir>/<file_stem>.<ext>`.
///
/// Writes to a hidden temp file first, then renames into place.
#[instrument(skip_all, fields(dir = %dir.display(), file_stem = %file_stem, sections = sections.len()))]
pub fn write_document(
    dir: &Path,
    file_stem: &str,
    renderer: &dyn DocumentRenderer,
    title: &str,
    sections: &[GeneratedSection],
) -> Result<DocumentMeta> {
    if file_stem.is_empty() || file_stem.contains(['/', '\\']) {
        return Err(FsdGenError::Render(format!("invalid file name '{file_stem}'")));
    }

    std::fs::create_dir_all(dir).map_err(|e| FsdGenError::io(dir, e))?;

    let rendered = renderer.render(title, sections);
    let filename = format!("{file_stem}.{}", renderer.extension());
    let target = dir.join(&filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, &rendered).map_err(|e| FsdGenError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, &target) {
        let _ = std::fs::remove_file(&temp);
        return Err(FsdGenError::io(&target, e));
    }

    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(file = %filename, size = rendered.len(), "wrote document");
    info!(path = %target.display(), "document written");

    Ok(DocumentMeta {
        path: target,
        sha256,
        size_bytes: rendered.len(),
        section_count: sections.len(),
    })
}
