//! Document Converter: notebook → rendered cells → template → Markdown file.
//!
//! Load and template failures abort the conversion of that notebook. Output
//! problems never do; the [`OutputRenderer`] absorbs them per output.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use minijinja::{context, AutoEscape, Environment};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{ConvertError, TemplateError};
use crate::notebook::{notebook_stem, Notebook};
use crate::render::{FragmentKind, OutputRenderer, RenderContext};
use crate::snapshot::SnapshotRenderer;

/// A cell as bound into the template. `outputs` holds one Markdown fragment
/// per source output, in order.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedCell {
    pub cell_type: String,
    pub source: String,
    pub execution_count: Option<i64>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub markdown_path: PathBuf,
    pub cells: usize,
    pub fragments: usize,
    pub unsupported: usize,
    pub snapshots: usize,
}

pub struct MarkdownConverter {
    env: Environment<'static>,
    template_dir: PathBuf,
    renderer: OutputRenderer,
}

impl MarkdownConverter {
    pub fn new(template_dir: impl Into<PathBuf>, snapshots: SnapshotRenderer) -> Self {
        let template_dir = template_dir.into();
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&template_dir));
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        Self {
            env,
            template_dir,
            renderer: OutputRenderer::new(snapshots),
        }
    }

    /// Convert `notebook_path` to Markdown at `output_path` using the named
    /// template from the template directory.
    pub async fn convert(
        &self,
        notebook_path: &Path,
        output_path: &Path,
        template_name: &str,
    ) -> Result<ConversionReport, ConvertError> {
        info!(notebook = %notebook_path.display(), template = template_name, "[CONVERT] Converting notebook");

        let notebook = Notebook::load(notebook_path)?;
        self.ensure_template(template_name)?;

        let markdown_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let assets_dir = assets_dir_for(notebook_path, &markdown_dir);
        if let Err(e) = self.cleanup(&assets_dir) {
            error!(path = %assets_dir.display(), error = %e, "[CONVERT] Failed to remove stale assets");
        }

        let mut report = ConversionReport {
            markdown_path: output_path.to_path_buf(),
            cells: notebook.cells.len(),
            ..Default::default()
        };
        let mut cells = Vec::with_capacity(notebook.cells.len());
        for (cell_index, cell) in notebook.cells.iter().enumerate() {
            let mut outputs = Vec::with_capacity(cell.outputs.len());
            for (output_index, output) in cell.outputs.iter().enumerate() {
                let ctx = RenderContext {
                    markdown_dir: markdown_dir.clone(),
                    assets_dir: assets_dir.clone(),
                    cell_index,
                    output_index,
                };
                let fragment = self.renderer.render(output, &ctx).await;
                match fragment.kind {
                    FragmentKind::Unsupported => report.unsupported += 1,
                    FragmentKind::Snapshot => report.snapshots += 1,
                    FragmentKind::Text | FragmentKind::Image => {}
                }
                report.fragments += 1;
                outputs.push(fragment.markdown);
            }
            cells.push(ProcessedCell {
                cell_type: cell.cell_type.as_str().to_string(),
                source: cell.source.to_text(),
                execution_count: cell.execution_count,
                outputs,
            });
        }

        let notebook_name = notebook_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let markdown = self.render_markdown(template_name, &cells, &notebook_name, notebook.language())?;
        self.save_markdown(output_path, &markdown)?;

        info!(
            output = %output_path.display(),
            cells = report.cells,
            fragments = report.fragments,
            unsupported = report.unsupported,
            "[CONVERT] Conversion complete"
        );
        Ok(report)
    }

    fn ensure_template(&self, template_name: &str) -> Result<(), TemplateError> {
        self.env
            .get_template(template_name)
            .map(|_| ())
            .map_err(|source| {
                error!(template = template_name, dir = %self.template_dir.display(), error = %source, "[CONVERT] Template not found");
                TemplateError::NotFound {
                    name: template_name.to_string(),
                    dir: self.template_dir.clone(),
                    source,
                }
            })
    }

    /// Render processed cells through the named template.
    pub fn render_markdown(
        &self,
        template_name: &str,
        cells: &[ProcessedCell],
        notebook_name: &str,
        language: &str,
    ) -> Result<String, TemplateError> {
        let template = self.env.get_template(template_name).map_err(|source| TemplateError::NotFound {
            name: template_name.to_string(),
            dir: self.template_dir.clone(),
            source,
        })?;
        template
            .render(context! {
                cells => cells,
                notebook_name => notebook_name,
                language => language,
            })
            .map_err(|source| TemplateError::Render {
                name: template_name.to_string(),
                source,
            })
    }

    /// Write Markdown to `output_path`, creating parent directories.
    pub fn save_markdown(&self, output_path: &Path, markdown: &str) -> Result<(), ConvertError> {
        let io_err = |source| ConvertError::Io {
            path: output_path.to_path_buf(),
            source,
        };
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(output_path, markdown).map_err(io_err)?;
        debug!(path = %output_path.display(), bytes = markdown.len(), "[CONVERT] Markdown written");
        Ok(())
    }

    /// Remove a directory tree if present. Returns whether anything was removed.
    pub fn cleanup(&self, dir: &Path) -> io::Result<bool> {
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir)?;
        debug!(path = %dir.display(), "[CONVERT] Removed folder");
        Ok(true)
    }
}

/// Badge image shown above a converted notebook that has a Colab link.
pub const COLAB_BADGE_IMAGE: &str = "https://colab.research.google.com/assets/colab-badge.svg";

/// The "Open In Colab" header line, followed by a blank line.
pub fn colab_badge(colab_link: &str) -> String {
    format!("[![Open In Colab]({COLAB_BADGE_IMAGE})]({colab_link})\n\n")
}

/// Rewrite a Markdown file with the Colab badge header on top.
pub fn prepend_colab_badge(markdown_path: &Path, colab_link: &str) -> Result<(), ConvertError> {
    let io_err = |source| ConvertError::Io {
        path: markdown_path.to_path_buf(),
        source,
    };
    let body = fs::read_to_string(markdown_path).map_err(io_err)?;
    fs::write(markdown_path, colab_badge(colab_link) + &body).map_err(io_err)?;
    info!(path = %markdown_path.display(), link = colab_link, "[CONVERT] Colab badge added");
    Ok(())
}

/// `<markdown_dir>/<notebook_stem>_files`
pub fn assets_dir_for(notebook_path: &Path, markdown_dir: &Path) -> PathBuf {
    markdown_dir.join(format!("{}_files", notebook_stem(notebook_path)))
}
