//! High-level pipeline: convert → (clear outputs) → upload, per notebook.
//!
//! Markdown lands under `output_dir` at the notebook's directory relative to
//! the source root (the batch directory, else the project root), so two
//! notebooks sharing a stem in different folders never collide.
//!
//! [`process_notebook`] runs the pipeline for one notebook and returns a typed
//! error naming the failed stage. [`process_batch`] runs it for a list of
//! notebooks strictly in order, one fully finished before the next starts,
//! and never stops early: every failure is logged, recorded in the
//! [`BatchReport`], and the loop moves on.
//!
//! Upload is optional. Pass `None` for the orchestrator to only convert.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::contract::RemoteStorage;
use crate::convert::{prepend_colab_badge, MarkdownConverter};
use crate::error::{DocumentError, Stage};
use crate::notebook::{clear_outputs, is_notebook_file, markdown_path_for};
use crate::repo_root::detect_project_root;
use crate::upload::{colab_link_for, UploadOrchestrator, UploadedFile};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    pub template_name: String,
    pub notebook_extension: String,
    /// Strip outputs from the source notebook after a successful conversion.
    pub clear_outputs: bool,
    /// Directory the output layout is mirrored from. `None` falls back to
    /// the notebook's project root.
    pub source_root: Option<PathBuf>,
    /// Also upload the notebook itself and put an "Open In Colab" badge
    /// pointing at it on top of the Markdown.
    pub colab_link: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Converted {
        markdown: PathBuf,
    },
    Uploaded {
        markdown: PathBuf,
        upload: UploadedFile,
        colab_link: Option<String>,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub notebook: PathBuf,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.documents.len() - self.failed()
    }

    pub fn failed(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, DocumentOutcome::Failed { .. }))
            .count()
    }
}

pub async fn process_notebook<S: RemoteStorage>(
    converter: &MarkdownConverter,
    uploader: Option<&mut UploadOrchestrator<'_, S>>,
    notebook: &Path,
    options: &PipelineOptions,
) -> Result<DocumentOutcome, DocumentError> {
    if !is_notebook_file(notebook, &options.notebook_extension) {
        warn!(path = %notebook.display(), "[BATCH] Skipping invalid notebook path");
        return Err(DocumentError::InvalidNotebookPath(notebook.to_path_buf()));
    }

    let source_root = options
        .source_root
        .clone()
        .or_else(|| detect_project_root(notebook));
    let markdown = markdown_path_for(notebook, &options.output_dir, source_root.as_deref());
    converter
        .convert(notebook, &markdown, &options.template_name)
        .await?;

    if options.clear_outputs {
        clear_outputs(notebook).map_err(DocumentError::ClearOutputs)?;
    }

    match uploader {
        Some(uploader) => {
            let colab_link = if options.colab_link {
                let source = uploader.upload(notebook).await?;
                let link = colab_link_for(&source.file_id);
                if let Err(e) = prepend_colab_badge(&markdown, &link) {
                    warn!(path = %markdown.display(), error = %e, "[BATCH] Could not add Colab badge");
                }
                Some(link)
            } else {
                None
            };
            let upload = uploader.upload(&markdown).await?;
            Ok(DocumentOutcome::Uploaded {
                markdown,
                upload,
                colab_link,
            })
        }
        None => Ok(DocumentOutcome::Converted { markdown }),
    }
}

pub async fn process_batch<S: RemoteStorage>(
    converter: &MarkdownConverter,
    mut uploader: Option<&mut UploadOrchestrator<'_, S>>,
    notebooks: &[PathBuf],
    options: &PipelineOptions,
) -> BatchReport {
    info!(count = notebooks.len(), upload = uploader.is_some(), "[BATCH] Starting batch");
    let mut report = BatchReport::default();

    for (index, notebook) in notebooks.iter().enumerate() {
        info!(index = index + 1, total = notebooks.len(), notebook = %notebook.display(), "[BATCH] Processing notebook");
        let outcome = match process_notebook(converter, uploader.as_deref_mut(), notebook, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(notebook = %notebook.display(), stage = %e.stage(), error = %e, "[BATCH] Notebook failed, continuing");
                DocumentOutcome::Failed {
                    stage: e.stage(),
                    error: e.to_string(),
                }
            }
        };
        report.documents.push(DocumentReport {
            notebook: notebook.clone(),
            outcome,
        });
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "[BATCH] Batch complete"
    );
    report
}

/// All files under `dir` with the given extension, sorted. Jupyter checkpoint
/// folders are skipped.
pub fn discover_notebooks(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        ));
    }
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".ipynb_checkpoints")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some(extension))
        .collect();
    found.sort();
    info!(dir = %dir.display(), count = found.len(), "[BATCH] Discovered notebooks");
    Ok(found)
}
