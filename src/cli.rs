//! # notebookify CLI
//!
//! Argument parsing, startup wiring and the console summary. Everything that
//! converts or uploads lives in `notebookify-core`; this module only builds the
//! pieces from [`Config`] and hands them notebooks.
//!
//! Three entry modes:
//! - `notebookify NOTEBOOK`: one notebook
//! - `notebookify --batch DIR`: every notebook under `DIR`
//! - `notebookify`: interactive prompts (see [`crate::interactive`])
//!
//! Uploading needs `token.json` unless `--no-drive` is given; a missing or
//! unusable credential file stops the run before any notebook is touched.

use crate::chromium::ChromiumRasterizer;
use crate::drive::GoogleDriveClient;
use crate::interactive::run_interactive;
use crate::load_config::load_config;
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use notebookify_core::batch::{discover_notebooks, process_batch, BatchReport, DocumentOutcome, PipelineOptions};
use notebookify_core::config::Config;
use notebookify_core::convert::MarkdownConverter;
use notebookify_core::metadata::MetadataStore;
use notebookify_core::snapshot::SnapshotRenderer;
use notebookify_core::upload::{UploadOptions, UploadOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;

/// Convert Jupyter notebooks to Markdown and mirror them into Google Drive.
#[derive(Parser, Debug, Default)]
#[clap(
    name = "notebookify",
    version,
    about = "Convert Jupyter notebooks to Markdown and upload them to Google Drive"
)]
pub struct Cli {
    /// Notebook to convert. Omit it (and --batch) for interactive mode.
    pub notebook_path: Option<PathBuf>,

    /// Convert every notebook found under this directory
    #[clap(short, long, value_name = "DIR", conflicts_with = "notebook_path")]
    pub batch: Option<PathBuf>,

    /// Template file name inside the template directory
    #[clap(short, long)]
    pub template: Option<String>,

    /// Directory templates are loaded from
    #[clap(long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,

    /// Directory Markdown files are written to
    #[clap(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// YAML config file (defaults to ./notebookify.yaml when present)
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Convert only; skip Google Drive
    #[clap(long)]
    pub no_drive: bool,

    /// Ignore cached folder IDs and create every remote folder again
    #[clap(long)]
    pub refresh: bool,

    /// Clear outputs from the source notebook after conversion
    #[clap(long)]
    pub clean: bool,

    /// Share each uploaded file with "anyone with the link"
    #[clap(long)]
    pub share: bool,

    /// Also upload the notebook and add an "Open In Colab" badge to the Markdown
    #[clap(long)]
    pub colab_link: bool,

    /// Do not launch a browser; charts become placeholders
    #[clap(long)]
    pub no_snapshots: bool,

    /// Debug-level logging (RUST_LOG still wins when set)
    #[clap(short, long)]
    pub verbose: bool,
}

/// Apply flag values on top of the loaded configuration.
pub fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.template_dir {
        config.template_dir = dir.clone();
    }
    if let Some(name) = &cli.template {
        config.template_name = name.clone();
    }
    if cli.no_snapshots {
        config.snapshots.enabled = false;
    }
}

fn snapshot_renderer(config: &Config) -> SnapshotRenderer {
    if config.snapshots.enabled {
        SnapshotRenderer::new(Arc::new(ChromiumRasterizer::new(config.snapshots.clone())))
    } else {
        tracing::info!("[CLI] Chart snapshots disabled");
        SnapshotRenderer::disabled()
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.trace_loaded();

    let converter = MarkdownConverter::new(&config.template_dir, snapshot_renderer(&config));
    let options = PipelineOptions {
        output_dir: config.output_dir.clone(),
        template_name: config.template_name.clone(),
        notebook_extension: config.notebook_extension.clone(),
        clear_outputs: cli.clean,
        source_root: cli.batch.clone(),
        colab_link: cli.colab_link && !cli.no_drive,
    };

    let storage = if cli.no_drive {
        tracing::info!("[CLI] Drive upload disabled");
        None
    } else {
        let client = GoogleDriveClient::from_token_file(&config.token_path)
            .await
            .context("Google Drive authentication failed")?;
        Some(client)
    };
    let mut uploader = storage.as_ref().map(|storage| {
        UploadOrchestrator::new(
            storage,
            MetadataStore::load(&config.metadata_path),
            UploadOptions {
                root_folder_id: config.root_folder_id.clone(),
                refresh: cli.refresh,
                share: cli.share,
            },
        )
    });

    let notebooks = match (&cli.notebook_path, &cli.batch) {
        (Some(path), _) => vec![path.clone()],
        (None, Some(dir)) => discover_notebooks(dir, &config.notebook_extension)
            .with_context(|| format!("Cannot scan batch directory {}", dir.display()))?,
        (None, None) => {
            tracing::info!("[CLI] No notebook given, entering interactive mode");
            return run_interactive(&converter, uploader.as_mut(), &options, !cli.clean).await;
        }
    };

    if notebooks.is_empty() {
        println!("{}", "No notebooks found.".yellow());
        return Ok(());
    }

    let report = process_batch(&converter, uploader.as_mut(), &notebooks, &options).await;
    print_report(&report);
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "[CLI] Run finished"
    );

    if report.failed() > 0 {
        anyhow::bail!("{} of {} notebook(s) failed", report.failed(), report.documents.len());
    }
    Ok(())
}

/// Print one line per document followed by a totals line.
pub fn print_report(report: &BatchReport) {
    for doc in &report.documents {
        let name = doc.notebook.display();
        match &doc.outcome {
            DocumentOutcome::Converted { markdown } => {
                println!("{} {} -> {}", "converted".green(), name, markdown.display());
            }
            DocumentOutcome::Uploaded {
                markdown,
                upload,
                colab_link,
            } => {
                println!(
                    "{} {} -> {} (file id {})",
                    "uploaded".green().bold(),
                    name,
                    markdown.display(),
                    upload.file_id
                );
                if let Some(link) = &upload.share_link {
                    println!("  {} {}", "link:".cyan(), link);
                }
                if let Some(link) = colab_link {
                    println!("  {} {}", "colab:".cyan(), link);
                }
            }
            DocumentOutcome::Failed { stage, error } => {
                println!("{} [{}] {}: {}", "failed".red().bold(), stage, name, error);
            }
        }
    }
    let summary = format!(
        "{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    if report.failed() == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "notebookify",
            "nb.ipynb",
            "-o",
            "out/docs",
            "--template",
            "report.j2",
            "--no-snapshots",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.output_dir, PathBuf::from("out/docs"));
        assert_eq!(config.template_name, "report.j2");
        assert_eq!(config.template_dir, PathBuf::from("templates"));
        assert!(!config.snapshots.enabled);
    }

    #[test]
    fn colab_link_flag_parses() {
        let cli = Cli::parse_from(["notebookify", "nb.ipynb", "--colab-link", "--share"]);
        assert!(cli.colab_link);
        assert!(cli.share);
        assert!(!Cli::parse_from(["notebookify", "nb.ipynb"]).colab_link);
    }

    #[test]
    fn batch_conflicts_with_positional_path() {
        let err = Cli::try_parse_from(["notebookify", "nb.ipynb", "--batch", "dir"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
