//! Interactive mode: prompt for a notebook, run it, then offer to retry,
//! convert another, or exit.

use crate::cli::print_report;
use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use notebookify_core::batch::{process_batch, PipelineOptions};
use notebookify_core::contract::RemoteStorage;
use notebookify_core::convert::MarkdownConverter;
use notebookify_core::upload::UploadOrchestrator;
use std::path::PathBuf;

const NEXT_STEPS: [&str; 3] = ["Retry this notebook", "Convert another notebook", "Exit"];

/// Trim whitespace and one pair of surrounding quotes, as left behind by
/// drag-and-drop into a terminal.
pub fn clean_path_input(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    PathBuf::from(unquoted)
}

/// `ask_clean` is false when `--clean` was already given on the command line.
pub async fn run_interactive<S: RemoteStorage>(
    converter: &MarkdownConverter,
    mut uploader: Option<&mut UploadOrchestrator<'_, S>>,
    options: &PipelineOptions,
    ask_clean: bool,
) -> Result<()> {
    let theme = ColorfulTheme::default();
    loop {
        let raw: String = Input::with_theme(&theme)
            .with_prompt("Path to notebook")
            .interact_text()?;
        let notebook = clean_path_input(&raw);

        let mut opts = options.clone();
        if ask_clean {
            opts.clear_outputs = Confirm::with_theme(&theme)
                .with_prompt("Clear notebook outputs after conversion?")
                .default(false)
                .interact()?;
        }

        loop {
            let report = process_batch(
                converter,
                uploader.as_deref_mut(),
                std::slice::from_ref(&notebook),
                &opts,
            )
            .await;
            print_report(&report);

            let choice = Select::with_theme(&theme)
                .with_prompt("What next?")
                .items(&NEXT_STEPS)
                .default(if report.failed() > 0 { 0 } else { 1 })
                .interact()?;
            match choice {
                0 => continue,
                1 => break,
                _ => {
                    tracing::info!("[CLI] Leaving interactive mode");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matching_quotes_and_whitespace() {
        assert_eq!(clean_path_input("  '/tmp/my nb.ipynb' \n"), PathBuf::from("/tmp/my nb.ipynb"));
        assert_eq!(clean_path_input("\"a.ipynb\""), PathBuf::from("a.ipynb"));
        assert_eq!(clean_path_input("plain.ipynb"), PathBuf::from("plain.ipynb"));
    }

    #[test]
    fn leaves_unbalanced_quotes_alone() {
        assert_eq!(clean_path_input("'a.ipynb"), PathBuf::from("'a.ipynb"));
    }
}
