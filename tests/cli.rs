use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn write_notebook(path: &Path) {
    let nb = r##"{
 "nbformat": 4,
 "nbformat_minor": 5,
 "metadata": {"language_info": {"name": "python"}},
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": ["# Results\n"]},
  {"cell_type": "code", "execution_count": 1, "metadata": {}, "source": ["6 * 7"],
   "outputs": [{"output_type": "execute_result", "execution_count": 1, "metadata": {}, "data": {"text/plain": ["42"]}}]}
 ]
}"##;
    fs::write(path, nb).expect("Writing notebook failed");
}

fn notebookify(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("notebookify").expect("Binary exists");
    cmd.current_dir(cwd)
        .env_remove("NOTEBOOKIFY_OUTPUT_DIR")
        .env_remove("NOTEBOOKIFY_TEMPLATE_DIR")
        .env_remove("NOTEBOOKIFY_ROOT_FOLDER_ID")
        .env_remove("NOTEBOOKIFY_METADATA_PATH")
        .env("NOTEBOOKIFY_TOKEN_PATH", cwd.join("token.json"));
    cmd
}

#[test]
fn help_lists_main_flags() {
    let dir = tempdir().unwrap();
    notebookify(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--batch")
                .and(predicate::str::contains("--no-drive"))
                .and(predicate::str::contains("--refresh")),
        );
}

#[test]
fn converts_single_notebook_without_drive() {
    let dir = tempdir().unwrap();
    let nb = dir.path().join("answer.ipynb");
    write_notebook(&nb);

    notebookify(dir.path())
        .arg(&nb)
        .arg("--no-drive")
        .arg("--no-snapshots")
        .arg("--template-dir")
        .arg(templates_dir())
        .arg("-o")
        .arg(dir.path().join("md"))
        .assert()
        .success()
        .stdout(predicate::str::contains("converted").and(predicate::str::contains("1 succeeded, 0 failed")));

    let markdown = fs::read_to_string(dir.path().join("md").join("answer.md")).unwrap();
    assert!(markdown.contains("# answer.ipynb"));
    assert!(markdown.contains("```python\n6 * 7\n```"));
    assert!(markdown.contains("42"));
}

#[test]
fn batch_reports_failures_and_exits_non_zero() {
    let dir = tempdir().unwrap();
    let nbs = dir.path().join("nbs");
    fs::create_dir_all(&nbs).unwrap();
    write_notebook(&nbs.join("good.ipynb"));
    fs::write(nbs.join("bad.ipynb"), "not json").unwrap();

    notebookify(dir.path())
        .arg("--batch")
        .arg(&nbs)
        .arg("--no-drive")
        .arg("--no-snapshots")
        .arg("--template-dir")
        .arg(templates_dir())
        .arg("-o")
        .arg(dir.path().join("md"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 succeeded, 1 failed"));

    assert!(dir.path().join("md").join("good.md").exists());
}

#[test]
fn missing_credentials_stop_the_run() {
    let dir = tempdir().unwrap();
    let nb = dir.path().join("answer.ipynb");
    write_notebook(&nb);

    notebookify(dir.path())
        .arg(&nb)
        .arg("--no-snapshots")
        .arg("--template-dir")
        .arg(templates_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("token.json"));

    assert!(!dir.path().join("output").exists());
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use notebookify::cli::{run, Cli};

    let cli = Cli {
        notebook_path: Some(PathBuf::from("does-not-exist.ipynb")),
        no_drive: true,
        no_snapshots: true,
        ..Default::default()
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
