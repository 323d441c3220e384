//! Snapshot Renderer: fail-soft wrapper around a [`ChartRasterizer`].
//!
//! `render_snapshot` always returns a path. On success it is the rasterized
//! image; on any failure it is a small Markdown placeholder recording the
//! error, written next to where the image would have been.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::contract::ChartRasterizer;
use crate::error::SnapshotError;

#[derive(Clone, Default)]
pub struct SnapshotRenderer {
    backend: Option<Arc<dyn ChartRasterizer>>,
}

impl SnapshotRenderer {
    pub fn new(backend: Arc<dyn ChartRasterizer>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A renderer with no backend: every chart becomes a placeholder.
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub async fn render_snapshot(&self, chart: &Value, output_dir: &Path, filename: &str) -> PathBuf {
        let target = output_dir.join(filename);
        match self.try_render(chart, output_dir, &target).await {
            Ok(()) => {
                info!(path = %target.display(), "[SNAPSHOT] Chart snapshot saved");
                target
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "[SNAPSHOT] Chart snapshot failed, writing placeholder");
                write_placeholder(&target, &e)
            }
        }
    }

    async fn try_render(&self, chart: &Value, output_dir: &Path, target: &Path) -> Result<(), SnapshotError> {
        validate_figure(chart)?;
        let backend = self.backend.as_ref().ok_or_else(|| {
            SnapshotError::BackendUnavailable("chart snapshots are disabled".to_string())
        })?;
        fs::create_dir_all(output_dir)?;
        backend.rasterize(chart, target).await
    }
}

/// A Plotly figure is an object whose `data` is an array of traces.
pub fn validate_figure(chart: &Value) -> Result<(), SnapshotError> {
    let obj = chart
        .as_object()
        .ok_or_else(|| SnapshotError::MalformedChart("figure is not a JSON object".to_string()))?;
    match obj.get("data") {
        Some(Value::Array(_)) => {}
        Some(_) => {
            return Err(SnapshotError::MalformedChart(
                "figure 'data' is not an array of traces".to_string(),
            ))
        }
        None => {
            return Err(SnapshotError::MalformedChart(
                "figure has no 'data' field".to_string(),
            ))
        }
    }
    if let Some(layout) = obj.get("layout") {
        if !layout.is_object() {
            return Err(SnapshotError::MalformedChart(
                "figure 'layout' is not an object".to_string(),
            ));
        }
    }
    Ok(())
}

/// `chart_1_0.png` → `chart_1_0.snapshot-error.md`
fn placeholder_path(target: &Path) -> PathBuf {
    target.with_extension("snapshot-error.md")
}

fn write_placeholder(target: &Path, err: &SnapshotError) -> PathBuf {
    let path = placeholder_path(target);
    let body = format!(
        "# Chart snapshot unavailable\n\nThe chart could not be rendered to `{}`.\n\nError: {}\n",
        target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        err
    );
    let written = match path.parent() {
        Some(parent) => fs::create_dir_all(parent).and_then(|_| fs::write(&path, body)),
        None => fs::write(&path, body),
    };
    if let Err(e) = written {
        error!(path = %path.display(), error = %e, "[SNAPSHOT] Failed to write snapshot placeholder");
    }
    path
}
