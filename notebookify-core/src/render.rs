//! Output Renderer: one cell output in, one Markdown fragment out.
//!
//! Dispatch order for an `execute_result` output is fixed: plain text, then a
//! raster image embedded as a data URI, then a chart handed to the
//! [`SnapshotRenderer`]. Everything else, including outputs whose payload is
//! malformed, becomes an HTML comment naming the unsupported type.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::OutputRenderError;
use crate::notebook::{payload_text, Output};
use crate::snapshot::SnapshotRenderer;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PLOTLY: &str = "application/vnd.plotly.v1+json";

/// Raster keys in precedence order.
const RASTER_MIMES: [&str; 2] = [MIME_PNG, MIME_JPEG];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Text,
    Image,
    Snapshot,
    Unsupported,
}

/// Markdown derived from a single output. Never written back onto the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub markdown: String,
}

impl Fragment {
    fn new(kind: FragmentKind, markdown: impl Into<String>) -> Self {
        Self {
            kind,
            markdown: markdown.into(),
        }
    }

    /// The visible-but-non-rendering marker for outputs the renderer skips.
    pub fn unsupported(output_type: &str) -> Self {
        Self::new(
            FragmentKind::Unsupported,
            format!("<!-- Unsupported output type: {output_type} -->"),
        )
    }
}

/// Where chart snapshots for the current notebook go, and how the Markdown
/// file refers to them.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Directory the Markdown file is written to; image references are
    /// made relative to it when possible.
    pub markdown_dir: PathBuf,
    /// Directory snapshot images and placeholders are written to.
    pub assets_dir: PathBuf,
    pub cell_index: usize,
    pub output_index: usize,
}

impl RenderContext {
    fn snapshot_filename(&self) -> String {
        format!("chart_{}_{}.png", self.cell_index, self.output_index)
    }

    fn reference_for(&self, path: &Path) -> String {
        match path.strip_prefix(&self.markdown_dir) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

pub struct OutputRenderer {
    snapshots: SnapshotRenderer,
}

impl OutputRenderer {
    pub fn new(snapshots: SnapshotRenderer) -> Self {
        Self { snapshots }
    }

    /// Render one output. Never fails: problems degrade to
    /// [`Fragment::unsupported`].
    pub async fn render(&self, output: &Output, ctx: &RenderContext) -> Fragment {
        let output_type = output.type_tag();
        if !output.is_execute_result() {
            warn!(
                output_type,
                cell = ctx.cell_index,
                "[RENDER] Unsupported output type encountered"
            );
            return Fragment::unsupported(output_type);
        }

        match self.try_render(output, ctx).await {
            Ok(Some(fragment)) => fragment,
            Ok(None) => {
                let keys: Vec<&str> = output
                    .bundle()
                    .map(|bundle| bundle.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                warn!(
                    output_type,
                    mime_types = ?keys,
                    cell = ctx.cell_index,
                    "[RENDER] No supported MIME type in output"
                );
                Fragment::unsupported(output_type)
            }
            Err(e) => {
                warn!(
                    output_type,
                    cell = ctx.cell_index,
                    error = %e,
                    "[RENDER] Malformed output, using fallback"
                );
                Fragment::unsupported(output_type)
            }
        }
    }

    async fn try_render(
        &self,
        output: &Output,
        ctx: &RenderContext,
    ) -> Result<Option<Fragment>, OutputRenderError> {
        let data = output.bundle().ok_or(OutputRenderError::NotABundle)?;

        if let Some(value) = data.get(MIME_TEXT) {
            let text = payload_text(value).ok_or_else(|| OutputRenderError::NotText {
                mime: MIME_TEXT.to_string(),
            })?;
            debug!(cell = ctx.cell_index, "[RENDER] Plain text output");
            return Ok(Some(Fragment::new(FragmentKind::Text, text)));
        }

        for mime in RASTER_MIMES {
            if let Some(value) = data.get(mime) {
                let uri = image_data_uri(mime, value)?;
                debug!(cell = ctx.cell_index, mime, "[RENDER] Embedded raster image");
                return Ok(Some(Fragment::new(
                    FragmentKind::Image,
                    format!("![Image]({uri})"),
                )));
            }
        }

        if let Some(figure) = data.get(MIME_PLOTLY) {
            let path = self
                .snapshots
                .render_snapshot(figure, &ctx.assets_dir, &ctx.snapshot_filename())
                .await;
            let reference = ctx.reference_for(&path);
            debug!(cell = ctx.cell_index, path = %path.display(), "[RENDER] Chart snapshot referenced");
            return Ok(Some(Fragment::new(
                FragmentKind::Snapshot,
                format!("![Chart]({reference})"),
            )));
        }

        Ok(None)
    }
}

/// Build a `data:` URI from a base64 image payload. The payload must decode.
fn image_data_uri(mime: &str, value: &Value) -> Result<String, OutputRenderError> {
    let raw = payload_text(value).ok_or_else(|| OutputRenderError::NotText {
        mime: mime.to_string(),
    })?;
    let cleaned: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|source| OutputRenderError::InvalidBase64 {
            mime: mime.to_string(),
            source,
        })?;
    Ok(format!("data:{mime};base64,{cleaned}"))
}
