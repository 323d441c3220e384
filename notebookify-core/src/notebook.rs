//! nbformat v4 notebook model.
//!
//! The model is read-only: the renderer derives new fragments from it and
//! never writes back. [`clear_outputs`] is the one operation that rewrites a
//! notebook on disk, and it works on the raw JSON so unknown fields survive.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{ConvertError, LoadError};

/// Output type tag of the only outputs the renderer interprets.
pub const EXECUTE_RESULT: &str = "execute_result";

#[derive(Debug, Clone, Deserialize)]
pub struct Notebook {
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

fn default_nbformat() -> u32 {
    4
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default)]
    pub language_info: Option<LanguageInfo>,
    #[serde(default)]
    pub kernelspec: Option<KernelSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KernelSpec {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
    #[serde(other)]
    Other,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Raw => "raw",
            CellType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default)]
    pub source: MultilineText,
    #[serde(default)]
    pub execution_count: Option<i64>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

/// One result attached to a code cell.
///
/// Outputs are taken as raw JSON so a single malformed entry cannot fail the
/// whole notebook; the renderer classifies each one on its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Value")]
pub struct Output {
    /// `None` when the entry has no string `output_type`.
    pub output_type: Option<String>,
    /// MIME bundle as found. Only `execute_result` and `display_data` carry
    /// one, and it is only usable when it is a JSON object.
    pub data: Value,
}

/// Tag used when an output does not say what it is.
pub const UNKNOWN_OUTPUT: &str = "unknown";

impl From<Value> for Output {
    fn from(raw: Value) -> Self {
        let output_type = raw
            .get("output_type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let data = raw.get("data").cloned().unwrap_or(Value::Null);
        Output { output_type, data }
    }
}

impl Output {
    pub fn is_execute_result(&self) -> bool {
        self.output_type.as_deref() == Some(EXECUTE_RESULT)
    }

    /// The output type for logs and fallback markers.
    pub fn type_tag(&self) -> &str {
        self.output_type.as_deref().unwrap_or(UNKNOWN_OUTPUT)
    }

    /// The MIME bundle, or `None` when `data` is absent or not an object.
    pub fn bundle(&self) -> Option<&serde_json::Map<String, Value>> {
        self.data.as_object()
    }
}

/// nbformat stores text either as one string or as a list of lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MultilineText {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineText {
    fn default() -> Self {
        MultilineText::Single(String::new())
    }
}

impl MultilineText {
    pub fn to_text(&self) -> String {
        match self {
            MultilineText::Single(s) => s.clone(),
            MultilineText::Lines(lines) => lines.concat(),
        }
    }
}

/// Join a MIME payload into text, accepting both nbformat encodings.
pub fn payload_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let mut text = String::new();
            for item in items {
                text.push_str(item.as_str()?);
            }
            Some(text)
        }
        _ => None,
    }
}

impl Notebook {
    /// Language of the code cells, used for fenced code blocks.
    pub fn language(&self) -> &str {
        self.metadata
            .language_info
            .as_ref()
            .map(|l| l.name.as_str())
            .or_else(|| {
                self.metadata
                    .kernelspec
                    .as_ref()
                    .and_then(|k| k.language.as_deref())
            })
            .unwrap_or("python")
    }

    /// Load and parse a notebook file.
    pub fn load(path: &Path) -> Result<Notebook, LoadError> {
        debug!(path = %path.display(), "[CONVERT] Loading notebook");
        let raw = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let notebook: Notebook = serde_json::from_str(&raw).map_err(|source| {
            error!(path = %path.display(), error = %source, "[CONVERT] Notebook is not valid nbformat JSON");
            LoadError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if notebook.nbformat < 4 {
            return Err(LoadError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: notebook.nbformat,
            });
        }
        debug!(path = %path.display(), cells = notebook.cells.len(), "[CONVERT] Notebook loaded");
        Ok(notebook)
    }
}

/// Base name of a notebook path without its extension (`analysis.ipynb` → `analysis`).
pub fn notebook_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notebook".to_string())
}

/// Rewrite the notebook at `path` with every cell's outputs removed and code
/// cells' execution counts reset. All other fields are preserved.
pub fn clear_outputs(path: &Path) -> Result<(), ConvertError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc: Value = serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut cleared = 0usize;
    if let Some(cells) = doc.get_mut("cells").and_then(Value::as_array_mut) {
        for cell in cells.iter_mut() {
            let Some(cell) = cell.as_object_mut() else {
                continue;
            };
            if let Some(outputs) = cell.get_mut("outputs").and_then(Value::as_array_mut) {
                cleared += outputs.len();
                outputs.clear();
            }
            if cell.get("cell_type").and_then(Value::as_str) == Some("code") {
                cell.insert("execution_count".to_string(), Value::Null);
            }
        }
    }

    let serialized = to_nbformat_json(&doc).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::other(source),
    })?;
    fs::write(path, serialized).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), outputs_removed = cleared, "[CLEAN] Cleared notebook outputs");
    Ok(())
}

/// nbformat writes JSON with a one-space indent and a trailing newline.
fn to_nbformat_json(doc: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Whether `path` names an existing file with the notebook extension.
pub fn is_notebook_file(path: &Path, extension: &str) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Markdown output path for a notebook: `<output_dir>/<dir>/<stem>.md`, where
/// `<dir>` is the notebook's directory relative to `source_root`. Without a
/// root, or for a notebook outside it, the file lands directly in
/// `output_dir`.
pub fn markdown_path_for(notebook: &Path, output_dir: &Path, source_root: Option<&Path>) -> PathBuf {
    let file_name = format!("{}.md", notebook_stem(notebook));
    match source_root.and_then(|root| source_subdir(notebook, root)) {
        Some(subdir) => output_dir.join(subdir).join(file_name),
        None => output_dir.join(file_name),
    }
}

fn source_subdir(notebook: &Path, root: &Path) -> Option<PathBuf> {
    let dir = notebook.parent()?;
    let relative = match dir.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let dir = fs::canonicalize(dir).ok()?;
            let root = fs::canonicalize(root).ok()?;
            dir.strip_prefix(&root).ok()?.to_path_buf()
        }
    };
    // only plain names; `..` or `.` could step outside output_dir
    Some(
        relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .collect(),
    )
}
