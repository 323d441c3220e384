//! Error taxonomy for the conversion and upload pipeline.
//!
//! Errors local to one output ([`OutputRenderError`]) or one chart
//! ([`SnapshotError`]) are absorbed where they happen and never reach a caller.
//! Errors local to one document surface as [`DocumentError`] and stop at the
//! batch loop. Only [`AuthError`] at startup is meant to end a whole run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The notebook file could not be read or is not a usable nbformat document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read notebook {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("notebook {path} is not valid nbformat JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("notebook {path} uses nbformat {version}, only version 4 and later are supported")]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

/// The named template is missing or failed to render.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{name}' could not be loaded from {dir}: {source}")]
    NotFound {
        name: String,
        dir: PathBuf,
        #[source]
        source: minijinja::Error,
    },
    #[error("template '{name}' failed to render: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// A single cell output could not be interpreted.
#[derive(Debug, Error)]
pub enum OutputRenderError {
    #[error("output data is not a MIME bundle")]
    NotABundle,
    #[error("payload for '{mime}' is not text")]
    NotText { mime: String },
    #[error("payload for '{mime}' is not valid base64: {source}")]
    InvalidBase64 {
        mime: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// Chart rasterization failed.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("chart description is malformed: {0}")]
    MalformedChart(String),
    #[error("no chart rendering backend is available: {0}")]
    BackendUnavailable(String),
    #[error("chart rendering failed: {0}")]
    Render(String),
    #[error("chart rendering timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to prepare snapshot directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing or unusable remote credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{path} not found; generate it by completing the OAuth flow")]
    MissingCredentials { path: PathBuf },
    #[error("credential file {path} is unusable: {reason}")]
    InvalidCredentials { path: PathBuf, reason: String },
    #[error("access token refresh failed: {0}")]
    Refresh(String),
}

/// Any failed remote folder or file operation.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote {operation} request failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
    #[error("remote {operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("remote {operation} returned an unexpected response: {message}")]
    Response {
        operation: &'static str,
        message: String,
    },
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// The local folder-ID cache could not be persisted.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to write metadata file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of one notebook conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("folder provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("failed to read {path} for upload: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline stage a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Convert,
    ClearOutputs,
    Upload,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Convert => "convert",
            Stage::ClearOutputs => "clear-outputs",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Failure of one document in the convert-then-upload pipeline.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not a notebook file: {0}")]
    InvalidNotebookPath(PathBuf),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("failed to clear outputs: {0}")]
    ClearOutputs(#[source] ConvertError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl DocumentError {
    pub fn stage(&self) -> Stage {
        match self {
            DocumentError::InvalidNotebookPath(_) => Stage::Validate,
            DocumentError::Convert(_) => Stage::Convert,
            DocumentError::ClearOutputs(_) => Stage::ClearOutputs,
            DocumentError::Upload(_) => Stage::Upload,
        }
    }
}
