//! # contract: seams to the outside world
//!
//! Two traits separate the pipeline from the services it drives:
//! - [`RemoteStorage`]: folder/file operations on the remote file store.
//! - [`ChartRasterizer`]: turning a chart description into a static image.
//!
//! Both are annotated for `mockall` so tests in this crate and in the CLI
//! crate (through the default `test-export-mocks` feature) can script the
//! remote side deterministically.
//!
//! Request types are owned plain data; the concrete clients live in the CLI
//! crate.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::error::{RemoteError, SnapshotError};

/// MIME type the remote store uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A folder to be created. `parent_id: None` creates it at the remote root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFolder {
    pub name: String,
    pub parent_id: Option<String>,
}

/// A file to be uploaded under `parent_id` (or the remote root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub parent_id: Option<String>,
    pub content: Vec<u8>,
    pub mime_type: String,
}

/// What the remote store reports about an existing folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMetadata {
    pub id: String,
    pub name: String,
    /// Trashed folders still resolve by ID but must not receive new files.
    pub trashed: bool,
}

impl FolderMetadata {
    pub fn is_live(&self) -> bool {
        !self.trashed
    }
}

/// Returned after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub web_link: Option<String>,
}

/// Folder/file operations against the remote file store.
///
/// Implementations perform exactly one remote call per method (no retry, no
/// backoff) and map every failure to [`RemoteError`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Create a folder and return its remote ID.
    async fn create_folder(&self, req: NewFolder) -> Result<String, RemoteError>;

    /// Fetch folder metadata; `Ok(None)` when no folder has that ID.
    async fn get_folder(&self, folder_id: &str) -> Result<Option<FolderMetadata>, RemoteError>;

    /// Upload a file.
    async fn create_file(&self, req: NewFile) -> Result<RemoteFile, RemoteError>;

    /// Grant "anyone with the link" read access and return the shareable link.
    async fn share_with_link(&self, file_id: &str) -> Result<String, RemoteError>;
}

/// Rasterizes a chart figure (a Plotly figure document) to a PNG at `output`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ChartRasterizer: Send + Sync {
    async fn rasterize(
        &self,
        figure: &serde_json::Value,
        output: &Path,
    ) -> Result<(), SnapshotError>;
}
