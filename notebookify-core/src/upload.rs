//! Upload Orchestrator: mirror a converted file's repository-relative
//! directory as nested remote folders, then upload the file into the innermost
//! one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::contract::{NewFile, RemoteStorage};
use crate::error::UploadError;
use crate::metadata::{MetadataStore, ROOT_FOLDER_KEY};
use crate::provision::FolderProvisioner;
use crate::repo_root::{folder_components, relative_to_project_root};

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Top-level folder the mirrored hierarchy starts under.
    pub root_folder_id: Option<String>,
    /// Bypass the folder cache and create every folder level again, once per
    /// folder per run.
    pub refresh: bool,
    /// Make each uploaded file readable by anyone with the link.
    pub share: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_id: String,
    pub folder_id: Option<String>,
    pub relative_path: PathBuf,
    pub share_link: Option<String>,
}

pub struct UploadOrchestrator<'s, S: RemoteStorage> {
    storage: &'s S,
    provisioner: FolderProvisioner<'s, S>,
    root_folder_id: Option<String>,
    refresh: bool,
    share: bool,
    /// Folder keys already recreated during this run under `refresh`.
    refreshed: HashSet<String>,
}

/// Colab URL that opens a notebook stored under `file_id`.
pub fn colab_link_for(file_id: &str) -> String {
    format!("https://colab.research.google.com/drive/{file_id}")
}

impl<'s, S: RemoteStorage> UploadOrchestrator<'s, S> {
    /// The starting folder is `options.root_folder_id`, else the metadata's
    /// `root_folder_id` entry, else the remote root.
    pub fn new(storage: &'s S, metadata: MetadataStore, options: UploadOptions) -> Self {
        let root_folder_id = options
            .root_folder_id
            .or_else(|| metadata.get(ROOT_FOLDER_KEY).map(str::to_owned));
        info!(root_folder_id = ?root_folder_id, refresh = options.refresh, "[UPLOAD] Upload orchestrator ready");
        Self {
            storage,
            provisioner: FolderProvisioner::new(storage, metadata),
            root_folder_id,
            refresh: options.refresh,
            share: options.share,
            refreshed: HashSet::new(),
        }
    }

    pub fn metadata(&self) -> &MetadataStore {
        self.provisioner.metadata()
    }

    pub async fn upload(&mut self, file_path: &Path) -> Result<UploadedFile, UploadError> {
        let relative_path = relative_to_project_root(file_path);
        let folders = folder_components(&relative_path);
        info!(
            path = %file_path.display(),
            relative = %relative_path.display(),
            depth = folders.len(),
            "[UPLOAD] Resolving remote folder chain"
        );

        let mut parent = self.root_folder_id.clone();
        for folder in &folders {
            let key = MetadataStore::folder_key(parent.as_deref(), folder);
            let refresh = self.refresh && !self.refreshed.contains(&key);
            let id = self
                .provisioner
                .get_or_create_folder(folder, parent.as_deref(), refresh)
                .await?;
            if refresh {
                self.refreshed.insert(key);
            }
            parent = Some(id);
        }

        let content = fs::read(file_path).map_err(|source| UploadError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative_path.to_string_lossy().into_owned());
        let req = NewFile {
            mime_type: mime_type_for(file_path).to_string(),
            name,
            parent_id: parent.clone(),
            content,
        };
        let remote = self.storage.create_file(req).await.map_err(|e| {
            error!(path = %file_path.display(), error = %e, "[UPLOAD] File upload failed");
            e
        })?;
        info!(path = %file_path.display(), file_id = %remote.id, "[UPLOAD] Uploaded file");

        let share_link = if self.share {
            let link = self.storage.share_with_link(&remote.id).await?;
            info!(file_id = %remote.id, link = %link, "[UPLOAD] File shared with link");
            Some(link)
        } else {
            None
        };

        Ok(UploadedFile {
            file_id: remote.id,
            folder_id: parent,
            relative_path,
            share_link,
        })
    }
}

/// MIME type sent with an upload, chosen by extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") => "text/markdown",
        Some("ipynb") => "application/x-ipynb+json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("html") => "text/html",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FolderMetadata, MockRemoteStorage, RemoteFile};
    use mockall::Sequence;
    use tempfile::tempdir;

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type_for(Path::new("a/b.md")), "text/markdown");
        assert_eq!(mime_type_for(Path::new("x.JPG")), "application/octet-stream");
        assert_eq!(mime_type_for(Path::new("x.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn nested_file_provisions_each_level_in_order() {
        let repo = tempdir().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        let dir = repo.path().join("reports").join("q1");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("nb.md");
        fs::write(&file, "# hello\n").unwrap();

        let mut storage = MockRemoteStorage::new();
        let mut seq = Sequence::new();
        storage
            .expect_create_folder()
            .withf(|req| req.name == "reports" && req.parent_id.as_deref() == Some("ROOT"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("A".to_string()));
        storage
            .expect_create_folder()
            .withf(|req| req.name == "q1" && req.parent_id.as_deref() == Some("A"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("B".to_string()));
        storage
            .expect_create_file()
            .withf(|req| {
                req.name == "nb.md"
                    && req.parent_id.as_deref() == Some("B")
                    && req.mime_type == "text/markdown"
                    && req.content == b"# hello\n"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                Ok(RemoteFile {
                    id: "FILE".to_string(),
                    name: req.name,
                    web_link: None,
                })
            });
        storage.expect_share_with_link().never();

        let metadata = MetadataStore::load(repo.path().join("meta.json"));
        let options = UploadOptions {
            root_folder_id: Some("ROOT".to_string()),
            ..Default::default()
        };
        let mut orchestrator = UploadOrchestrator::new(&storage, metadata, options);
        let uploaded = orchestrator.upload(&file).await.unwrap();

        assert_eq!(uploaded.file_id, "FILE");
        assert_eq!(uploaded.folder_id.as_deref(), Some("B"));
        assert_eq!(uploaded.relative_path, PathBuf::from("reports/q1/nb.md"));
        assert_eq!(uploaded.share_link, None);
        assert_eq!(orchestrator.metadata().get("ROOT/reports"), Some("A"));
        assert_eq!(orchestrator.metadata().get("A/q1"), Some("B"));
    }

    #[tokio::test]
    async fn root_folder_falls_back_to_metadata_entry_and_shares() {
        let repo = tempdir().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        let file = repo.path().join("top.md");
        fs::write(&file, "x").unwrap();

        let mut metadata = MetadataStore::load(repo.path().join("meta.json"));
        metadata.insert(ROOT_FOLDER_KEY, "LEGACY").unwrap();

        let mut storage = MockRemoteStorage::new();
        storage.expect_create_folder().never();
        storage
            .expect_create_file()
            .withf(|req| req.parent_id.as_deref() == Some("LEGACY"))
            .returning(|req| {
                Ok(RemoteFile {
                    id: "F".to_string(),
                    name: req.name,
                    web_link: None,
                })
            });
        storage
            .expect_share_with_link()
            .withf(|id| id == "F")
            .returning(|_| Ok("https://example.test/F".to_string()));

        let options = UploadOptions {
            share: true,
            ..Default::default()
        };
        let mut orchestrator = UploadOrchestrator::new(&storage, metadata, options);
        let uploaded = orchestrator.upload(&file).await.unwrap();

        assert_eq!(uploaded.folder_id.as_deref(), Some("LEGACY"));
        assert_eq!(uploaded.share_link.as_deref(), Some("https://example.test/F"));
    }

    #[tokio::test]
    async fn refresh_recreates_each_folder_once_per_run() {
        let repo = tempdir().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        let dir = repo.path().join("reports").join("q1");
        fs::create_dir_all(&dir).unwrap();
        let files: Vec<PathBuf> = ["a.md", "b.md", "c.md"].iter().map(|n| dir.join(n)).collect();
        for file in &files {
            fs::write(file, "x").unwrap();
        }

        let mut metadata = MetadataStore::load(repo.path().join("meta.json"));
        metadata.insert("ROOT/reports", "OLD-A").unwrap();
        metadata.insert("OLD-A/q1", "OLD-B").unwrap();

        let mut storage = MockRemoteStorage::new();
        storage
            .expect_create_folder()
            .withf(|req| req.name == "reports" && req.parent_id.as_deref() == Some("ROOT"))
            .times(1)
            .returning(|_| Ok("A".to_string()));
        storage
            .expect_create_folder()
            .withf(|req| req.name == "q1" && req.parent_id.as_deref() == Some("A"))
            .times(1)
            .returning(|_| Ok("B".to_string()));
        storage
            .expect_get_folder()
            .withf(|id| id == "A" || id == "B")
            .times(4)
            .returning(|id| {
                Ok(Some(FolderMetadata {
                    id: id.to_string(),
                    name: "live".to_string(),
                    trashed: false,
                }))
            });
        storage
            .expect_create_file()
            .withf(|req| req.parent_id.as_deref() == Some("B"))
            .times(3)
            .returning(|req| {
                Ok(RemoteFile {
                    id: format!("id-{}", req.name),
                    name: req.name,
                    web_link: None,
                })
            });

        let options = UploadOptions {
            root_folder_id: Some("ROOT".to_string()),
            refresh: true,
            ..Default::default()
        };
        let mut orchestrator = UploadOrchestrator::new(&storage, metadata, options);
        for file in &files {
            let uploaded = orchestrator.upload(file).await.unwrap();
            assert_eq!(uploaded.folder_id.as_deref(), Some("B"));
        }
        assert_eq!(orchestrator.metadata().get("ROOT/reports"), Some("A"));
        assert_eq!(orchestrator.metadata().get("A/q1"), Some("B"));
    }

    #[test]
    fn colab_link_opens_drive_file() {
        assert_eq!(colab_link_for("abc123"), "https://colab.research.google.com/drive/abc123");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let mut storage = MockRemoteStorage::new();
        storage.expect_create_file().never();
        let mut orchestrator =
            UploadOrchestrator::new(&storage, MetadataStore::load(dir.path().join("m.json")), UploadOptions::default());

        let err = orchestrator.upload(&dir.path().join("gone.md")).await.unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
    }
}
