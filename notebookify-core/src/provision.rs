//! Remote Folder Provisioner: get-or-create a folder by `(parent, name)`,
//! memoized in the [`MetadataStore`].
//!
//! Cache policy: every cache hit is checked with
//! [`RemoteStorage::get_folder`]. A missing or trashed folder is a stale
//! entry; it is dropped and the folder is created again. `refresh = true`
//! skips the cache entirely and always creates.
//!
//! Two processes provisioning the same folder at the same time can both
//! create it; the last one to save wins the cache entry.

use tracing::{error, info, warn};

use crate::contract::{NewFolder, RemoteStorage};
use crate::error::ProvisionError;
use crate::metadata::MetadataStore;

pub struct FolderProvisioner<'s, S: RemoteStorage> {
    storage: &'s S,
    metadata: MetadataStore,
}

impl<'s, S: RemoteStorage> FolderProvisioner<'s, S> {
    pub fn new(storage: &'s S, metadata: MetadataStore) -> Self {
        Self { storage, metadata }
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub async fn get_or_create_folder(
        &mut self,
        name: &str,
        parent_id: Option<&str>,
        refresh: bool,
    ) -> Result<String, ProvisionError> {
        let key = MetadataStore::folder_key(parent_id, name);

        if !refresh {
            if let Some(cached) = self.metadata.get(&key).map(str::to_owned) {
                match self.storage.get_folder(&cached).await {
                    Ok(Some(folder)) if folder.is_live() => {
                        info!(folder = name, folder_id = %cached, "[PROVISION] Using cached folder");
                        return Ok(cached);
                    }
                    Ok(_) => {
                        warn!(folder = name, folder_id = %cached, "[PROVISION] Cached folder no longer exists, recreating");
                        self.metadata.remove(&key)?;
                    }
                    Err(e) => {
                        error!(folder = name, folder_id = %cached, error = %e, "[PROVISION] Failed to validate cached folder");
                        return Err(e.into());
                    }
                }
            }
        }

        let req = NewFolder {
            name: name.to_string(),
            parent_id: parent_id.map(str::to_owned),
        };
        let folder_id = match self.storage.create_folder(req).await {
            Ok(id) => id,
            Err(e) => {
                error!(folder = name, parent_id = ?parent_id, error = %e, "[PROVISION] Folder creation failed");
                return Err(e.into());
            }
        };
        self.metadata.insert(key, folder_id.clone())?;
        info!(folder = name, parent_id = ?parent_id, folder_id = %folder_id, refresh, "[PROVISION] Created folder");
        Ok(folder_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FolderMetadata, MockRemoteStorage};
    use crate::error::RemoteError;
    use tempfile::tempdir;

    fn live(id: &str, name: &str) -> FolderMetadata {
        FolderMetadata {
            id: id.to_string(),
            name: name.to_string(),
            trashed: false,
        }
    }

    #[tokio::test]
    async fn second_call_reuses_cached_folder() {
        let dir = tempdir().unwrap();
        let mut storage = MockRemoteStorage::new();
        storage
            .expect_create_folder()
            .times(1)
            .returning(|req| {
                assert_eq!(req.name, "reports");
                assert_eq!(req.parent_id.as_deref(), Some("root"));
                Ok("F1".to_string())
            });
        storage
            .expect_get_folder()
            .times(1)
            .returning(|id| Ok(Some(live(id, "reports"))));

        let metadata = MetadataStore::load(dir.path().join("meta.json"));
        let mut provisioner = FolderProvisioner::new(&storage, metadata);
        let first = provisioner.get_or_create_folder("reports", Some("root"), false).await.unwrap();
        let second = provisioner.get_or_create_folder("reports", Some("root"), false).await.unwrap();

        assert_eq!(first, "F1");
        assert_eq!(second, "F1");
        let reloaded = MetadataStore::load(dir.path().join("meta.json"));
        assert_eq!(reloaded.get("root/reports"), Some("F1"));
    }

    #[tokio::test]
    async fn refresh_creates_every_time() {
        let dir = tempdir().unwrap();
        let mut storage = MockRemoteStorage::new();
        let mut n = 0;
        storage.expect_create_folder().times(2).returning(move |_| {
            n += 1;
            Ok(format!("F{n}"))
        });
        storage.expect_get_folder().never();

        let mut provisioner = FolderProvisioner::new(&storage, MetadataStore::load(dir.path().join("m.json")));
        let a = provisioner.get_or_create_folder("x", None, true).await.unwrap();
        let b = provisioner.get_or_create_folder("x", None, true).await.unwrap();

        assert_eq!(a, "F1");
        assert_eq!(b, "F2");
        assert_eq!(provisioner.metadata().get("/x"), Some("F2"));
    }

    #[tokio::test]
    async fn stale_cache_entry_is_recreated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.json");
        let mut seeded = MetadataStore::load(&path);
        seeded.insert("/data", "GONE").unwrap();

        let mut storage = MockRemoteStorage::new();
        storage
            .expect_get_folder()
            .withf(|id| id == "GONE")
            .times(1)
            .returning(|_| Ok(None));
        storage.expect_create_folder().times(1).returning(|_| Ok("NEW".to_string()));

        let mut provisioner = FolderProvisioner::new(&storage, MetadataStore::load(&path));
        let id = provisioner.get_or_create_folder("data", None, false).await.unwrap();

        assert_eq!(id, "NEW");
        assert_eq!(MetadataStore::load(&path).get("/data"), Some("NEW"));
    }

    #[tokio::test]
    async fn trashed_folder_counts_as_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.json");
        let mut seeded = MetadataStore::load(&path);
        seeded.insert("p/data", "OLD").unwrap();

        let mut storage = MockRemoteStorage::new();
        storage.expect_get_folder().returning(|id| {
            Ok(Some(FolderMetadata {
                id: id.to_string(),
                name: "data".to_string(),
                trashed: true,
            }))
        });
        storage.expect_create_folder().times(1).returning(|_| Ok("FRESH".to_string()));

        let mut provisioner = FolderProvisioner::new(&storage, MetadataStore::load(&path));
        let id = provisioner.get_or_create_folder("data", Some("p"), false).await.unwrap();
        assert_eq!(id, "FRESH");
    }

    #[tokio::test]
    async fn create_failure_leaves_cache_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.json");
        let mut storage = MockRemoteStorage::new();
        storage.expect_create_folder().returning(|_| {
            Err(RemoteError::Status {
                operation: "create_folder",
                status: 403,
                body: "forbidden".to_string(),
            })
        });

        let mut provisioner = FolderProvisioner::new(&storage, MetadataStore::load(&path));
        let err = provisioner.get_or_create_folder("x", None, false).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(RemoteError::Status { status: 403, .. })));
        assert!(provisioner.metadata().is_empty());
    }
}
