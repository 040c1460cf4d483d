use super::{SecureStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::{fs, sync::Mutex};
use tracing::{debug, instrument};

/// Secure store backed by a single JSON document on disk.
///
/// The file is created with owner-only permissions on unix and replaced
/// atomically on every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");

        // a leftover temp file would keep its old mode
        match fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await?;
        file.write_all(&serde_json::to_vec_pretty(items)?).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &self.path).await?;

        debug!("secure store written: {}", self.path.display());

        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        items.insert(key.to_string(), value.to_string());
        self.persist(&items).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        if items.remove(key).is_some() {
            self.persist(&items).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("shiftclock-{}", Uuid::new_v4()))
            .join("secure-store.json")
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let store = FileStore::new(scratch_path());
        assert!(store.get("session").await.unwrap().is_none());
        store.delete("session").await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_values_survive_a_new_instance() {
        let path = scratch_path();
        let store = FileStore::new(&path);
        store.set("user_email", "ana@example.com").await.unwrap();
        store.set("biometrics_enabled", "true").await.unwrap();
        store.delete("user_email").await.unwrap();

        let reopened = FileStore::new(&path);
        assert!(reopened.get("user_email").await.unwrap().is_none());
        assert_eq!(
            reopened.get("biometrics_enabled").await.unwrap().as_deref(),
            Some("true")
        );

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = scratch_path();
        let store = FileStore::new(&path);
        store.set("session", "{}").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_temp_file_does_not_leak_mode() {
        use std::os::unix::fs::PermissionsExt;

        let path = scratch_path();
        let tmp = path.with_extension("tmp");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&tmp, "stale").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::new(&path);
        store.set("session", "{}").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.exists());
        assert_eq!(store.get("session").await.unwrap().as_deref(), Some("{}"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "definitely not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get("session").await,
            Err(StoreError::Encoding(_))
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
