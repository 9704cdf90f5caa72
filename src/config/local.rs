use crate::domain::ports::{ObjectStore, StoreResult};
use crate::utils::error::StoreError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Filesystem object store: each bucket is a directory under `base_path`
/// and each key a file path inside it.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.base_path.join(bucket).join(key)
    }

    fn not_found(bucket: &str, key: &str, e: std::io::Error) -> StoreError {
        match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            ErrorKind::PermissionDenied => StoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StoreError::Io(e),
        }
    }
}

impl ObjectStore for LocalStorage {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        fs::read(self.object_path(bucket, key))
            .await
            .map_err(|e| Self::not_found(bucket, key, e))
    }

    async fn copy_object(&self, src_bucket: &str, key: &str, dest_bucket: &str) -> StoreResult<()> {
        let destination = self.object_path(dest_bucket, key);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(self.object_path(src_bucket, key), destination)
            .await
            .map_err(|e| Self::not_found(src_bucket, key, e))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.object_path(bucket, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::not_found(bucket, key, e)),
        }
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(fs::try_exists(self.object_path(bucket, key)).await?)
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let root = self.base_path.join(bucket);
        let mut keys = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| Self::not_found(bucket, prefix, e))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Some(key) = relative_key(&root, &path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_delete_exists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join("in-bucket")).unwrap();
        std::fs::write(storage.object_path("in-bucket", "a.csv"), b"T1,2024-01-01,Jane,Doe\n").unwrap();

        assert!(storage.object_exists("in-bucket", "a.csv").await.unwrap());
        assert!(!storage.object_exists("in-bucket-archive", "a.csv").await.unwrap());

        storage.copy_object("in-bucket", "a.csv", "in-bucket-archive").await.unwrap();
        assert_eq!(
            storage.get_object("in-bucket-archive", "a.csv").await.unwrap(),
            b"T1,2024-01-01,Jane,Doe\n"
        );

        storage.delete_object("in-bucket", "a.csv").await.unwrap();
        assert!(!storage.object_exists("in-bucket", "a.csv").await.unwrap());
        storage.delete_object("in-bucket", "a.csv").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        assert!(matches!(
            storage.get_object("in-bucket", "missing.csv").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_objects_with_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        for key in ["ACME/2024/a.csv", "ACME/b.csv", "OTHER/c.csv"] {
            let path = storage.object_path("in-bucket", key);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"x").unwrap();
        }

        let keys = storage.list_objects("in-bucket", "ACME").await.unwrap();
        assert_eq!(keys, vec!["ACME/2024/a.csv".to_string(), "ACME/b.csv".to_string()]);

        let all = storage.list_objects("in-bucket", "").await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
