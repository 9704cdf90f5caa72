use crate::domain::model::{ArchiveOutcome, FileRef};
use crate::domain::ports::ObjectStore;
use crate::utils::error::{ArchiveFailure, ImportError, Result, StoreError};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_ARCHIVE_SUFFIX: &str = "-archive";

/// Removes a local copy, logging rather than failing when it cannot.
pub(crate) async fn discard_local(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed local copy {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Unable to remove {}: {}", path.display(), e),
    }
}

/// Bounded exponential backoff for existence confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Moves objects between the store and local storage, and from the inbound
/// bucket to its archive sibling.
pub struct StorageMover<S: ObjectStore> {
    store: S,
    work_dir: PathBuf,
    archive_suffix: String,
    wait: WaitPolicy,
}

impl<S: ObjectStore> StorageMover<S> {
    pub fn new(store: S, work_dir: PathBuf, archive_suffix: String, wait: WaitPolicy) -> Self {
        Self {
            store,
            work_dir,
            archive_suffix,
            wait,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn archive_bucket(&self, bucket: &str) -> String {
        format!("{}{}", bucket, self.archive_suffix)
    }

    /// Derives the local download path for `key`. Components that could
    /// leave the work directory are dropped.
    pub fn local_path(&self, key: &str) -> PathBuf {
        let relative: PathBuf = Path::new(key)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        self.work_dir.join(relative)
    }

    /// Downloads `bucket/key` into the work directory, replacing any previous
    /// local copy.
    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<FileRef> {
        let download_error = |source: StoreError| ImportError::DownloadError {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        };

        let data = self
            .store
            .get_object(bucket, key)
            .await
            .map_err(download_error)?;

        let local_path = self.local_path(key);
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| download_error(e.into()))?;
        }
        if let Err(e) = tokio::fs::write(&local_path, &data).await {
            discard_local(&local_path).await;
            return Err(download_error(e.into()));
        }

        tracing::debug!(
            "Downloaded {}/{} to {} ({} bytes)",
            bucket,
            key,
            local_path.display(),
            data.len()
        );

        Ok(FileRef {
            bucket: bucket.to_string(),
            key: key.to_string(),
            local_path,
        })
    }

    /// Copies `bucket/key` into the archive bucket, waits until the copy is
    /// visible, deletes the source and waits until it is gone.
    ///
    /// The source is never deleted before the copy is confirmed. Calling this
    /// again after a completed archive returns [`ArchiveOutcome::AlreadyArchived`].
    pub async fn archive(&self, bucket: &str, key: &str) -> Result<ArchiveOutcome> {
        let archive_bucket = self.archive_bucket(bucket);
        let archive_error = |failure: ArchiveFailure| ImportError::ArchiveError {
            bucket: bucket.to_string(),
            key: key.to_string(),
            failure,
        };

        let source_present = match self.store.object_exists(bucket, key).await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!("Unable to check {}/{} before archiving: {}", bucket, key, e);
                true
            }
        };
        if !source_present && matches!(self.store.object_exists(&archive_bucket, key).await, Ok(true)) {
            tracing::info!("{}/{} is already archived in {}", bucket, key, archive_bucket);
            return Ok(ArchiveOutcome::AlreadyArchived);
        }

        self.store
            .copy_object(bucket, key, &archive_bucket)
            .await
            .map_err(|source| {
                archive_error(ArchiveFailure::Copy {
                    destination: archive_bucket.clone(),
                    source,
                })
            })?;

        self.wait_until(&archive_bucket, key, true)
            .await
            .map_err(archive_error)?;
        tracing::info!(
            "Item {} successfully copied from bucket {} to bucket {}",
            key,
            bucket,
            archive_bucket
        );

        self.store
            .delete_object(bucket, key)
            .await
            .map_err(|source| archive_error(ArchiveFailure::Delete { source }))?;

        self.wait_until(bucket, key, false)
            .await
            .map_err(archive_error)?;

        Ok(ArchiveOutcome::Archived)
    }

    pub async fn list(&self, bucket: &str, prefix: &str) -> std::result::Result<Vec<String>, StoreError> {
        self.store.list_objects(bucket, prefix).await
    }

    async fn wait_until(
        &self,
        bucket: &str,
        key: &str,
        present: bool,
    ) -> std::result::Result<(), ArchiveFailure> {
        let started = Instant::now();
        let deadline = started + self.wait.timeout;
        let mut delay = self.wait.initial_delay;

        loop {
            match self.store.object_exists(bucket, key).await {
                Ok(exists) if exists == present => return Ok(()),
                Ok(_) => {}
                Err(e) => tracing::warn!("Existence check for {}/{} failed: {}", bucket, key, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ArchiveFailure::ConfirmTimeout {
                    location: format!("{}/{}", bucket, key),
                    waited: now - started,
                });
            }

            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(self.wait.max_delay.max(self.wait.initial_delay));
        }
    }
}
