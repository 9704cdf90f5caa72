use crate::config::ImportSettings;
use crate::core::mover::{discard_local, StorageMover};
use crate::core::transformer::FileTransformer;
use crate::domain::model::{
    ArchiveOutcome, FileNotification, FileOutcome, FileReport, InvocationSummary, Phase,
    TenantConfig,
};
use crate::domain::ports::{Delivery, ObjectStore};
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::Validate;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::Instrument;

/// Runs each notified file through fetch, transform, deliver and archive.
///
/// Files are handled one after another. A failure is recorded against its
/// file and processing continues with the next one.
pub struct Importer<S: ObjectStore> {
    tenant: TenantConfig,
    transformer: FileTransformer,
    mover: StorageMover<S>,
    delivery: Box<dyn Delivery>,
}

struct Imported {
    records: usize,
    skipped_lines: usize,
    archive: ArchiveOutcome,
}

impl<S: ObjectStore> Importer<S> {
    /// Validates `settings` and builds an importer delivering through the
    /// collaborator the settings select.
    pub fn new(store: S, settings: ImportSettings) -> Result<Self> {
        let delivery = settings.delivery();
        Self::with_delivery(store, settings, delivery)
    }

    pub fn with_delivery(
        store: S,
        settings: ImportSettings,
        delivery: Box<dyn Delivery>,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            transformer: FileTransformer::new(settings.header, settings.delimiter),
            mover: StorageMover::new(
                store,
                settings.work_dir,
                settings.archive_suffix,
                settings.wait,
            ),
            tenant: settings.tenant,
            delivery,
        })
    }

    pub fn mover(&self) -> &StorageMover<S> {
        &self.mover
    }

    /// Single-event entry point: imports every file named by `notifications`.
    pub async fn handle(
        &self,
        notifications: &[FileNotification],
        deadline: Option<Instant>,
    ) -> InvocationSummary {
        let mut summary = InvocationSummary::default();
        for notification in notifications {
            tracing::info!(
                "[{} - {}] Bucket = {}, Key = {}",
                notification.source_system,
                notification
                    .event_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                notification.bucket,
                notification.key
            );
            summary
                .files
                .push(self.import_file(&notification.bucket, &notification.key, deadline).await);
        }
        log_summary(&summary);
        summary
    }

    /// Bucket-scan entry point: imports every object under `prefix`.
    pub async fn scan_bucket(
        &self,
        bucket: &str,
        prefix: &str,
        deadline: Option<Instant>,
    ) -> Result<InvocationSummary> {
        let keys = self
            .mover
            .list(bucket, prefix)
            .await
            .map_err(|source| ImportError::ListError {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                source,
            })?;
        tracing::info!("Found {} items in bucket {} under {:?}", keys.len(), bucket, prefix);

        let mut summary = InvocationSummary::default();
        for key in keys.iter().filter(|k| !k.ends_with('/')) {
            summary.files.push(self.import_file(bucket, key, deadline).await);
        }
        log_summary(&summary);
        Ok(summary)
    }

    pub async fn import_file(&self, bucket: &str, key: &str, deadline: Option<Instant>) -> FileReport {
        let span = tracing::info_span!("import", bucket = %bucket, key = %key);
        let outcome = match self.process(bucket, key, deadline).instrument(span.clone()).await {
            Ok(imported) => {
                span.in_scope(|| {
                    tracing::info!(
                        records = imported.records,
                        skipped_lines = imported.skipped_lines,
                        "Processed file"
                    )
                });
                FileOutcome::Succeeded {
                    records: imported.records,
                    skipped_lines: imported.skipped_lines,
                    archive: imported.archive,
                }
            }
            Err((phase, e)) => {
                span.in_scope(|| {
                    tracing::error!(%phase, category = ?e.category(), "Import failed: {}", e)
                });
                FileOutcome::Failed {
                    phase,
                    reason: e.to_string(),
                }
            }
        };

        FileReport {
            bucket: bucket.to_string(),
            key: key.to_string(),
            outcome,
        }
    }

    async fn process(
        &self,
        bucket: &str,
        key: &str,
        deadline: Option<Instant>,
    ) -> std::result::Result<Imported, (Phase, ImportError)> {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err((Phase::Fetch, ImportError::DeadlineExceeded { phase: Phase::Fetch }));
        }

        let file = match within(Phase::Fetch, deadline, self.mover.fetch(bucket, key)).await {
            Ok(file) => file,
            Err(e) => {
                // The download may have been cut off after the local file was created.
                discard_local(&self.mover.local_path(key)).await;
                return Err((Phase::Fetch, e));
            }
        };

        let transformed = within(
            Phase::Transform,
            deadline,
            self.transformer.transform(&file.local_path, &self.tenant),
        )
        .await;
        discard_local(&file.local_path).await;
        let transformed = transformed.map_err(|e| (Phase::Transform, e))?;

        if !transformed.skipped.is_empty() {
            tracing::warn!(
                "Skipped {} malformed lines in {}",
                transformed.skipped.len(),
                file
            );
        }

        within(
            Phase::Deliver,
            deadline,
            self.delivery.deliver(&transformed.payload),
        )
        .await
        .map_err(|e| (Phase::Deliver, e))?;

        let archive = within(Phase::Archive, deadline, self.mover.archive(bucket, key))
            .await
            .map_err(|e| (Phase::Archive, e))?;

        Ok(Imported {
            records: transformed.payload.records.len(),
            skipped_lines: transformed.skipped.len(),
            archive,
        })
    }
}

async fn within<T, F>(phase: Phase, deadline: Option<Instant>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        None => fut.await,
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| ImportError::DeadlineExceeded { phase })?,
    }
}

fn log_summary(summary: &InvocationSummary) {
    let failed = summary.files.len() - summary.succeeded();
    if failed == 0 {
        tracing::info!("Processed {} files", summary.files.len());
    } else {
        tracing::warn!(
            "Processed {} files, {} failed",
            summary.files.len(),
            failed
        );
    }
}

/// Converts a wall-clock deadline in epoch milliseconds into a monotonic
/// deadline, leaving `margin` for reporting. A deadline that has already
/// passed maps to now.
pub fn deadline_from_epoch_millis(deadline_ms: u64, margin: Duration) -> Instant {
    let deadline = UNIX_EPOCH + Duration::from_millis(deadline_ms);
    let remaining = deadline
        .duration_since(SystemTime::now())
        .unwrap_or_default()
        .saturating_sub(margin);
    Instant::now() + remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_from_epoch_millis() {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        let deadline = deadline_from_epoch_millis(now_ms + 60_000, Duration::from_secs(2));
        let remaining = deadline - Instant::now();
        assert!(remaining <= Duration::from_secs(58));
        assert!(remaining > Duration::from_secs(50));

        let past = deadline_from_epoch_millis(now_ms - 1_000, Duration::from_secs(2));
        assert!(past <= Instant::now());
    }

    #[tokio::test]
    async fn test_within_reports_phase() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let err = within(Phase::Deliver, Some(deadline), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ImportError::DeadlineExceeded {
                phase: Phase::Deliver
            }
        ));
    }
}
