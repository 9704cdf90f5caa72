#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_lambda_events::event::s3::S3Event;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use ftp_import::core::importer::deadline_from_epoch_millis;
#[cfg(feature = "lambda")]
use ftp_import::utils::logger;
#[cfg(feature = "lambda")]
use ftp_import::{FileNotification, Importer, InvocationSummary, LambdaConfig, S3Storage};
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::Deserialize;

/// Either an S3 notification (single-event mode) or `{"scan": {...}}` to
/// import everything under a prefix.
#[cfg(feature = "lambda")]
#[derive(Deserialize)]
#[serde(untagged)]
pub enum Request {
    Scan(ScanRequest),
    Notification(S3Event),
}

#[cfg(feature = "lambda")]
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRequest {
    pub scan: ScanTarget,
}

#[cfg(feature = "lambda")]
#[derive(Deserialize, Default)]
pub struct ScanTarget {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
}

#[cfg(feature = "lambda")]
async fn function_handler(
    event: LambdaEvent<Request>,
    storage: &S3Storage,
) -> Result<InvocationSummary, Error> {
    tracing::info!(request_id = %event.context.request_id, "Starting import");

    // Configuration problems abort before any S3 call.
    let lambda_config = LambdaConfig::from_env()?;
    let deadline = deadline_from_epoch_millis(event.context.deadline, lambda_config.deadline_margin);
    let importer = Importer::new(storage.clone(), lambda_config.settings()?)?;

    let summary = match event.payload {
        Request::Notification(s3_event) => {
            let notifications: Vec<FileNotification> =
                s3_event.records.iter().map(FileNotification::from).collect();
            if notifications.is_empty() {
                tracing::warn!("No records found in S3 event");
            }
            importer.handle(&notifications, Some(deadline)).await
        }
        Request::Scan(ScanRequest { scan }) => {
            let (default_bucket, default_prefix) = match &scan.bucket {
                Some(bucket) => (
                    bucket.clone(),
                    lambda_config
                        .company_id
                        .clone()
                        .unwrap_or_else(|| lambda_config.tenant.tenant_id.clone()),
                ),
                None => lambda_config.scan_target()?,
            };
            let prefix = scan.prefix.unwrap_or(default_prefix);
            importer.scan_bucket(&default_bucket, &prefix, Some(deadline)).await?
        }
    };

    if summary.all_succeeded() {
        tracing::info!("Processed {} files", summary.succeeded());
        return Ok(summary);
    }

    // Failing the invocation lets the platform re-deliver; archiving is idempotent.
    let failed: Vec<String> = summary
        .failed()
        .map(|r| format!("{}/{} ({:?})", r.bucket, r.key, r.outcome))
        .collect();
    Err(format!("{} of {} files failed: {}", failed.len(), summary.files.len(), failed.join("; ")).into())
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let shared_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
    if let Ok(region) = std::env::var("S3_REGION") {
        builder = builder.region(Region::new(region));
    }
    let storage = S3Storage::new(S3Client::from_conf(builder.build()));

    run(service_fn(|event| function_handler(event, &storage))).await
}
