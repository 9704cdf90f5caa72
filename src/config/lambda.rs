use crate::config::{ImportSettings, DEFAULT_WORK_DIR};
use crate::core::mover::{WaitPolicy, DEFAULT_ARCHIVE_SUFFIX};
use crate::core::transformer::{HeaderMatcher, DEFAULT_HEADER_PREFIX};
use crate::domain::model::TenantConfig;
use crate::utils::error::Result;
use crate::utils::validation::{
    parse_number, validate_required_field, validate_single_char, Validate,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "lambda")]
use crate::domain::model::FileNotification;
#[cfg(feature = "lambda")]
use crate::domain::ports::{ObjectStore, StoreResult};
#[cfg(feature = "lambda")]
use crate::utils::error::StoreError;
#[cfg(feature = "lambda")]
use aws_lambda_events::event::s3::S3EventRecord;
#[cfg(feature = "lambda")]
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;

/// Settings read from the function environment on every invocation.
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub tenant: TenantConfig,
    pub api_endpoint: Option<String>,
    pub header_prefix: String,
    pub header_pattern: Option<String>,
    pub delimiter: char,
    pub archive_suffix: String,
    pub work_dir: PathBuf,
    pub wait: WaitPolicy,
    pub deadline_margin: Duration,
    pub s3_region: Option<String>,
    pub company_id: Option<String>,
    pub bucket: Option<String>,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let file_def = var("FILE_DEF");
        let file_def = validate_required_field("FILE_DEF", &file_def)?;
        tracing::debug!("FILE_DEF {}", file_def);
        let tenant = ImportSettings::parse_file_def(file_def)?;

        let delimiter = match var("FIELD_DELIMITER") {
            Some(raw) => validate_single_char("FIELD_DELIMITER", &raw)?,
            None => crate::core::transformer::DEFAULT_DELIMITER,
        };

        let wait = WaitPolicy {
            timeout: Duration::from_secs(parse_number(
                "ARCHIVE_WAIT_TIMEOUT_SECS",
                var("ARCHIVE_WAIT_TIMEOUT_SECS").as_deref(),
                30,
            )?),
            initial_delay: Duration::from_millis(parse_number(
                "ARCHIVE_WAIT_INITIAL_MS",
                var("ARCHIVE_WAIT_INITIAL_MS").as_deref(),
                200,
            )?),
            max_delay: Duration::from_millis(parse_number(
                "ARCHIVE_WAIT_MAX_MS",
                var("ARCHIVE_WAIT_MAX_MS").as_deref(),
                5_000,
            )?),
        };

        let config = Self {
            tenant,
            api_endpoint: var("API_ENDPOINT"),
            header_prefix: var("HEADER_PREFIX").unwrap_or_else(|| DEFAULT_HEADER_PREFIX.to_string()),
            header_pattern: var("HEADER_PATTERN"),
            delimiter,
            archive_suffix: var("ARCHIVE_SUFFIX")
                .unwrap_or_else(|| DEFAULT_ARCHIVE_SUFFIX.to_string()),
            work_dir: PathBuf::from(var("WORK_DIR").unwrap_or_else(|| DEFAULT_WORK_DIR.to_string())),
            wait,
            deadline_margin: Duration::from_millis(parse_number(
                "DEADLINE_MARGIN_MS",
                var("DEADLINE_MARGIN_MS").as_deref(),
                2_000,
            )?),
            s3_region: var("S3_REGION"),
            company_id: var("COMPANY_ID"),
            bucket: var("BUCKET"),
        };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> Result<ImportSettings> {
        let header = match &self.header_pattern {
            Some(pattern) => HeaderMatcher::pattern(pattern)?,
            None => HeaderMatcher::prefix(&self.header_prefix),
        };

        Ok(ImportSettings {
            tenant: self.tenant.clone(),
            header,
            delimiter: self.delimiter,
            archive_suffix: self.archive_suffix.clone(),
            work_dir: self.work_dir.clone(),
            wait: self.wait,
            api_endpoint: self.api_endpoint.clone(),
        })
    }

    /// Bucket and prefix for a bucket scan. The prefix defaults to the
    /// tenant's company ID.
    pub fn scan_target(&self) -> Result<(String, String)> {
        let bucket = validate_required_field("BUCKET", &self.bucket)?.clone();
        let prefix = self
            .company_id
            .clone()
            .unwrap_or_else(|| self.tenant.tenant_id.clone());
        Ok((bucket, prefix))
    }
}

/// Decodes an object key as delivered in S3 notifications, where spaces
/// arrive as `+` and other reserved bytes as `%XX`.
pub fn decode_object_key(raw: &str) -> String {
    percent_encoding::percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Encodes `bucket/key` for the `x-amz-copy-source` header.
pub fn encode_copy_source(bucket: &str, key: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
    format!("{}/{}", bucket, encoded.replace('+', "%20").replace("%2F", "/"))
}

#[cfg(feature = "lambda")]
impl From<&S3EventRecord> for FileNotification {
    fn from(record: &S3EventRecord) -> Self {
        Self {
            source_system: record.event_source.clone().unwrap_or_default(),
            event_time: Some(record.event_time),
            bucket: record.s3.bucket.name.clone().unwrap_or_default(),
            key: decode_object_key(record.s3.object.key.as_deref().unwrap_or_default()),
        }
    }
}

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "lambda")]
fn s3_error(operation: &str, bucket: &str, key: &str, code: Option<&str>, message: String) -> StoreError {
    match code {
        Some("NoSuchKey") | Some("NotFound") | Some("NoSuchBucket") => StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        Some("AccessDenied") | Some("Forbidden") => StoreError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        _ => StoreError::Request {
            operation: operation.to_string(),
            message,
        },
    }
}

#[cfg(feature = "lambda")]
impl ObjectStore for S3Storage {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error("GetObject", bucket, key, e.code(), DisplayErrorContext(&e).to_string()))?;

        let data = resp.body.collect().await.map_err(|e| StoreError::Request {
            operation: "GetObject".to_string(),
            message: format!("Failed to collect S3 data: {}", e),
        })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn copy_object(&self, src_bucket: &str, key: &str, dest_bucket: &str) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(dest_bucket)
            .copy_source(encode_copy_source(src_bucket, key))
            .key(key)
            .send()
            .await
            .map_err(|e| {
                s3_error("CopyObject", src_bucket, key, e.code(), DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error("DeleteObject", bucket, key, e.code(), DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(s3_error(
                "HeadObject",
                bucket,
                key,
                e.code(),
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                s3_error("ListObjectsV2", bucket, prefix, e.code(), DisplayErrorContext(&e).to_string())
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FILE_DEF: &str = r#"{"companyID":"ACME","columns":{"transactionID":0,"transactionDate":1,"firstName":2,"lastName":3}}"#;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LambdaConfig::from_lookup(lookup(&[("FILE_DEF", FILE_DEF)])).unwrap();
        assert_eq!(config.tenant.tenant_id, "ACME");
        assert_eq!(config.archive_suffix, "-archive");
        assert_eq!(config.work_dir, PathBuf::from("/tmp"));
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.wait, WaitPolicy::default());
        assert!(config.api_endpoint.is_none());

        let settings = config.settings().unwrap();
        assert!(settings.header.is_header("TransactionID,Date"));
    }

    #[test]
    fn test_missing_file_def() {
        let err = LambdaConfig::from_lookup(lookup(&[("FILE_DEF", "  ")])).unwrap_err();
        match err {
            crate::utils::error::ImportError::MissingConfigError { field } => {
                assert_eq!(field, "FILE_DEF")
            }
            other => panic!("expected missing FILE_DEF, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = LambdaConfig::from_lookup(lookup(&[
            ("FILE_DEF", FILE_DEF),
            ("ARCHIVE_WAIT_TIMEOUT_SECS", "forever"),
        ]))
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("ARCHIVE_WAIT_TIMEOUT_SECS"));
    }

    #[test]
    fn test_zero_max_wait_is_rejected() {
        let err = LambdaConfig::from_lookup(lookup(&[
            ("FILE_DEF", FILE_DEF),
            ("ARCHIVE_WAIT_MAX_MS", "0"),
        ]))
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("archive_wait"));
    }

    #[test]
    fn test_overrides() {
        let config = LambdaConfig::from_lookup(lookup(&[
            ("FILE_DEF", FILE_DEF),
            ("API_ENDPOINT", "https://api.example.com/records"),
            ("HEADER_PATTERN", "^id;"),
            ("FIELD_DELIMITER", ";"),
            ("ARCHIVE_SUFFIX", "-done"),
            ("BUCKET", "in-bucket"),
        ]))
        .unwrap();

        let settings = config.settings().unwrap();
        assert_eq!(settings.delimiter, ';');
        assert!(settings.header.is_header("id;date"));
        assert!(!settings.header.is_header("TransactionID;date"));
        assert_eq!(
            config.scan_target().unwrap(),
            ("in-bucket".to_string(), "ACME".to_string())
        );
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        assert!(LambdaConfig::from_lookup(lookup(&[
            ("FILE_DEF", FILE_DEF),
            ("API_ENDPOINT", "not a url"),
        ]))
        .is_err());
    }

    #[test]
    fn test_scan_target_requires_bucket() {
        let config = LambdaConfig::from_lookup(lookup(&[("FILE_DEF", FILE_DEF)])).unwrap();
        assert!(config.scan_target().is_err());
    }

    #[test]
    fn test_decode_object_key() {
        assert_eq!(decode_object_key("a.csv"), "a.csv");
        assert_eq!(decode_object_key("ACME/my+file%281%29.csv"), "ACME/my file(1).csv");
        assert_eq!(decode_object_key("a%2Bb%26c%3Dd.csv"), "a+b&c=d.csv");
    }

    #[test]
    fn test_decode_object_key_keeps_literal_separators() {
        assert_eq!(decode_object_key("a&&b.csv"), "a&&b.csv");
        assert_eq!(decode_object_key("a="), "a=");
        assert_eq!(decode_object_key("&x=1&"), "&x=1&");
        assert_eq!(decode_object_key("100%25+done.csv"), "100% done.csv");
    }

    #[test]
    fn test_encode_copy_source() {
        assert_eq!(encode_copy_source("in-bucket", "a.csv"), "in-bucket/a.csv");
        assert_eq!(
            encode_copy_source("in-bucket", "ACME/my file+1.csv"),
            "in-bucket/ACME/my%20file%2B1.csv"
        );
    }
}
