#[cfg(feature = "cli")]
pub mod cli;
pub mod lambda;
pub mod local;

use crate::core::delivery::{HttpDelivery, LogDelivery};
use crate::core::mover::{WaitPolicy, DEFAULT_ARCHIVE_SUFFIX};
use crate::core::transformer::{HeaderMatcher, DEFAULT_DELIMITER};
use crate::domain::model::TenantConfig;
use crate::domain::ports::Delivery;
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_url, Validate};
use std::path::PathBuf;

pub const DEFAULT_WORK_DIR: &str = "/tmp";

/// Everything one invocation needs, resolved from the environment or the
/// command line before any storage is touched.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub tenant: TenantConfig,
    pub header: HeaderMatcher,
    pub delimiter: char,
    pub archive_suffix: String,
    pub work_dir: PathBuf,
    pub wait: WaitPolicy,
    pub api_endpoint: Option<String>,
}

impl ImportSettings {
    pub fn new(tenant: TenantConfig) -> Self {
        Self {
            tenant,
            header: HeaderMatcher::default(),
            delimiter: DEFAULT_DELIMITER,
            archive_suffix: DEFAULT_ARCHIVE_SUFFIX.to_string(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            wait: WaitPolicy::default(),
            api_endpoint: None,
        }
    }

    /// Parses the tenant file definition JSON (`FILE_DEF`).
    pub fn parse_file_def(file_def: &str) -> Result<TenantConfig> {
        let tenant: TenantConfig =
            serde_json::from_str(file_def).map_err(|e| ImportError::ConfigError {
                message: format!("Unable to parse file definition {}: {}", file_def, e),
            })?;
        tenant.validate()?;
        Ok(tenant)
    }

    pub fn delivery(&self) -> Box<dyn Delivery> {
        match &self.api_endpoint {
            Some(endpoint) => Box::new(HttpDelivery::new(endpoint.clone())),
            None => Box::new(LogDelivery),
        }
    }
}

impl Validate for TenantConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("companyID", &self.tenant_id)
    }
}

impl Validate for ImportSettings {
    fn validate(&self) -> Result<()> {
        self.tenant.validate()?;
        validate_non_empty_string("archive_suffix", &self.archive_suffix)?;
        validate_path("work_dir", &self.work_dir.to_string_lossy())?;
        if let Some(endpoint) = &self.api_endpoint {
            validate_url("api_endpoint", endpoint)?;
        }
        if self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(ImportError::InvalidConfigValueError {
                field: "delimiter".to_string(),
                value: self.delimiter.escape_default().to_string(),
                reason: "Delimiter cannot be a line terminator".to_string(),
            });
        }
        if self.wait.timeout.is_zero() || self.wait.initial_delay.is_zero() {
            return Err(ImportError::InvalidConfigValueError {
                field: "archive_wait".to_string(),
                value: format!("{:?}", self.wait),
                reason: "Wait timeout and initial delay must be positive".to_string(),
            });
        }
        if self.wait.max_delay < self.wait.initial_delay {
            return Err(ImportError::InvalidConfigValueError {
                field: "archive_wait".to_string(),
                value: format!("{:?}", self.wait),
                reason: "Maximum wait delay cannot be shorter than the initial delay".to_string(),
            });
        }
        if let HeaderMatcher::Prefix(marker) = &self.header {
            validate_non_empty_string("header_prefix", marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_DEF: &str = r#"{"companyID":"ACME","columns":{"transactionID":0,"transactionDate":1,"firstName":2,"lastName":3}}"#;

    #[test]
    fn test_parse_file_def() {
        let tenant = ImportSettings::parse_file_def(FILE_DEF).unwrap();
        assert_eq!(tenant.tenant_id, "ACME");
        assert_eq!(tenant.columns.last_name, 3);
    }

    #[test]
    fn test_parse_file_def_rejects_bad_input() {
        for bad in [
            r#"{"columns":{"transactionID":0,"transactionDate":1,"firstName":2,"lastName":3}}"#,
            r#"{"companyID":"ACME","columns":{"transactionID":"zero","transactionDate":1,"firstName":2,"lastName":3}}"#,
            r#"{"companyID":"ACME","columns":{"transactionID":-1,"transactionDate":1,"firstName":2,"lastName":3}}"#,
            r#"{"companyID":"","columns":{"transactionID":0,"transactionDate":1,"firstName":2,"lastName":3}}"#,
            "not json",
        ] {
            let err = ImportSettings::parse_file_def(bad).unwrap_err();
            assert!(err.is_fatal(), "{} should be a configuration error", bad);
        }
    }

    #[test]
    fn test_delivery_selection() {
        let tenant = ImportSettings::parse_file_def(FILE_DEF).unwrap();
        let mut settings = ImportSettings::new(tenant);
        assert!(settings.validate().is_ok());

        settings.api_endpoint = Some("ftp://example.com".to_string());
        assert!(settings.validate().is_err());

        settings.api_endpoint = Some("https://api.example.com/records".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_wait_timeout_is_invalid() {
        let tenant = ImportSettings::parse_file_def(FILE_DEF).unwrap();
        let mut settings = ImportSettings::new(tenant);
        settings.wait.timeout = std::time::Duration::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_max_delay_below_initial_delay_is_invalid() {
        let tenant = ImportSettings::parse_file_def(FILE_DEF).unwrap();
        let mut settings = ImportSettings::new(tenant);
        settings.wait = WaitPolicy {
            timeout: std::time::Duration::from_millis(200),
            initial_delay: std::time::Duration::from_millis(50),
            max_delay: std::time::Duration::ZERO,
        };
        let err = settings.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("archive_wait"));

        settings.wait.max_delay = std::time::Duration::from_millis(50);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_header_prefix_is_invalid() {
        let tenant = ImportSettings::parse_file_def(FILE_DEF).unwrap();
        let mut settings = ImportSettings::new(tenant);
        settings.header = HeaderMatcher::prefix("");
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("header_prefix"));

        settings.header = HeaderMatcher::prefix("txn");
        assert!(settings.validate().is_ok());
    }
}
