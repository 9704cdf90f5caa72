use crate::config::{ImportSettings, DEFAULT_WORK_DIR};
use crate::core::mover::{WaitPolicy, DEFAULT_ARCHIVE_SUFFIX};
use crate::core::transformer::{HeaderMatcher, DEFAULT_HEADER_PREFIX};
use crate::utils::error::{ImportError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runs the importer against a directory-backed object store.
#[derive(Debug, Clone, Parser)]
#[command(name = "ftp-import")]
#[command(about = "Import delimited transaction files into the records API")]
pub struct CliConfig {
    /// Directory holding one sub-directory per bucket
    #[arg(long, default_value = "./buckets")]
    pub store_root: PathBuf,

    /// Tenant file definition JSON
    #[arg(long)]
    pub file_def: String,

    #[arg(long)]
    pub bucket: String,

    /// Object key to import; repeat for several files
    #[arg(long = "key")]
    pub keys: Vec<String>,

    /// Import every object in the bucket under --prefix instead of --key
    #[arg(long, conflicts_with = "keys")]
    pub scan: bool,

    /// Listing prefix for --scan; defaults to the company ID
    #[arg(long, requires = "scan")]
    pub prefix: Option<String>,

    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Downstream endpoint; payloads are only logged when omitted
    #[arg(long)]
    pub api_endpoint: Option<String>,

    #[arg(long, default_value = DEFAULT_HEADER_PREFIX)]
    pub header_prefix: String,

    /// Regex that identifies header lines; overrides --header-prefix
    #[arg(long)]
    pub header_pattern: Option<String>,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    #[arg(long, default_value = DEFAULT_ARCHIVE_SUFFIX)]
    pub archive_suffix: String,

    #[arg(long, default_value_t = 30)]
    pub wait_timeout_secs: u64,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn settings(&self) -> Result<ImportSettings> {
        if !self.scan && self.keys.is_empty() {
            return Err(ImportError::ConfigError {
                message: "Either --key or --scan is required".to_string(),
            });
        }

        let tenant = ImportSettings::parse_file_def(&self.file_def)?;
        let header = match &self.header_pattern {
            Some(pattern) => HeaderMatcher::pattern(pattern)?,
            None => HeaderMatcher::prefix(&self.header_prefix),
        };

        Ok(ImportSettings {
            tenant,
            header,
            delimiter: self.delimiter,
            archive_suffix: self.archive_suffix.clone(),
            work_dir: self.work_dir.clone(),
            wait: WaitPolicy {
                timeout: Duration::from_secs(self.wait_timeout_secs),
                ..WaitPolicy::default()
            },
            api_endpoint: self.api_endpoint.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;

    const FILE_DEF: &str = r#"{"companyID":"ACME","columns":{"transactionID":0,"transactionDate":1,"firstName":2,"lastName":3}}"#;

    #[test]
    fn test_parse_single_key() {
        let config = CliConfig::try_parse_from([
            "ftp-import",
            "--file-def",
            FILE_DEF,
            "--bucket",
            "in-bucket",
            "--key",
            "a.csv",
            "--delimiter",
            ";",
        ])
        .unwrap();

        assert_eq!(config.keys, vec!["a.csv".to_string()]);
        let settings = config.settings().unwrap();
        assert_eq!(settings.delimiter, ';');
        assert_eq!(settings.archive_suffix, "-archive");
        assert_eq!(settings.wait.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_scan_conflicts_with_key() {
        assert!(CliConfig::try_parse_from([
            "ftp-import",
            "--file-def",
            FILE_DEF,
            "--bucket",
            "in-bucket",
            "--key",
            "a.csv",
            "--scan",
        ])
        .is_err());
    }

    #[test]
    fn test_key_or_scan_required() {
        let config = CliConfig::try_parse_from([
            "ftp-import",
            "--file-def",
            FILE_DEF,
            "--bucket",
            "in-bucket",
        ])
        .unwrap();
        assert!(config.settings().unwrap_err().is_fatal());
    }

    #[test]
    fn test_empty_header_prefix_is_rejected() {
        let config = CliConfig::try_parse_from([
            "ftp-import",
            "--file-def",
            FILE_DEF,
            "--bucket",
            "in-bucket",
            "--key",
            "a.csv",
            "--header-prefix",
            "",
        ])
        .unwrap();
        let err = config.settings().unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("header_prefix"));
    }
}
