use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::model::Phase;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field} is not set")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unable to download {bucket}/{key}: {source}")]
    DownloadError {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Unable to list bucket {bucket} with prefix {prefix:?}: {source}")]
    ListError {
        bucket: String,
        prefix: String,
        #[source]
        source: StoreError,
    },

    #[error("Unable to open file {}: {source}", .path.display())]
    FileAccessError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error on scan of file {}: {source}", .file.display())]
    ScanError {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line: column index {index} is out of range for {field_count} fields")]
    MalformedLineError { index: usize, field_count: usize },

    #[error("Delivery failed: {message}")]
    DeliveryError { message: String },

    #[error("Unable to archive {bucket}/{key}: {failure}")]
    ArchiveError {
        bucket: String,
        key: String,
        #[source]
        failure: ArchiveFailure,
    },

    #[error("Deadline exceeded during {phase}")]
    DeadlineExceeded { phase: Phase },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// The step of an archive move that did not complete.
#[derive(Error, Debug)]
pub enum ArchiveFailure {
    #[error("copy to {destination} failed: {source}")]
    Copy {
        destination: String,
        #[source]
        source: StoreError,
    },

    #[error("{location} did not reach the expected state within {waited:?}")]
    ConfirmTimeout { location: String, waited: Duration },

    #[error("delete failed: {source}")]
    Delete {
        #[source]
        source: StoreError,
    },
}

/// Failures reported by an object store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("access denied to {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    #[error("{operation} request failed: {message}")]
    Request { operation: String, message: String },

    #[error("local store IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    Data,
    Delivery,
    Timeout,
}

impl ImportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::ConfigError { .. }
            | ImportError::MissingConfigError { .. }
            | ImportError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ImportError::DownloadError { .. }
            | ImportError::ListError { .. }
            | ImportError::ArchiveError { .. } => ErrorCategory::Storage,
            ImportError::FileAccessError { .. }
            | ImportError::ScanError { .. }
            | ImportError::MalformedLineError { .. }
            | ImportError::SerializationError(_) => ErrorCategory::Data,
            ImportError::DeliveryError { .. } | ImportError::ApiError(_) => {
                ErrorCategory::Delivery
            }
            ImportError::DeadlineExceeded { .. } => ErrorCategory::Timeout,
        }
    }

    /// Configuration errors abort an invocation before any storage access
    /// and are never worth re-delivering.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
