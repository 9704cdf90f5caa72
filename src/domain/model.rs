use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Per-tenant file definition, supplied as JSON at invocation start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(rename = "companyID")]
    pub tenant_id: String,
    pub columns: ColumnIndex,
}

/// Zero-based positions of each record field within a split line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIndex {
    #[serde(rename = "transactionID")]
    pub transaction_id: usize,
    #[serde(rename = "transactionDate")]
    pub transaction_date: usize,
    #[serde(rename = "firstName")]
    pub first_name: usize,
    #[serde(rename = "lastName")]
    pub last_name: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
    #[serde(rename = "transactionDate")]
    pub transaction_date: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeader {
    #[serde(rename = "companyID")]
    pub tenant_id: String,
}

/// The JSON document handed to the downstream API for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub header: PayloadHeader,
    #[serde(rename = "record")]
    pub records: Vec<Record>,
}

impl Payload {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            header: PayloadHeader {
                tenant_id: tenant_id.into(),
            },
            records: Vec::new(),
        }
    }
}

/// A file-arrival event naming one object to import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNotification {
    pub source_system: String,
    pub event_time: Option<DateTime<Utc>>,
    pub bucket: String,
    pub key: String,
}

impl FileNotification {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            source_system: "local".to_string(),
            event_time: None,
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// An object being imported and the local copy it was downloaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub bucket: String,
    pub key: String,
    pub local_path: PathBuf,
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub reason: String,
}

/// Result of transforming one local file.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub payload: Payload,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Archived,
    AlreadyArchived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetch,
    Transform,
    Deliver,
    Archive,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::Transform => "transform",
            Phase::Deliver => "deliver",
            Phase::Archive => "archive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Succeeded {
        records: usize,
        skipped_lines: usize,
        archive: ArchiveOutcome,
    },
    Failed {
        phase: Phase,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub bucket: String,
    pub key: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FileOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvocationSummary {
    pub files: Vec<FileReport>,
}

impl InvocationSummary {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(FileReport::is_success)
    }
}
