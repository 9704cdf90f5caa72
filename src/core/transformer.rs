use crate::core::mapper::map_fields;
use crate::domain::model::{Payload, SkippedLine, TenantConfig, TransformResult};
use crate::utils::error::{ImportError, Result};
use regex::Regex;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const DEFAULT_HEADER_PREFIX: &str = "transaction";
pub const DEFAULT_DELIMITER: char = ',';

/// Decides whether a line is a header row that must not be mapped.
#[derive(Debug, Clone)]
pub enum HeaderMatcher {
    /// Case-insensitive prefix. Stored lowercased.
    Prefix(String),
    Pattern(Regex),
}

impl HeaderMatcher {
    pub fn prefix(marker: &str) -> Self {
        HeaderMatcher::Prefix(marker.to_lowercase())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(HeaderMatcher::Pattern)
            .map_err(|e| ImportError::InvalidConfigValueError {
                field: "header_pattern".to_string(),
                value: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn is_header(&self, line: &str) -> bool {
        match self {
            HeaderMatcher::Prefix(marker) => {
                let mut chars = line.chars().flat_map(char::to_lowercase);
                marker.chars().all(|m| chars.next() == Some(m))
            }
            HeaderMatcher::Pattern(regex) => regex.is_match(line),
        }
    }
}

impl Default for HeaderMatcher {
    fn default() -> Self {
        HeaderMatcher::prefix(DEFAULT_HEADER_PREFIX)
    }
}

#[derive(Debug, Clone)]
pub struct FileTransformer {
    header: HeaderMatcher,
    delimiter: char,
}

impl FileTransformer {
    pub fn new(header: HeaderMatcher, delimiter: char) -> Self {
        Self { header, delimiter }
    }

    /// Reads `path` line by line and maps every non-header line into the
    /// payload, in file order.
    ///
    /// Lines whose configured columns are out of range are skipped and
    /// reported in [`TransformResult::skipped`]. A read error aborts the
    /// whole file.
    pub async fn transform(&self, path: &Path, tenant: &TenantConfig) -> Result<TransformResult> {
        let file = File::open(path)
            .await
            .map_err(|source| ImportError::FileAccessError {
                path: path.to_path_buf(),
                source,
            })?;

        let mut lines = BufReader::new(file).lines();
        let mut payload = Payload::new(tenant.tenant_id.clone());
        let mut skipped = Vec::new();
        let mut line_number = 0;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(source) => {
                    return Err(ImportError::ScanError {
                        file: path.to_path_buf(),
                        source,
                    })
                }
            };
            line_number += 1;

            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.is_empty() {
                continue;
            }
            if self.header.is_header(line) {
                tracing::debug!(line_number, "Skipping header line");
                continue;
            }

            let fields: Vec<&str> = line.split(self.delimiter).collect();
            match map_fields(&fields, &tenant.columns) {
                Ok(record) => payload.records.push(record),
                Err(e) => {
                    tracing::warn!(file = %path.display(), line_number, "Skipping line: {}", e);
                    skipped.push(SkippedLine {
                        line_number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            "Transformed {} records from {} ({} skipped)",
            payload.records.len(),
            path.display(),
            skipped.len()
        );

        Ok(TransformResult { payload, skipped })
    }
}

impl Default for FileTransformer {
    fn default() -> Self {
        Self::new(HeaderMatcher::default(), DEFAULT_DELIMITER)
    }
}
