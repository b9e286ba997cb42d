use crate::recorder::TestResult;
use crate::registry::CleanupReport;
use crate::scenario::RunOutcome;
use crate::summary::RunSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Machine-readable record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scenarios: Vec<String>,
    pub summary: RunSummary,
    pub results: Vec<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
}

impl RunReport {
    pub fn new(base_url: impl Into<String>, outcome: &RunOutcome, summary: RunSummary) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            base_url: base_url.into(),
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            scenarios: outcome.scenarios.clone(),
            summary,
            results: outcome.results.clone(),
            cleanup: outcome.cleanup.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes pretty JSON to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let io_error = |source: std::io::Error| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_json()?).map_err(io_error)?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}
