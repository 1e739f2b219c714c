//! Error types for the banking analysis orchestrator
//!
//! Two channels:
//! - [`AnalysisError`] is fatal to a run (or to startup).
//! - [`Fetched`] carries data that may have come from a fallback path.
//!   Resolvers return it instead of an error when an external source is down.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::StageContributions;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {

    // =============================
    // Fail-fast errors (before a run)
    // =============================

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // Run-fatal errors
    // =============================

    #[error("Stage '{stage}' failed (last completed: {}): {reason}", display_last(.last_completed))]
    StageFailed {
        stage: String,
        last_completed: Option<String>,
        reason: String,
    },

    #[error("Stage '{stage}' exceeded the {}s budget (last completed: {})", secs(.limit), display_last(.last_completed))]
    Timeout {
        stage: String,
        last_completed: Option<String>,
        limit: Duration,
    },

    #[error("Run cancelled (last completed: {})", display_last(.last_completed))]
    Cancelled { last_completed: Option<String> },

    // =============================
    // External collaborators
    // =============================

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Policy search error: {0}")]
    Search(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_last(last: &Option<String>) -> &str {
    last.as_deref().unwrap_or("none")
}

fn secs(limit: &Duration) -> f64 {
    limit.as_secs_f64()
}

/// Coarse classification used by the interaction log and the HTTP layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    InvalidInput,
    StageFailure,
    Timeout,
    Cancelled,
    External,
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::Configuration(_) => FailureKind::Configuration,
            AnalysisError::InvalidInput(_) => FailureKind::InvalidInput,
            AnalysisError::StageFailed { .. } => FailureKind::StageFailure,
            AnalysisError::Timeout { .. } => FailureKind::Timeout,
            AnalysisError::Cancelled { .. } => FailureKind::Cancelled,
            _ => FailureKind::External,
        }
    }

    /// Name of the stage a run-fatal error points at, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            AnalysisError::StageFailed { stage, .. } | AnalysisError::Timeout { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }
}

/// A pipeline run that did not complete.
///
/// Contributions collected before the abort are kept for diagnostics.
#[derive(Debug)]
pub struct PipelineAbort {
    pub error: AnalysisError,
    pub partial: StageContributions,
}

impl From<PipelineAbort> for AnalysisError {
    fn from(abort: PipelineAbort) -> Self {
        abort.error
    }
}

impl std::fmt::Display for PipelineAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} partial contribution(s))",
            self.error,
            self.partial.len()
        )
    }
}

/// Value obtained from an external collaborator, or a safe substitute.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Live(T),
    Fallback { value: T, reason: String },
}

impl<T> Fetched<T> {
    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Fetched::Fallback {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Fetched::Live(_) => None,
            Fetched::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Fetched::Live(value) | Fetched::Fallback { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Fetched::Live(value) | Fetched::Fallback { value, .. } => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let timeout = AnalysisError::Timeout {
            stage: "fraud_analyst".to_string(),
            last_completed: Some("data_gatherer".to_string()),
            limit: Duration::from_secs(180),
        };
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert_eq!(timeout.stage(), Some("fraud_analyst"));

        let failed = AnalysisError::StageFailed {
            stage: "loan_analyst".to_string(),
            last_completed: None,
            reason: "boom".to_string(),
        };
        assert_eq!(failed.kind(), FailureKind::StageFailure);
        assert!(failed.to_string().contains("last completed: none"));

        assert_eq!(
            AnalysisError::Search("down".into()).kind(),
            FailureKind::External
        );
    }

    #[test]
    fn test_fetched_accessors() {
        let live = Fetched::Live(3);
        assert!(!live.is_degraded());
        assert_eq!(live.reason(), None);

        let fallback = Fetched::fallback(0, "source offline");
        assert!(fallback.is_degraded());
        assert_eq!(fallback.reason(), Some("source offline"));
        assert_eq!(fallback.into_inner(), 0);
    }
}
