//! Progress hooks for pipeline runs
//!
//! Observers see stage events as they happen. Contributions are still
//! returned by the controller; an observer is never the only copy.

use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::models::StageContribution;
use crate::pipeline::Stage;

pub trait PipelineObserver: Send + Sync {
    fn on_stage_started(&self, _stage: &Stage, _position: usize, _total: usize) {}

    fn on_stage_completed(&self, contribution: &StageContribution);

    fn on_stage_failed(&self, _stage: &Stage, _error: &AnalysisError) {}
}

/// Default observer: one log line per stage event
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl PipelineObserver for LoggingObserver {
    fn on_stage_started(&self, stage: &Stage, position: usize, total: usize) {
        info!(stage = %stage.name, position, total, "Stage started");
    }

    fn on_stage_completed(&self, contribution: &StageContribution) {
        info!(
            stage = %contribution.stage,
            elapsed_ms = contribution.elapsed_ms,
            chars = contribution.text.chars().count(),
            "Stage completed"
        );
    }

    fn on_stage_failed(&self, stage: &Stage, error: &AnalysisError) {
        warn!(stage = %stage.name, error = %error, "Stage failed");
    }
}
