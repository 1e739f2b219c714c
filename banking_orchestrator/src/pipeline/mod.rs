//! Stage pipeline controller
//!
//! Stages run strictly in order against one immutable context bundle.
//! The first failure, timeout or cancellation ends the run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ContextBundle;
use crate::error::{AnalysisError, PipelineAbort};
use crate::generation::Generator;
use crate::models::{StageContribution, StageContributions};

pub mod observer;
pub mod stages;

pub use observer::{LoggingObserver, PipelineObserver};
pub use stages::{default_stages, Stage, StagePlan};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Budget for the whole run, measured from its first stage
    pub global_timeout: Duration,
    /// Budget for a single generation call
    pub stage_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            global_timeout: Duration::from_secs(180),
            stage_timeout: Duration::from_secs(90),
        }
    }
}

pub struct PipelineController {
    config: PipelineConfig,
}

impl PipelineController {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage of `plan` in order.
    ///
    /// Each call gets the shared bundle plus everything completed so far.
    /// On abort the error names the stage involved and the last stage that
    /// finished, and the contributions collected so far travel with it.
    pub async fn run(
        &self,
        plan: &StagePlan,
        context: &ContextBundle,
        generator: &dyn Generator,
        observer: Option<&dyn PipelineObserver>,
        cancel: &CancellationToken,
    ) -> std::result::Result<StageContributions, PipelineAbort> {
        let started = Instant::now();
        let deadline = started + self.config.global_timeout;
        let total = plan.len();
        let mut contributions = StageContributions::new();

        debug!(stages = total, "Starting pipeline run");

        for (position, stage) in plan.iter().enumerate() {
            let last_completed = contributions.last().map(|c| c.stage.clone());

            if cancel.is_cancelled() {
                return Err(abort(
                    AnalysisError::Cancelled { last_completed },
                    contributions,
                ));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(abort(
                    AnalysisError::Timeout {
                        stage: stage.name.clone(),
                        last_completed,
                        limit: self.config.global_timeout,
                    },
                    contributions,
                ));
            }

            // Whichever budget runs out first is the one reported
            let (budget, limit) = if self.config.stage_timeout < remaining {
                (self.config.stage_timeout, self.config.stage_timeout)
            } else {
                (remaining, self.config.global_timeout)
            };

            if let Some(observer) = observer {
                observer.on_stage_started(stage, position + 1, total);
            }

            let stage_start = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AnalysisError::Cancelled {
                    last_completed: last_completed.clone(),
                }),
                result = tokio::time::timeout(budget, generator.generate(stage, context, &contributions)) => {
                    match result {
                        Err(_) => Err(AnalysisError::Timeout {
                            stage: stage.name.clone(),
                            last_completed: last_completed.clone(),
                            limit,
                        }),
                        Ok(Err(e)) => Err(AnalysisError::StageFailed {
                            stage: stage.name.clone(),
                            last_completed: last_completed.clone(),
                            reason: e.to_string(),
                        }),
                        Ok(Ok(text)) if text.trim().is_empty() => Err(AnalysisError::StageFailed {
                            stage: stage.name.clone(),
                            last_completed: last_completed.clone(),
                            reason: "generator returned an empty response".to_string(),
                        }),
                        Ok(Ok(text)) => Ok(text),
                    }
                }
            };

            let text = match outcome {
                Ok(text) => text,
                Err(error) => {
                    if let Some(observer) = observer {
                        observer.on_stage_failed(stage, &error);
                    }
                    return Err(abort(error, contributions));
                }
            };

            let contribution = StageContribution {
                stage: stage.name.clone(),
                text,
                completed_at: Utc::now(),
                elapsed_ms: stage_start.elapsed().as_millis() as u64,
            };

            if let Some(observer) = observer {
                observer.on_stage_completed(&contribution);
            }

            if let Err(error) = contributions.insert(contribution) {
                return Err(abort(error, contributions));
            }
        }

        info!(
            stages = contributions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run completed"
        );

        Ok(contributions)
    }
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

fn abort(error: AnalysisError, partial: StageContributions) -> PipelineAbort {
    debug!(error = %error, completed = partial.len(), "Pipeline run aborted");
    PipelineAbort { error, partial }
}
