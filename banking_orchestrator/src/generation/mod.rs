//! Generation capability
//!
//! Each stage's narrative comes from an opaque generator. The pipeline only
//! forwards context to it and collects the text it returns.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::context::ContextBundle;
use crate::error::AnalysisError;
use crate::models::StageContributions;
use crate::pipeline::Stage;
use crate::Result;

pub mod gemini;
pub use gemini::GeminiGenerator;

/// Trait for stage text generation (LLM controlled)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the stage's output from the shared context and earlier stages.
    async fn generate(
        &self,
        stage: &Stage,
        context: &ContextBundle,
        prior: &StageContributions,
    ) -> Result<String>;
}

/// Deterministic generator for development & testing
/// Keeps the pipeline functional without an LLM dependency
#[derive(Debug, Default)]
pub struct MockGenerator {
    fail_on: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error when asked to run `stage`.
    pub fn failing_on(mut self, stage: &str) -> Self {
        self.fail_on = Some(stage.to_string());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of generate calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        stage: &Stage,
        context: &ContextBundle,
        prior: &StageContributions,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_on.as_deref() == Some(stage.name.as_str()) {
            return Err(AnalysisError::Generation(format!(
                "mock failure for stage {}",
                stage.name
            )));
        }

        let mut text = format!(
            "[{}] Analysis for customer {} regarding \"{}\": {} transaction(s) and {} policy excerpt(s) reviewed.",
            stage.name,
            context.profile.customer_id,
            context.query,
            context.transactions.len(),
            context.excerpts.len()
        );

        if !prior.is_empty() {
            text.push_str(&format!(
                " Builds on: {}.",
                prior.names().collect::<Vec<_>>().join(", ")
            ));
        }

        Ok(text)
    }
}
