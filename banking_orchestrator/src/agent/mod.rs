//! Main orchestrator - one analysis run end to end
//!
//! PROFILE → POLICIES → CONTEXT → STAGES → SCORE → REPORT → LOG

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{compute_context_hash, InteractionLog, InteractionMetrics};
use crate::config::AppConfig;
use crate::context::ContextAssembler;
use crate::error::{AnalysisError, PipelineAbort};
use crate::generation::Generator;
use crate::models::{AnalysisReport, InteractionOutcome};
use crate::pipeline::{LoggingObserver, PipelineController, PipelineObserver, Stage, StagePlan};
use crate::policy::{
    InMemoryDocumentStore, KeywordPolicyIndex, PolicyLibrary, PolicyRetriever,
    POLICY_COLLECTIONS,
};
use crate::profile::{PostgresProfileSource, ProfileResolver, ProfileSource};
use crate::report::{ReportSynthesizer, SynthesisInput};
use crate::risk;
use crate::Result;

/// One customer, one query
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub customer_id: String,
    pub query: String,
    /// Tenure is measured against this; defaults to now
    pub reference_time: Option<DateTime<Utc>>,
    pub cancel: Option<CancellationToken>,
}

impl AnalysisRequest {
    pub fn new(customer_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            query: query.into(),
            reference_time: None,
            cancel: None,
        }
    }

    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Main orchestrator that coordinates the entire workflow
pub struct Orchestrator {
    plan: StagePlan,
    generator: Arc<dyn Generator>,
    profiles: ProfileResolver,
    policies: PolicyRetriever,
    collections: Vec<String>,
    top_k: usize,
    assembler: ContextAssembler,
    controller: PipelineController,
    synthesizer: ReportSynthesizer,
    observer: Arc<dyn PipelineObserver>,
    interaction_log: InteractionLog,
}

impl Orchestrator {
    /// Fails with a configuration error if `stages` is not a valid plan.
    pub fn new(
        stages: Vec<Stage>,
        generator: Arc<dyn Generator>,
        profiles: ProfileResolver,
        policies: PolicyRetriever,
        library: &PolicyLibrary,
        config: &AppConfig,
    ) -> Result<Self> {
        let plan = StagePlan::new(stages)?;

        Ok(Self {
            plan,
            generator,
            profiles,
            policies,
            collections: POLICY_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            top_k: config.retrieval.top_k,
            assembler: ContextAssembler::new(config.context.clone(), library.summary()),
            controller: PipelineController::new(config.pipeline.clone()),
            synthesizer: ReportSynthesizer::default(),
            observer: Arc::new(LoggingObserver),
            interaction_log: InteractionLog::new(),
        })
    }

    /// Wire the default stack from configuration.
    ///
    /// A database that cannot be reached is logged and skipped; sample
    /// profiles are served instead.
    pub async fn from_config(config: &AppConfig, use_mock: bool) -> Result<Self> {
        let generator = config.generator(use_mock)?;
        let fetch_timeout = config.retrieval.fetch_timeout;

        let source: Option<Arc<dyn ProfileSource>> = match &config.database_url {
            Some(url) => match PostgresProfileSource::connect(url, fetch_timeout).await {
                Ok(source) => Some(Arc::new(source)),
                Err(e) => {
                    warn!(error = %e, "Profile database unavailable; using sample profiles");
                    None
                }
            },
            None => None,
        };

        let store = InMemoryDocumentStore::with_samples();
        let library = PolicyLibrary::load(&store).await.into_inner();
        let index = KeywordPolicyIndex::build(&store).await?;

        Self::new(
            crate::pipeline::default_stages(),
            generator,
            ProfileResolver::new(source, fetch_timeout),
            PolicyRetriever::new(Arc::new(index), fetch_timeout),
            &library,
            config,
        )
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_interaction_log(mut self, log: InteractionLog) -> Self {
        self.interaction_log = log;
        self
    }

    pub fn stage_plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn interaction_log(&self) -> &InteractionLog {
        &self.interaction_log
    }

    pub async fn run_analysis(&self, customer_id: &str, query: &str) -> Result<AnalysisReport> {
        self.run_analysis_with(AnalysisRequest::new(customer_id, query))
            .await
    }

    /// Run one analysis. Every run that gets past input validation leaves
    /// exactly one interaction record, success or failure.
    pub async fn run_analysis_with(&self, request: AnalysisRequest) -> Result<AnalysisReport> {
        let customer_id = request.customer_id.trim();
        let query = request.query.trim();

        if customer_id.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "customer_id must not be empty".to_string(),
            ));
        }
        if query.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let start_time = Instant::now();
        let reference_time = request.reference_time.unwrap_or_else(Utc::now);
        let cancel = request.cancel.unwrap_or_default();

        info!(customer_id = %customer_id, query = %query, "Analysis run started");

        // === PROFILE ===
        let mut degraded_notes = Vec::new();
        let resolved = self.profiles.resolve(customer_id).await;
        if let Some(reason) = resolved.reason() {
            degraded_notes.push(reason.to_string());
        }
        let profile = resolved.into_inner();

        if let Err(e) = profile.validate() {
            return Err(self.record_failure(customer_id, query, e, 0).await);
        }

        // === POLICIES ===
        let searched = self
            .policies
            .search(query, &self.collections, self.top_k)
            .await;
        if let Some(reason) = searched.reason() {
            degraded_notes.push(reason.to_string());
        }
        let excerpts = searched.into_inner();

        // === CONTEXT ===
        let bundle = self.assembler.assemble(&profile, &excerpts, query);
        let context_hash = compute_context_hash(&bundle);

        debug!(
            customer_id = %customer_id,
            transactions = bundle.transactions.len(),
            excerpts = bundle.excerpts.len(),
            context_hash = %context_hash,
            "Context assembled"
        );

        // === STAGES ===
        let contributions = match self
            .controller
            .run(
                &self.plan,
                &bundle,
                self.generator.as_ref(),
                Some(self.observer.as_ref()),
                &cancel,
            )
            .await
        {
            Ok(contributions) => contributions,
            Err(PipelineAbort { error, partial }) => {
                return Err(self
                    .record_failure(customer_id, query, error, partial.len())
                    .await);
            }
        };

        // === SCORE ===
        let assessment = risk::assess(&profile, reference_time);
        for factor in &assessment.factors {
            debug!(
                factor = factor.name,
                observed = %factor.observed,
                adjustment = factor.adjustment,
                "Risk factor"
            );
        }

        // === REPORT ===
        let narrative = contributions
            .get(&self.plan.last().name)
            .map(|c| c.text.clone())
            .unwrap_or_default();
        let stage_durations_ms: BTreeMap<String, u64> = contributions
            .iter()
            .map(|c| (c.stage.clone(), c.elapsed_ms))
            .collect();
        let elapsed = start_time.elapsed();

        let report = self.synthesizer.synthesize(SynthesisInput {
            profile: &profile,
            query,
            excerpts: &excerpts,
            contributions,
            risk_score: assessment.score,
            narrative,
            elapsed,
            degraded_notes: &degraded_notes,
            context_hash: context_hash.clone(),
        });

        // === LOG ===
        self.interaction_log
            .record(
                customer_id,
                query,
                InteractionOutcome::Completed {
                    report_id: report.report_id.clone(),
                    risk_score: report.risk_score,
                    risk_tier: report.risk_assessment,
                    processing_time_ms: millis(elapsed),
                    stage_durations_ms,
                    context_hash,
                },
            )
            .await;

        info!(
            customer_id = %customer_id,
            report_id = %report.report_id,
            risk_score = report.risk_score,
            elapsed_ms = millis(elapsed),
            "Analysis run completed"
        );

        Ok(report)
    }

    pub async fn get_metrics(&self) -> InteractionMetrics {
        self.interaction_log.metrics().await
    }

    async fn record_failure(
        &self,
        customer_id: &str,
        query: &str,
        error: AnalysisError,
        completed_stages: usize,
    ) -> AnalysisError {
        warn!(
            customer_id = %customer_id,
            error = %error,
            completed_stages,
            "Analysis run failed"
        );

        self.interaction_log
            .record(
                customer_id,
                query,
                InteractionOutcome::Failed {
                    kind: error.kind(),
                    reason: error.to_string(),
                    failed_stage: error.stage().map(str::to_string),
                    completed_stages,
                },
            )
            .await;

        error
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use crate::error::FailureKind;
    use crate::generation::MockGenerator;
    use crate::models::RiskTier;
    use crate::pipeline::default_stages;
    use chrono::TimeZone;

    async fn orchestrator_with(generator: Arc<dyn Generator>, config: &AppConfig) -> Orchestrator {
        let store = InMemoryDocumentStore::with_samples();
        let library = PolicyLibrary::load(&store).await.into_inner();
        let index = KeywordPolicyIndex::build(&store).await.unwrap();

        Orchestrator::new(
            default_stages(),
            generator,
            ProfileResolver::offline(),
            PolicyRetriever::new(Arc::new(index), Duration::from_secs(5)),
            &library,
            config,
        )
        .unwrap()
    }

    fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_orchestrator_run() {
        let generator = Arc::new(MockGenerator::new());
        let orchestrator = orchestrator_with(generator.clone(), &AppConfig::default()).await;

        let report = assert_ok!(orchestrator
            .run_analysis_with(
                AnalysisRequest::new("12345", "Review my account for suspicious activity")
                    .with_reference_time(reference_time()),
            )
            .await);

        assert_eq!(generator.calls(), 6);
        assert_eq!(report.stage_contributions.len(), 6);
        assert!(report.summary.starts_with("[synthesis_coordinator]"));
        assert!(!report.key_findings.is_empty());
        assert!(report.recommendations.len() >= 2);
        assert_eq!(report.context_hash.len(), 64);
        // 0.17 from the profile plus the 5+ year tenure adjustment
        assert_eq!(report.risk_score, 0.07);
        assert_eq!(report.risk_assessment, RiskTier::Low);

        let records = orchestrator.interaction_log().for_customer("12345").await;
        assert_eq!(records.len(), 1);
        assert!(records[0].outcome.is_success());
    }

    struct WidePolicySearch;

    #[async_trait::async_trait]
    impl crate::policy::PolicySearch for WidePolicySearch {
        async fn search(
            &self,
            _query: &str,
            _collections: &[String],
            top_k: usize,
        ) -> Result<Vec<crate::models::PolicyExcerpt>> {
            Ok((0..top_k)
                .map(|i| crate::models::PolicyExcerpt {
                    source: format!("policy_{}.txt", i),
                    collection: "compliance".to_string(),
                    relevance: 1.0 - i as f64 * 0.1,
                    text: format!("Rule {}", i),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_report_counts_every_retrieved_excerpt() {
        let generator = Arc::new(MockGenerator::new());
        let config = AppConfig::default();
        assert_eq!(config.retrieval.top_k, 8);

        let orchestrator = Orchestrator::new(
            default_stages(),
            generator.clone(),
            ProfileResolver::offline(),
            PolicyRetriever::new(Arc::new(WidePolicySearch), Duration::from_secs(5)),
            &PolicyLibrary::empty(),
            &config,
        )
        .unwrap();

        let report = assert_ok!(orchestrator.run_analysis("12345", "compliance review").await);

        // The prompt context is capped at 6; the report is not
        assert_eq!(config.context.max_excerpts, 6);
        assert_eq!(report.processing_metrics.search_results_analyzed, 8);
        assert_eq!(report.processing_metrics.policies_referenced, 8);
        assert_eq!(report.policy_references.len(), 8);
        assert!(report.policy_references.contains("policy_7.txt"));
    }

    #[tokio::test]
    async fn test_stage_failure_records_one_failure() {
        let generator = Arc::new(MockGenerator::new().failing_on("loan_analyst"));
        let orchestrator = orchestrator_with(generator.clone(), &AppConfig::default()).await;

        let err = assert_err!(orchestrator
            .run_analysis("67890", "Am I eligible for a loan?")
            .await);

        assert_eq!(err.kind(), FailureKind::StageFailure);
        assert_eq!(err.stage(), Some("loan_analyst"));
        assert_eq!(generator.calls(), 3);

        let records = orchestrator.interaction_log().for_customer("67890").await;
        assert_eq!(records.len(), 1);
        match &records[0].outcome {
            InteractionOutcome::Failed {
                kind,
                failed_stage,
                completed_stages,
                ..
            } => {
                assert_eq!(*kind, FailureKind::StageFailure);
                assert_eq!(failed_stage.as_deref(), Some("loan_analyst"));
                assert_eq!(*completed_stages, 2);
            }
            other => panic!("expected failure record, got {:?}", other),
        }

        let metrics = orchestrator.get_metrics().await;
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.successful, 0);
    }

    #[tokio::test]
    async fn test_duplicate_stages_rejected_before_any_call() {
        let generator = Arc::new(MockGenerator::new());
        let store = InMemoryDocumentStore::with_samples();
        let index = KeywordPolicyIndex::build(&store).await.unwrap();

        let result = Orchestrator::new(
            vec![Stage::new("a", "x"), Stage::new("a", "y")],
            generator.clone(),
            ProfileResolver::offline(),
            PolicyRetriever::new(Arc::new(index), Duration::from_secs(5)),
            &PolicyLibrary::empty(),
            &AppConfig::default(),
        );

        assert!(matches!(result, Err(AnalysisError::Configuration(_))));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_not_recorded() {
        let orchestrator =
            orchestrator_with(Arc::new(MockGenerator::new()), &AppConfig::default()).await;

        let err = assert_err!(orchestrator.run_analysis("  ", "query").await);
        assert_eq!(err.kind(), FailureKind::InvalidInput);
        let err = assert_err!(orchestrator.run_analysis("12345", "").await);
        assert_eq!(err.kind(), FailureKind::InvalidInput);

        assert!(orchestrator.interaction_log().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_from_stage_failure() {
        let mut config = AppConfig::default();
        config.pipeline.global_timeout = Duration::from_secs(10);
        config.pipeline.stage_timeout = Duration::from_secs(10);
        let generator = Arc::new(MockGenerator::new().with_delay(Duration::from_secs(4)));
        let orchestrator = orchestrator_with(generator, &config).await;

        let err = assert_err!(orchestrator.run_analysis("11111", "fraud check").await);
        assert_eq!(err.kind(), FailureKind::Timeout);

        let metrics = orchestrator.get_metrics().await;
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.failed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_recorded() {
        let orchestrator =
            orchestrator_with(Arc::new(MockGenerator::new()), &AppConfig::default()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = assert_err!(orchestrator
            .run_analysis_with(AnalysisRequest::new("12345", "q").with_cancellation(cancel))
            .await);

        assert_eq!(err.kind(), FailureKind::Cancelled);
        assert_eq!(orchestrator.get_metrics().await.cancelled, 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_interfere() {
        let orchestrator = Arc::new(
            orchestrator_with(Arc::new(MockGenerator::new()), &AppConfig::default()).await,
        );

        let mut handles = Vec::new();
        for id in ["12345", "67890", "11111", "99999"] {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.run_analysis(id, "general review").await
            }));
        }

        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert_eq!(report.stage_contributions.len(), 6);
        }

        let metrics = orchestrator.get_metrics().await;
        assert_eq!(metrics.total_interactions, 4);
        assert_eq!(metrics.successful, 4);
        assert_eq!(metrics.distinct_customers, 4);
        assert_eq!(metrics.stages["fraud_analyst"].runs, 4);
    }
}
