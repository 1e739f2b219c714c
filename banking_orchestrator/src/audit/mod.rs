//! Interaction log and metrics
//!
//! Append-only. Every finished run, successful or not, lands here exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::context::ContextBundle;
use crate::error::FailureKind;
use crate::models::{InteractionOutcome, InteractionRecord};

/// Shared, process-wide log of runs
#[derive(Clone, Default)]
pub struct InteractionLog {
    records: Arc<RwLock<Vec<InteractionRecord>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageMetrics {
    pub runs: usize,
    pub average_ms: f64,
}

/// Aggregate view of the log at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionMetrics {
    pub total_interactions: usize,
    pub successful: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub cancelled: usize,
    /// Successful runs only
    pub average_processing_time_ms: f64,
    pub distinct_customers: usize,
    pub stages: BTreeMap<String, StageMetrics>,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record and return a copy of it.
    pub async fn record(
        &self,
        customer_id: &str,
        query: &str,
        outcome: InteractionOutcome,
    ) -> InteractionRecord {
        let record = InteractionRecord {
            customer_id: customer_id.to_string(),
            query: query.to_string(),
            outcome,
            recorded_at: Utc::now(),
        };

        let mut records = self.records.write().await;
        records.push(record.clone());

        debug!(
            customer_id = %customer_id,
            success = record.outcome.is_success(),
            total = records.len(),
            "Interaction recorded"
        );

        record
    }

    /// A customer's records in append order.
    pub async fn for_customer(&self, customer_id: &str) -> Vec<InteractionRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn metrics(&self) -> InteractionMetrics {
        let records = self.records.read().await;
        summarize(&records)
    }
}

fn summarize(records: &[InteractionRecord]) -> InteractionMetrics {
    let mut metrics = InteractionMetrics {
        total_interactions: records.len(),
        ..Default::default()
    };

    let mut customers = HashSet::new();
    let mut success_ms: u64 = 0;
    let mut stage_totals: BTreeMap<String, (usize, u64)> = BTreeMap::new();

    for record in records {
        customers.insert(record.customer_id.as_str());

        match &record.outcome {
            InteractionOutcome::Completed {
                processing_time_ms,
                stage_durations_ms,
                ..
            } => {
                metrics.successful += 1;
                success_ms += processing_time_ms;
                for (stage, ms) in stage_durations_ms {
                    let entry = stage_totals.entry(stage.clone()).or_default();
                    entry.0 += 1;
                    entry.1 += ms;
                }
            }
            InteractionOutcome::Failed { kind, .. } => {
                metrics.failed += 1;
                match kind {
                    FailureKind::Timeout => metrics.timeouts += 1,
                    FailureKind::Cancelled => metrics.cancelled += 1,
                    _ => {}
                }
            }
        }
    }

    if metrics.successful > 0 {
        metrics.average_processing_time_ms = success_ms as f64 / metrics.successful as f64;
    }

    metrics.distinct_customers = customers.len();
    metrics.stages = stage_totals
        .into_iter()
        .map(|(stage, (runs, total_ms))| {
            (
                stage,
                StageMetrics {
                    runs,
                    average_ms: total_ms as f64 / runs as f64,
                },
            )
        })
        .collect();
    metrics.last_interaction_at = records.last().map(|r| r.recorded_at);

    metrics
}

/// SHA-256 of the serialized context bundle, hex encoded.
/// Streams JSON straight into the hasher.
pub fn compute_context_hash(bundle: &ContextBundle) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), bundle).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextAssembler, ContextConfig};
    use crate::models::{CustomerProfile, RiskTier};

    fn completed(ms: u64, stages: &[(&str, u64)]) -> InteractionOutcome {
        InteractionOutcome::Completed {
            report_id: "r".to_string(),
            risk_score: 0.3,
            risk_tier: RiskTier::MediumLow,
            processing_time_ms: ms,
            stage_durations_ms: stages.iter().map(|(s, ms)| (s.to_string(), *ms)).collect(),
            context_hash: String::new(),
        }
    }

    fn failed(kind: FailureKind) -> InteractionOutcome {
        InteractionOutcome::Failed {
            kind,
            reason: "boom".to_string(),
            failed_stage: Some("b".to_string()),
            completed_stages: 1,
        }
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let log = InteractionLog::new();
        assert_eq!(log.metrics().await, InteractionMetrics::default());

        log.record("12345", "q1", completed(1000, &[("a", 400), ("b", 600)])).await;
        log.record("12345", "q2", completed(3000, &[("a", 200)])).await;
        log.record("67890", "q3", failed(FailureKind::StageFailure)).await;
        log.record("11111", "q4", failed(FailureKind::Timeout)).await;
        log.record("11111", "q5", failed(FailureKind::Cancelled)).await;

        let metrics = log.metrics().await;
        assert_eq!(metrics.total_interactions, 5);
        assert_eq!(metrics.successful, 2);
        assert_eq!(metrics.failed, 3);
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.cancelled, 1);
        assert_eq!(metrics.average_processing_time_ms, 2000.0);
        assert_eq!(metrics.distinct_customers, 3);
        assert_eq!(metrics.stages["a"], StageMetrics { runs: 2, average_ms: 300.0 });
        assert_eq!(metrics.stages["b"].runs, 1);
        assert!(metrics.last_interaction_at.is_some());
    }

    #[tokio::test]
    async fn test_for_customer_in_order() {
        let log = InteractionLog::new();
        log.record("a", "first", failed(FailureKind::External)).await;
        log.record("b", "other", completed(10, &[])).await;
        log.record("a", "second", completed(10, &[])).await;

        let records = log.for_customer("a").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].query, "first");
        assert_eq!(records[1].query, "second");
        assert!(log.for_customer("nobody").await.is_empty());
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let log = InteractionLog::new();
        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.record(&format!("c{}", i % 4), "q", completed(5, &[])).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let metrics = log.metrics().await;
        assert_eq!(metrics.total_interactions, 20);
        assert_eq!(metrics.distinct_customers, 4);
    }

    #[test]
    fn test_context_hash_is_stable() {
        let assembler = ContextAssembler::new(ContextConfig::default(), "rules".to_string());
        let profile = CustomerProfile::unknown("12345");

        let a = compute_context_hash(&assembler.assemble(&profile, &[], "loan"));
        let b = compute_context_hash(&assembler.assemble(&profile, &[], "loan"));
        let c = compute_context_hash(&assembler.assemble(&profile, &[], "fraud"));

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
