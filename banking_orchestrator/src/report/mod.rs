//! Report synthesis
//!
//! Turns a completed run into an [`AnalysisReport`]. Everything here is
//! derived from the inputs; no external calls.

pub mod rules;

use chrono::Utc;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    AnalysisReport, CustomerProfile, PolicyExcerpt, ProcessingMetrics, StageContributions,
};
use crate::risk;

pub const GENERATED_BY: &str = "BankingAnalysisOrchestrator";

/// Everything a completed run hands to the synthesizer
pub struct SynthesisInput<'a> {
    pub profile: &'a CustomerProfile,
    pub query: &'a str,
    pub excerpts: &'a [PolicyExcerpt],
    pub contributions: StageContributions,
    pub risk_score: f64,
    /// Final stage output
    pub narrative: String,
    pub elapsed: Duration,
    /// Fallbacks taken while gathering data
    pub degraded_notes: &'a [String],
    pub context_hash: String,
}

#[derive(Debug, Clone)]
pub struct ReportSynthesizer {
    generated_by: String,
}

impl ReportSynthesizer {
    pub fn new(generated_by: impl Into<String>) -> Self {
        Self {
            generated_by: generated_by.into(),
        }
    }

    pub fn synthesize(&self, input: SynthesisInput<'_>) -> AnalysisReport {
        let SynthesisInput {
            profile,
            query,
            excerpts,
            contributions,
            risk_score,
            narrative,
            elapsed,
            degraded_notes,
            context_hash,
        } = input;

        let tier = risk::tier(risk_score);
        let key_findings = rules::findings(profile, excerpts, contributions.len());
        let recommendations = rules::recommendations(profile, tier);

        let policy_references: BTreeSet<String> = excerpts
            .iter()
            .filter(|e| !e.source.is_empty())
            .map(|e| e.source.clone())
            .collect();

        let mut actions_taken = vec![
            "Multi-stage sequential analysis completed".to_string(),
            "Policy compliance verification performed".to_string(),
            "Enterprise risk assessment conducted".to_string(),
            format!("Analyzed {} relevant policy excerpts", excerpts.len()),
            format!(
                "{} specialized stages contributed to analysis",
                contributions.len()
            ),
        ];
        actions_taken.extend(degraded_notes.iter().map(|n| format!("Degraded data: {}", n)));

        let summary = if narrative.trim().is_empty() {
            format!("Analysis completed for customer {}", profile.customer_id)
        } else {
            narrative
        };

        let report = AnalysisReport {
            report_id: format!("report_{}", Uuid::new_v4().simple()),
            customer_id: profile.customer_id.clone(),
            query: query.to_string(),
            summary,
            key_findings,
            recommendations,
            actions_taken,
            risk_assessment: tier,
            risk_score,
            processing_metrics: ProcessingMetrics {
                total_processing_time_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
                stages_used: contributions.len(),
                policies_referenced: policy_references.len(),
                search_results_analyzed: excerpts.len(),
                risk_score,
            },
            policy_references,
            stage_contributions: contributions,
            context_hash,
            generated_by: self.generated_by.clone(),
            generated_at: Utc::now(),
        };

        info!(
            report_id = %report.report_id,
            customer_id = %report.customer_id,
            risk_score = report.risk_score,
            tier = %report.risk_assessment,
            "Report synthesized"
        );

        report
    }
}

impl Default for ReportSynthesizer {
    fn default() -> Self {
        Self::new(GENERATED_BY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskTier, StageContribution};
    use crate::profile::default_profile;

    fn contributions(names: &[&str]) -> StageContributions {
        let mut out = StageContributions::new();
        for name in names {
            out.insert(StageContribution {
                stage: name.to_string(),
                text: format!("{} output", name),
                completed_at: Utc::now(),
                elapsed_ms: 5,
            })
            .unwrap();
        }
        out
    }

    fn excerpts() -> Vec<PolicyExcerpt> {
        vec![
            PolicyExcerpt {
                source: "fraud_detection_policy.txt".to_string(),
                collection: "fraud_detection".to_string(),
                relevance: 0.9,
                text: "Flag transactions above $2,000".to_string(),
            },
            PolicyExcerpt {
                source: "fraud_detection_policy.txt".to_string(),
                collection: "transaction_monitoring".to_string(),
                relevance: 0.6,
                text: "Review velocity".to_string(),
            },
        ]
    }

    #[test]
    fn test_synthesize_report() {
        let profile = default_profile("11111");
        let excerpts = excerpts();
        let notes = vec!["profile source unavailable".to_string()];

        let report = ReportSynthesizer::default().synthesize(SynthesisInput {
            profile: &profile,
            query: "fraud review",
            excerpts: &excerpts,
            contributions: contributions(&["a", "b", "c"]),
            risk_score: 0.8,
            narrative: "c output".to_string(),
            elapsed: Duration::from_millis(1234),
            degraded_notes: &notes,
            context_hash: "abc".to_string(),
        });

        assert!(report.report_id.starts_with("report_"));
        assert_eq!(report.risk_assessment, RiskTier::Critical);
        assert_eq!(report.summary, "c output");
        assert_eq!(report.policy_references.len(), 1);
        assert_eq!(report.processing_metrics.policies_referenced, 1);
        assert_eq!(report.processing_metrics.search_results_analyzed, 2);
        assert_eq!(report.processing_metrics.stages_used, 3);
        assert_eq!(report.processing_metrics.total_processing_time_seconds, 1.23);
        assert!(report
            .actions_taken
            .contains(&"Degraded data: profile source unavailable".to_string()));
        assert!(!report.key_findings.is_empty());
        assert!(report.recommendations.len() >= 2);
        assert_eq!(report.generated_by, GENERATED_BY);
    }

    #[test]
    fn test_report_ids_are_unique() {
        let profile = default_profile("12345");
        let synthesizer = ReportSynthesizer::default();
        let make = || {
            synthesizer.synthesize(SynthesisInput {
                profile: &profile,
                query: "q",
                excerpts: &[],
                contributions: contributions(&["only"]),
                risk_score: 0.17,
                narrative: String::new(),
                elapsed: Duration::ZERO,
                degraded_notes: &[],
                context_hash: String::new(),
            })
        };

        let first = make();
        let second = make();
        assert_ne!(first.report_id, second.report_id);
        assert_eq!(first.summary, "Analysis completed for customer 12345");
    }
}
