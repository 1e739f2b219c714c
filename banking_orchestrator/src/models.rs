//! Core data models for the banking analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{AnalysisError, FailureKind};

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RiskTier {
    Low,
    MediumLow,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::MediumLow => "medium-low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ================= Customer =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub amount: f64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub income: f64,
    /// 0 means unknown
    pub credit_score: u16,
    pub account_type: String,
    /// `YYYY-MM-DD` as recorded by the source; may be malformed
    pub customer_since: Option<String>,
    pub risk_tier: String,
    pub recent_transactions: Vec<Transaction>,
    pub banking_products: BTreeSet<String>,
    pub last_review_date: Option<String>,
}

impl CustomerProfile {
    /// Zero-valued profile for an id nobody knows about.
    pub fn unknown(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            income: 0.0,
            credit_score: 0,
            account_type: "standard".to_string(),
            customer_since: None,
            risk_tier: "medium".to_string(),
            recent_transactions: Vec::new(),
            banking_products: BTreeSet::new(),
            last_review_date: None,
        }
    }

    pub fn has_product(&self, product: &str) -> bool {
        self.banking_products.contains(product)
    }

    pub fn product_count(&self) -> usize {
        self.banking_products.len()
    }

    /// Largest recent transaction amount, if any transactions exist.
    pub fn max_transaction(&self) -> Option<f64> {
        self.recent_transactions
            .iter()
            .map(|t| t.amount)
            .fold(None, |acc, amount| match acc {
                Some(current) if current >= amount => Some(current),
                _ => Some(amount),
            })
    }

    pub fn min_transaction(&self) -> Option<f64> {
        self.recent_transactions
            .iter()
            .map(|t| t.amount)
            .fold(None, |acc, amount| match acc {
                Some(current) if current <= amount => Some(current),
                _ => Some(amount),
            })
    }

    /// income >= 0 and credit score in {0} ∪ [300, 850]
    pub fn validate(&self) -> crate::Result<()> {
        if !self.income.is_finite() || self.income < 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "income for customer {} must be a non-negative number, got {}",
                self.customer_id, self.income
            )));
        }

        if self.credit_score != 0 && !(300..=850).contains(&self.credit_score) {
            return Err(AnalysisError::InvalidInput(format!(
                "credit score for customer {} out of range: {}",
                self.customer_id, self.credit_score
            )));
        }

        Ok(())
    }
}

//
// ================= Policy =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyExcerpt {
    pub source: String,
    pub collection: String,
    pub relevance: f64,
    pub text: String,
}

//
// ================= Stage Output =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageContribution {
    pub stage: String,
    pub text: String,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Contributions of one run, in completion order, one per stage name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StageContributions {
    entries: Vec<StageContribution>,
}

impl StageContributions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a contribution. A second contribution for the same stage is rejected.
    pub fn insert(&mut self, contribution: StageContribution) -> crate::Result<()> {
        if self.get(&contribution.stage).is_some() {
            return Err(AnalysisError::Configuration(format!(
                "duplicate contribution for stage '{}'",
                contribution.stage
            )));
        }
        self.entries.push(contribution);
        Ok(())
    }

    pub fn get(&self, stage: &str) -> Option<&StageContribution> {
        self.entries.iter().find(|c| c.stage == stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageContribution> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|c| c.stage.as_str())
    }

    pub fn last(&self) -> Option<&StageContribution> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//
// ================= Report =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub total_processing_time_seconds: f64,
    pub stages_used: usize,
    pub policies_referenced: usize,
    pub search_results_analyzed: usize,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_id: String,
    pub customer_id: String,
    pub query: String,
    pub summary: String,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub actions_taken: Vec<String>,
    pub risk_assessment: RiskTier,
    pub risk_score: f64,
    pub policy_references: BTreeSet<String>,
    pub stage_contributions: StageContributions,
    pub processing_metrics: ProcessingMetrics,
    pub context_hash: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

//
// ================= Interaction Log =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InteractionOutcome {
    Completed {
        report_id: String,
        risk_score: f64,
        risk_tier: RiskTier,
        processing_time_ms: u64,
        stage_durations_ms: BTreeMap<String, u64>,
        context_hash: String,
    },
    Failed {
        kind: FailureKind,
        reason: String,
        failed_stage: Option<String>,
        completed_stages: usize,
    },
}

impl InteractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InteractionOutcome::Completed { .. })
    }

    pub fn risk_score(&self) -> Option<f64> {
        match self {
            InteractionOutcome::Completed { risk_score, .. } => Some(*risk_score),
            InteractionOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub customer_id: String,
    pub query: String,
    pub outcome: InteractionOutcome,
    pub recorded_at: DateTime<Utc>,
}
