//! Context assembly
//!
//! Builds the one immutable bundle every stage of a run reads from.
//! Truncation keeps prompt size bounded.

use serde::{Deserialize, Serialize};

use crate::models::{CustomerProfile, PolicyExcerpt, Transaction};
use crate::text::{format_usd, truncate_chars};

/// Limits applied while assembling a context bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextConfig {
    /// Most recent transactions kept
    pub max_transactions: usize,
    /// Highest-ranked excerpts kept
    pub max_excerpts: usize,
    /// Characters kept per excerpt
    pub excerpt_char_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10,
            max_excerpts: 6,
            excerpt_char_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextBundle {
    pub query: String,
    pub profile: CustomerProfile,
    /// Newest first
    pub transactions: Vec<Transaction>,
    /// Highest relevance first, text already truncated
    pub excerpts: Vec<PolicyExcerpt>,
    pub policy_summary: String,
}

impl ContextBundle {
    /// Prompt text shared by every stage.
    pub fn render(&self) -> String {
        let p = &self.profile;
        let mut out = String::new();

        let products = if p.banking_products.is_empty() {
            "None".to_string()
        } else {
            p.banking_products.iter().cloned().collect::<Vec<_>>().join(", ")
        };

        out.push_str(&format!("BANKING ANALYSIS REQUEST: {}\n\n", self.query));
        out.push_str("CUSTOMER PROFILE:\n");
        out.push_str(&format!("- Customer ID: {}\n", p.customer_id));
        out.push_str(&format!("- Annual Income: {}\n", format_usd(p.income)));
        out.push_str(&format!("- Credit Score: {}\n", p.credit_score));
        out.push_str(&format!("- Account Type: {}\n", p.account_type));
        out.push_str(&format!(
            "- Customer Since: {}\n",
            p.customer_since.as_deref().unwrap_or("N/A")
        ));
        out.push_str(&format!("- Risk Tier: {}\n", p.risk_tier));
        out.push_str(&format!("- Banking Products: {}\n", products));
        out.push_str(&format!(
            "- Last Review Date: {}\n",
            p.last_review_date.as_deref().unwrap_or("N/A")
        ));

        out.push_str("\nRECENT TRANSACTIONS:\n");
        if self.transactions.is_empty() {
            out.push_str("- None on record\n");
        }
        for tx in &self.transactions {
            out.push_str(&format!(
                "- {} - {} ({})\n",
                format_usd(tx.amount),
                tx.description,
                tx.timestamp.format("%Y-%m-%d")
            ));
        }

        out.push_str("\nRELEVANT BANKING POLICIES:\n");
        if self.excerpts.is_empty() {
            out.push_str("- No policy excerpts retrieved\n");
        }
        for (i, excerpt) in self.excerpts.iter().enumerate() {
            out.push_str(&format!(
                "\n--- Policy Reference {} (Source: {}, Collection: {}, Relevance: {:.3}) ---\n",
                i + 1,
                excerpt.source,
                excerpt.collection,
                excerpt.relevance
            ));
            out.push_str(&excerpt.text);
            out.push('\n');
        }

        out.push_str("\nPOLICY FRAMEWORK SUMMARY:\n");
        out.push_str(self.policy_summary.trim_end());
        out.push('\n');

        out
    }
}

pub struct ContextAssembler {
    config: ContextConfig,
    policy_summary: String,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig, policy_summary: String) -> Self {
        Self {
            config,
            policy_summary,
        }
    }

    /// Deterministic: same inputs, same bundle. Does not call any stage.
    pub fn assemble(
        &self,
        profile: &CustomerProfile,
        excerpts: &[PolicyExcerpt],
        query: &str,
    ) -> ContextBundle {
        let mut transactions = profile.recent_transactions.clone();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions.truncate(self.config.max_transactions);

        let excerpts = excerpts
            .iter()
            .take(self.config.max_excerpts)
            .map(|e| PolicyExcerpt {
                text: truncate_chars(&e.text, self.config.excerpt_char_limit).to_string(),
                ..e.clone()
            })
            .collect();

        ContextBundle {
            query: query.to_string(),
            profile: profile.clone(),
            transactions,
            excerpts,
            policy_summary: self.policy_summary.clone(),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}
