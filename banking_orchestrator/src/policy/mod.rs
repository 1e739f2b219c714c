//! Policy retrieval
//!
//! The search service is external; [`PolicyRetriever`] wraps it so that a
//! failing or slow service degrades to "no policy context".

pub mod index;
pub mod library;

pub use index::KeywordPolicyIndex;
pub use library::{DocumentMetadata, DocumentStore, InMemoryDocumentStore, PolicyLibrary};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AnalysisError, Fetched};
use crate::models::PolicyExcerpt;
use crate::Result;

/// Collections searched for every analysis.
pub const POLICY_COLLECTIONS: [&str; 6] = [
    "fraud_detection",
    "loan_policies",
    "customer_support",
    "risk_assessment",
    "transaction_monitoring",
    "compliance",
];

/// Ranked search over policy collections (vector store, keyword index, ...)
#[async_trait]
pub trait PolicySearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        collections: &[String],
        top_k: usize,
    ) -> Result<Vec<PolicyExcerpt>>;
}

pub struct PolicyRetriever {
    service: Arc<dyn PolicySearch>,
    timeout: Duration,
}

impl PolicyRetriever {
    pub fn new(service: Arc<dyn PolicySearch>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// At most `top_k` excerpts, highest relevance first, ties in service order.
    pub async fn search(
        &self,
        query: &str,
        collections: &[String],
        top_k: usize,
    ) -> Fetched<Vec<PolicyExcerpt>> {
        if top_k == 0 {
            return Fetched::Live(Vec::new());
        }

        let result = tokio::time::timeout(
            self.timeout,
            self.service.search(query, collections, top_k),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AnalysisError::Search(format!(
                "timed out after {}s",
                self.timeout.as_secs_f64()
            )))
        });

        match result {
            Ok(excerpts) => {
                let ranked = rank(excerpts, top_k);
                debug!(query = %query, results = ranked.len(), "Policy search completed");
                Fetched::Live(ranked)
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Policy search failed; continuing without policy context");
                Fetched::fallback(Vec::new(), format!("policy search unavailable: {}", e))
            }
        }
    }
}

/// Stable sort by descending relevance, then truncate.
pub fn rank(mut excerpts: Vec<PolicyExcerpt>, top_k: usize) -> Vec<PolicyExcerpt> {
    excerpts.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    excerpts.truncate(top_k);
    excerpts
}
