//! Customer profile resolution
//!
//! Tries the configured data source, falls back to sample profiles.
//! Profiles are cached for the lifetime of the resolver.

pub mod defaults;
pub mod postgres;

pub use defaults::{default_profile, KNOWN_CUSTOMERS};
pub use postgres::PostgresProfileSource;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, Fetched};
use crate::models::{CustomerProfile, Transaction};
use crate::Result;

/// External customer data source
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_income(&self, customer_id: &str) -> Result<Option<f64>>;
    async fn fetch_transactions(&self, customer_id: &str) -> Result<Vec<Transaction>>;
}

pub struct ProfileResolver {
    source: Option<Arc<dyn ProfileSource>>,
    fetch_timeout: Duration,
    cache: Arc<RwLock<HashMap<String, CustomerProfile>>>,
}

impl ProfileResolver {
    pub fn new(source: Option<Arc<dyn ProfileSource>>, fetch_timeout: Duration) -> Self {
        if source.is_none() {
            warn!("No profile source configured. Using sample data fallback.");
        }

        Self {
            source,
            fetch_timeout,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolver that only ever serves sample profiles.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(30))
    }

    /// Resolve a customer id to a profile. Never fails.
    ///
    /// Degraded results are returned as [`Fetched::Fallback`] and are not
    /// cached, so a later run retries the source.
    pub async fn resolve(&self, customer_id: &str) -> Fetched<CustomerProfile> {
        {
            let cache = self.cache.read().await;
            if let Some(profile) = cache.get(customer_id) {
                debug!(customer_id = %customer_id, "Profile served from cache");
                return Fetched::Live(profile.clone());
            }
        }

        let resolved = match &self.source {
            None => Fetched::Live(default_profile(customer_id)),
            Some(source) => self.fetch(source.as_ref(), customer_id).await,
        };

        if resolved.is_degraded() {
            warn!(
                customer_id = %customer_id,
                reason = resolved.reason().unwrap_or_default(),
                "Using fallback profile"
            );
            return resolved;
        }

        let mut cache = self.cache.write().await;
        let profile = cache
            .entry(customer_id.to_string())
            .or_insert_with(|| resolved.into_inner())
            .clone();

        Fetched::Live(profile)
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn fetch(&self, source: &dyn ProfileSource, customer_id: &str) -> Fetched<CustomerProfile> {
        let mut profile = default_profile(customer_id);

        let income = match self.bounded(source.fetch_income(customer_id)).await {
            Ok(income) => income,
            Err(e) => return Fetched::fallback(profile, format!("income fetch failed: {}", e)),
        };

        let Some(income) = income else {
            debug!(customer_id = %customer_id, "No income on record; keeping sample profile");
            return Fetched::Live(profile);
        };

        if !income.is_finite() || income < 0.0 {
            return Fetched::fallback(
                profile,
                format!("source returned invalid income {}", income),
            );
        }

        let transactions = match self.bounded(source.fetch_transactions(customer_id)).await {
            Ok(transactions) => transactions,
            Err(e) => {
                return Fetched::fallback(profile, format!("transaction fetch failed: {}", e))
            }
        };

        profile.income = income;
        if !transactions.is_empty() {
            profile.recent_transactions = transactions;
        }

        info!(
            customer_id = %customer_id,
            transactions = profile.recent_transactions.len(),
            "Customer profile loaded from data source"
        );

        Fetched::Live(profile)
    }

    async fn bounded<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::DataSource(format!(
                "timed out after {}s",
                self.fetch_timeout.as_secs_f64()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        income: Option<f64>,
        transactions: Vec<Transaction>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileSource for FixedSource {
        async fn fetch_income(&self, _customer_id: &str) -> Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.income)
        }

        async fn fetch_transactions(&self, _customer_id: &str) -> Result<Vec<Transaction>> {
            Ok(self.transactions.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ProfileSource for BrokenSource {
        async fn fetch_income(&self, _customer_id: &str) -> Result<Option<f64>> {
            Err(AnalysisError::DataSource("connection refused".to_string()))
        }

        async fn fetch_transactions(&self, _customer_id: &str) -> Result<Vec<Transaction>> {
            Err(AnalysisError::DataSource("connection refused".to_string()))
        }
    }

    struct UndecodableTransactions;

    #[async_trait]
    impl ProfileSource for UndecodableTransactions {
        async fn fetch_income(&self, _customer_id: &str) -> Result<Option<f64>> {
            Ok(Some(64_000.0))
        }

        async fn fetch_transactions(&self, _customer_id: &str) -> Result<Vec<Transaction>> {
            Err(sqlx::Error::ColumnDecode {
                index: "\"ts\"".to_string(),
                source: "mismatched types; Rust type `DateTime<Utc>` is not compatible with SQL type `TIMESTAMP`".into(),
            }
            .into())
        }
    }

    struct HangingSource;

    #[async_trait]
    impl ProfileSource for HangingSource {
        async fn fetch_income(&self, _customer_id: &str) -> Result<Option<f64>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Some(1.0))
        }

        async fn fetch_transactions(&self, _customer_id: &str) -> Result<Vec<Transaction>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_offline_resolver_serves_defaults() {
        let resolver = ProfileResolver::offline();

        let known = resolver.resolve("12345").await;
        assert!(!known.is_degraded());
        assert_eq!(known.value().income, 75_000.0);

        let unknown = resolver.resolve("nobody").await;
        assert_eq!(unknown.value().income, 0.0);
        assert_eq!(resolver.cached_count().await, 2);
    }

    #[tokio::test]
    async fn test_source_overrides_income_and_transactions() {
        let source = Arc::new(FixedSource {
            income: Some(91_000.0),
            transactions: vec![Transaction {
                amount: 12_500.0,
                description: "Wire Transfer".to_string(),
                timestamp: Utc::now(),
            }],
            calls: AtomicUsize::new(0),
        });
        let resolver = ProfileResolver::new(Some(source.clone()), Duration::from_secs(5));

        let profile = resolver.resolve("67890").await.into_inner();
        assert_eq!(profile.income, 91_000.0);
        assert_eq!(profile.recent_transactions.len(), 1);
        assert_eq!(profile.credit_score, 680);

        // Second resolution comes from the cache
        resolver.resolve("67890").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_transactions_keep_defaults() {
        let source = Arc::new(FixedSource {
            income: Some(80_000.0),
            transactions: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let resolver = ProfileResolver::new(Some(source), Duration::from_secs(5));

        let profile = resolver.resolve("12345").await.into_inner();
        assert_eq!(profile.income, 80_000.0);
        assert_eq!(profile.recent_transactions.len(), 4);
    }

    #[tokio::test]
    async fn test_source_failure_degrades_without_caching() {
        let resolver = ProfileResolver::new(Some(Arc::new(BrokenSource)), Duration::from_secs(5));

        let resolved = resolver.resolve("11111").await;
        assert!(resolved.is_degraded());
        assert!(resolved.reason().unwrap().contains("connection refused"));
        assert_eq!(resolved.value().income, 28_000.0);
        assert_eq!(resolver.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_transaction_decode_error_does_not_mix_sources() {
        let resolver = ProfileResolver::new(
            Some(Arc::new(UndecodableTransactions)),
            Duration::from_secs(5),
        );

        let resolved = resolver.resolve("12345").await;
        assert!(resolved.is_degraded());
        assert!(resolved.reason().unwrap().contains("transaction fetch failed"));
        // Sample income and sample transactions together, never live income alone
        assert_eq!(resolved.value().income, 75_000.0);
        assert_eq!(resolved.value().recent_transactions.len(), 4);
        assert_eq!(resolver.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_negative_income_is_rejected() {
        let source = Arc::new(FixedSource {
            income: Some(-5.0),
            transactions: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let resolver = ProfileResolver::new(Some(source), Duration::from_secs(5));

        let resolved = resolver.resolve("12345").await;
        assert!(resolved.is_degraded());
        assert_eq!(resolved.value().income, 75_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let resolver = ProfileResolver::new(Some(Arc::new(HangingSource)), Duration::from_secs(2));

        let resolved = resolver.resolve("12345").await;
        assert!(resolved.is_degraded());
        assert!(resolved.reason().unwrap().contains("timed out"));
    }
}
