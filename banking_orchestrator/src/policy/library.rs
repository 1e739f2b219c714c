//! Policy document store and the policy-framework summary
//!
//! Documents are bulk-loaded once, before any analysis runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::error::{AnalysisError, Fetched};
use crate::Result;

const MAX_RULES_PER_CATEGORY: usize = 5;

const RULE_MARKERS: &[&str] = &["must", "shall", "required", "prohibited", "mandatory"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Category tag such as `fraud`, `loan`, `support`, `risk`, `compliance`
    pub doc_type: Option<String>,
    pub version: Option<String>,
}

/// Object storage holding the raw policy documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<String>>;
    async fn document_content(&self, name: &str) -> Result<String>;
    async fn document_metadata(&self, name: &str) -> Result<DocumentMetadata>;
}

/// Document store held in memory. Used by the demo binaries and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: BTreeMap<String, (String, DocumentMetadata)>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, doc_type: Option<&str>, content: &str) {
        self.documents.insert(
            name.to_string(),
            (
                content.to_string(),
                DocumentMetadata {
                    doc_type: doc_type.map(str::to_string),
                    version: Some("1.0".to_string()),
                },
            ),
        );
    }

    /// Store seeded with the sample banking policy set.
    pub fn with_samples() -> Self {
        let mut store = Self::new();
        for (name, doc_type, content) in SAMPLE_DOCUMENTS {
            store.insert(name, Some(doc_type), content);
        }
        store
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self.documents.keys().cloned().collect())
    }

    async fn document_content(&self, name: &str) -> Result<String> {
        self.documents
            .get(name)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| AnalysisError::DataSource(format!("document not found: {}", name)))
    }

    async fn document_metadata(&self, name: &str) -> Result<DocumentMetadata> {
        self.documents
            .get(name)
            .map(|(_, meta)| meta.clone())
            .ok_or_else(|| AnalysisError::DataSource(format!("document not found: {}", name)))
    }
}

/// Map a type tag, or failing that the document itself, onto a collection.
pub fn classify_collection(doc_type: Option<&str>, name: &str, content: &str) -> &'static str {
    if let Some(collection) = doc_type.and_then(collection_for_type) {
        return collection;
    }

    let name = name.to_lowercase();
    if let Some(collection) = keyword_collection(&name) {
        return collection;
    }

    keyword_collection(&content.to_lowercase()).unwrap_or("compliance")
}

fn collection_for_type(doc_type: &str) -> Option<&'static str> {
    match doc_type.trim().to_lowercase().as_str() {
        "fraud" => Some("fraud_detection"),
        "loan" | "lending" | "credit" => Some("loan_policies"),
        "support" | "service" => Some("customer_support"),
        "risk" => Some("risk_assessment"),
        "transaction" | "monitoring" | "aml" => Some("transaction_monitoring"),
        "compliance" | "regulatory" => Some("compliance"),
        _ => None,
    }
}

fn keyword_collection(text: &str) -> Option<&'static str> {
    if text.contains("fraud") {
        Some("fraud_detection")
    } else if text.contains("loan") || text.contains("mortgage") || text.contains("lending") {
        Some("loan_policies")
    } else if text.contains("support") || text.contains("complaint") {
        Some("customer_support")
    } else if text.contains("risk") {
        Some("risk_assessment")
    } else if text.contains("transaction") || text.contains("monitoring") {
        Some("transaction_monitoring")
    } else if text.contains("compliance") || text.contains("regulat") {
        Some("compliance")
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyCategory {
    pub sources: Vec<String>,
    pub priority: String,
    pub review_frequency: String,
    pub rules: Vec<String>,
}

/// Structured rules extracted from the policy documents, keyed by collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyLibrary {
    categories: BTreeMap<String, PolicyCategory>,
}

impl PolicyLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every document from the store. A store failure yields an empty library.
    pub async fn load(store: &dyn DocumentStore) -> Fetched<Self> {
        match Self::try_load(store).await {
            Ok(library) => {
                info!(categories = library.categories.len(), "Policy library loaded");
                Fetched::Live(library)
            }
            Err(e) => {
                warn!(error = %e, "Could not load banking policies");
                Fetched::fallback(Self::empty(), format!("policy library unavailable: {}", e))
            }
        }
    }

    async fn try_load(store: &dyn DocumentStore) -> Result<Self> {
        let mut categories: BTreeMap<String, PolicyCategory> = BTreeMap::new();
        let names = store.list_documents().await?;

        for name in &names {
            let content = store.document_content(name).await?;
            let metadata = store.document_metadata(name).await?;
            let collection = classify_collection(metadata.doc_type.as_deref(), name, &content);

            let category = categories
                .entry(collection.to_string())
                .or_insert_with(|| PolicyCategory {
                    sources: Vec::new(),
                    priority: priority_for(collection).to_string(),
                    review_frequency: review_frequency_for(collection).to_string(),
                    rules: Vec::new(),
                });

            category.sources.push(name.clone());
            category.rules.extend(extract_rules(&content));
        }

        Ok(Self { categories })
    }

    pub fn category(&self, collection: &str) -> Option<&PolicyCategory> {
        self.categories.get(collection)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Policy-framework summary embedded in every stage prompt.
    pub fn summary(&self) -> String {
        if self.categories.is_empty() {
            return "No policy documents loaded.".to_string();
        }

        let mut out = String::new();
        for (collection, category) in &self.categories {
            out.push_str(&format!(
                "{} (priority: {}, review: {}, sources: {})\n",
                collection.to_uppercase(),
                category.priority,
                category.review_frequency,
                category.sources.join(", ")
            ));
            for rule in category.rules.iter().take(MAX_RULES_PER_CATEGORY) {
                out.push_str(&format!("  - {}\n", rule));
            }
        }
        out
    }
}

fn priority_for(collection: &str) -> &'static str {
    match collection {
        "fraud_detection" | "risk_assessment" => "high",
        _ => "medium",
    }
}

fn review_frequency_for(collection: &str) -> &'static str {
    match collection {
        "fraud_detection" | "compliance" => "quarterly",
        _ => "annually",
    }
}

/// Bullet lines and sentences that state an obligation.
fn extract_rules(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        let body = trimmed
            .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start_matches(['.', ')'])
            .trim();

        if body.len() < 12 {
            continue;
        }

        let is_bullet = body.len() != trimmed.len();
        let lowered = body.to_lowercase();
        let states_obligation = RULE_MARKERS.iter().any(|m| lowered.contains(m));

        if (is_bullet || states_obligation) && seen.insert(lowered) {
            rules.push(body.to_string());
        }
    }

    rules
}

const SAMPLE_DOCUMENTS: [(&str, &str, &str); 5] = [
    (
        "fraud_detection_policy.txt",
        "fraud",
        "FRAUD DETECTION POLICY\n\
         \n\
         Transactions above $2,000 must be reviewed when they deviate from the customer's normal pattern.\n\
         More than 10 transactions per hour shall trigger an automatic velocity alert.\n\
         - New payees combined with geographic anomalies are escalated to the fraud desk.\n\
         - Suspected account takeover requires immediate credential reset.\n\
         \n\
         Card fraud cases must be resolved within 10 business days.",
    ),
    (
        "loan_eligibility_policy.txt",
        "loan",
        "LOAN ELIGIBILITY POLICY\n\
         \n\
         Income tiers: A+ for $100K and above, A for $75K, B for $50K, C for $30K.\n\
         - Excellent credit (750+) qualifies for 3.5% APR.\n\
         - Good credit (700-749) qualifies for 4.5% APR.\n\
         - Fair credit (650-699) qualifies for 6.0% APR.\n\
         Applicants below 650 require case-by-case review.\n\
         Debt-to-income ratio must not exceed 30% to 45% depending on tier.\n\
         \n\
         Mortgage pre-qualification requires income of at least $75K and credit of 700.",
    ),
    (
        "customer_support_guidelines.txt",
        "support",
        "CUSTOMER SUPPORT GUIDELINES\n\
         \n\
         1. P0 critical issues must receive a response within 1 hour.\n\
         2. P1 high priority issues must receive a response within 4 hours.\n\
         3. P2 and P3 issues are handled within 2 business days.\n\
         Customers with a single product should be offered a relationship review.\n\
         Complaints about suspicious activity are routed to fraud operations.",
    ),
    (
        "risk_assessment_framework.txt",
        "risk",
        "ENTERPRISE RISK ASSESSMENT FRAMEWORK\n\
         \n\
         Risk is assessed across credit, market, operational, compliance and reputational categories.\n\
         - Low risk: below 10% probability of adverse outcome.\n\
         - Medium risk: 10% to 30%.\n\
         - High risk: 30% to 60%.\n\
         - Critical risk: above 60%.\n\
         High and critical customers shall be reviewed quarterly.",
    ),
    (
        "compliance_manual.txt",
        "compliance",
        "REGULATORY COMPLIANCE MANUAL\n\
         \n\
         Know-your-customer documentation is mandatory before account opening.\n\
         Transactions above $10,000 must be reported under currency transaction rules.\n\
         Structuring deposits to avoid reporting is prohibited.\n\
         - Suspicious activity reports are filed within 30 days of detection.",
    ),
];
