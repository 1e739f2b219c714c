//! In-process keyword index over the policy documents
//!
//! Stands in for the vector search service in demos and tests.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

use crate::models::PolicyExcerpt;
use crate::policy::library::{classify_collection, DocumentStore};
use crate::policy::PolicySearch;
use crate::Result;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "are", "was", "you", "your", "have", "need",
    "some", "want", "about", "from", "into", "help", "including", "options",
];

#[derive(Debug, Clone)]
struct Chunk {
    source: String,
    collection: &'static str,
    text: String,
    terms: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordPolicyIndex {
    chunks: Vec<Chunk>,
}

impl KeywordPolicyIndex {
    /// Chunk every document by paragraph and tag it with its collection.
    pub async fn build(store: &dyn DocumentStore) -> Result<Self> {
        let mut chunks = Vec::new();

        for name in store.list_documents().await? {
            let content = store.document_content(&name).await?;
            let metadata = store.document_metadata(&name).await?;
            let collection = classify_collection(metadata.doc_type.as_deref(), &name, &content);

            for paragraph in content.split("\n\n") {
                let text = paragraph.trim();
                if text.is_empty() {
                    continue;
                }
                chunks.push(Chunk {
                    source: name.clone(),
                    collection,
                    text: text.to_string(),
                    terms: terms(text),
                });
            }
        }

        info!(chunks = chunks.len(), "Keyword policy index built");
        Ok(Self { chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl PolicySearch for KeywordPolicyIndex {
    async fn search(
        &self,
        query: &str,
        collections: &[String],
        top_k: usize,
    ) -> Result<Vec<PolicyExcerpt>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<PolicyExcerpt> = self
            .chunks
            .iter()
            .filter(|chunk| collections.iter().any(|c| c == chunk.collection))
            .filter_map(|chunk| {
                let matched = query_terms.intersection(&chunk.terms).count();
                if matched == 0 {
                    return None;
                }
                Some(PolicyExcerpt {
                    source: chunk.source.clone(),
                    collection: chunk.collection.to_string(),
                    relevance: matched as f64 / query_terms.len() as f64,
                    text: chunk.text.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .map(|t| t.trim_end_matches('s').to_string())
        .collect()
}
