//! Gemini-backed stage generator
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::context::ContextBundle;
use crate::error::AnalysisError;
use crate::generation::Generator;
use crate::models::StageContributions;
use crate::pipeline::Stage;
use crate::Result;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", BASE_URL, model),
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        stage: &Stage,
        context: &ContextBundle,
        prior: &StageContributions,
    ) -> Result<String> {
        let request = build_request(stage, context, prior);

        debug!(stage = %stage.name, "Calling Gemini API");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(stage = %stage.name, "Gemini API request failed: {}", e);
                AnalysisError::Generation(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(stage = %stage.name, %status, "Gemini API error response: {}", error_text);
            return Err(AnalysisError::Generation(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            AnalysisError::Generation(format!("Gemini parse error: {}", e))
        })?;

        let text = extract_text(&gemini_response)?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                stage = %stage.name,
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini response received"
            );
        }

        Ok(text)
    }
}

fn build_request(stage: &Stage, context: &ContextBundle, prior: &StageContributions) -> GeminiRequest {
    let mut prompt = context.render();

    if !prior.is_empty() {
        prompt.push_str("\nPRIOR STAGE OUTPUTS:\n");
        for contribution in prior.iter() {
            prompt.push_str(&format!("\n### {}\n{}\n", contribution.stage, contribution.text));
        }
    }

    prompt.push_str(&format!(
        "\nPerform the {} analysis. Provide specific, actionable insights based on the customer data and banking policies provided.",
        stage.name
    ));

    GeminiRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: stage.instructions.clone(),
            }],
        },
    }
}

fn extract_text(response: &GeminiResponse) -> Result<String> {
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| AnalysisError::Generation("No candidates in Gemini response".to_string()))?;

    let text: String = candidate
        .content
        .parts
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(AnalysisError::Generation(format!(
            "Empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}
