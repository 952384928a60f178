//! Query rewriting and per-record relevance analysis.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use quaestor_common::models::Enhancement;

use crate::backend::{LlmBackend, LlmRequest};

const SYSTEM_INSTRUCTION: &str = "You are an expert in treasury management, corporate finance, \
and financial operations. You enhance search queries for treasury-related research and analyze \
papers for treasury relevance (cash management, liquidity, risk management, treasury operations, \
financial planning, corporate treasury). Always consider international perspectives.";

/// Best-effort enhancement wrapper. Every public method swallows backend
/// failures and falls back to a neutral result — a broken or slow LLM
/// must never fail a search job.
pub struct Enhancer {
    backend: Arc<dyn LlmBackend>,
}

impl Enhancer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Rewrite a query with treasury-domain synonyms and variations.
    /// Returns the original query on error or when the rewrite looks
    /// degenerate (shorter than half the original).
    pub async fn enhance_query(&self, original: &str) -> String {
        let prompt = format!(
            "Enhance the following search query to find treasury-related research and content \
             worldwide. Add relevant terms, synonyms, and international variations while keeping \
             the original intent.\n\nOriginal query: {original}\n\n\
             Return ONLY the enhanced query string, nothing else."
        );
        let req = LlmRequest::user(prompt).with_system(SYSTEM_INSTRUCTION);

        match self.backend.complete(req).await {
            Ok(text) => {
                let enhanced = text.trim().to_string();
                if enhanced.len() < original.len() / 2 {
                    debug!("rewrite too short, keeping original query");
                    original.to_string()
                } else {
                    enhanced
                }
            }
            Err(e) => {
                warn!("query enhancement failed: {e}");
                original.to_string()
            }
        }
    }

    /// Analyze one record for treasury relevance. Falls back to a neutral
    /// 0.5 score when the backend fails or returns unusable JSON.
    pub async fn analyze(&self, title: &str, abstract_text: Option<&str>) -> Enhancement {
        let excerpt: String = abstract_text.unwrap_or("").chars().take(1000).collect();
        let prompt = format!(
            "Analyze the following research content for treasury relevance. Determine how \
             relevant it is to treasury management, corporate finance, or financial operations.\n\n\
             Title: {title}\nAbstract: {excerpt}"
        );
        let req = LlmRequest::user(prompt).with_system(SYSTEM_INSTRUCTION);

        match self
            .backend
            .complete_structured(req, analysis_schema())
            .await
        {
            Ok(value) => parse_analysis(&value),
            Err(e) => {
                warn!("record analysis failed: {e}");
                neutral_enhancement()
            }
        }
    }
}

fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "relevance_score": {
                "type": "NUMBER",
                "description": "Relevance score from 0.0 to 1.0 for treasury topics"
            },
            "treasury_topics": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Treasury topics found (e.g., cash management, liquidity, risk)"
            },
            "key_insights": {
                "type": "STRING",
                "description": "Brief summary of treasury-related insights"
            },
            "geographic_relevance": {
                "type": "STRING",
                "description": "Geographic scope mentioned (global, specific regions, etc.)"
            }
        },
        "required": ["relevance_score", "treasury_topics", "key_insights"]
    })
}

fn parse_analysis(value: &Value) -> Enhancement {
    Enhancement {
        relevance_score: value["relevance_score"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0),
        topics: value["treasury_topics"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|t| t.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
        key_insights: value["key_insights"]
            .as_str()
            .unwrap_or("Analysis unavailable")
            .to_string(),
        geographic_relevance: value["geographic_relevance"].as_str().map(String::from),
    }
}

fn neutral_enhancement() -> Enhancement {
    Enhancement {
        relevance_score: 0.5,
        topics: Vec::new(),
        key_insights: "Analysis unavailable".to_string(),
        geographic_relevance: None,
    }
}
