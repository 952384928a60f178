//! Domain models for search jobs and result records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuaestorError;

/// Upper bound on `max_results` accepted per search.
pub const MAX_RESULTS_CEILING: usize = 1000;

/// Lifecycle state of a search job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed  => "completed",
            JobStatus::Failed     => "failed",
        }
    }
}

/// The supported literature sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSpec {
    PubMed,
    Arxiv,
    CrossRef,
}

impl SourceSpec {
    pub const ALL: [SourceSpec; 3] = [SourceSpec::PubMed, SourceSpec::Arxiv, SourceSpec::CrossRef];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSpec::PubMed   => "pubmed",
            SourceSpec::Arxiv    => "arxiv",
            SourceSpec::CrossRef => "crossref",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pubmed"   => Some(SourceSpec::PubMed),
            "arxiv"    => Some(SourceSpec::Arxiv),
            "crossref" => Some(SourceSpec::CrossRef),
            _          => None,
        }
    }
}

/// Constraints applied to a single search job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConstraints {
    pub max_results: usize,
    pub sources: Vec<SourceSpec>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub language: Option<String>,
    pub use_ai_enhancement: bool,
}

impl Default for SearchConstraints {
    fn default() -> Self {
        Self {
            max_results: 100,
            sources: vec![SourceSpec::PubMed, SourceSpec::Arxiv],
            date_from: None,
            date_to: None,
            language: None,
            use_ai_enhancement: false,
        }
    }
}

impl SearchConstraints {
    /// Validate a submission. Every rejection carries a message suitable
    /// for a 400 response body.
    pub fn validate(&self, query: &str) -> Result<(), QuaestorError> {
        if query.trim().is_empty() {
            return Err(QuaestorError::Validation("query must not be empty".into()));
        }
        if self.max_results == 0 {
            return Err(QuaestorError::Validation("max_results must be positive".into()));
        }
        if self.max_results > MAX_RESULTS_CEILING {
            return Err(QuaestorError::Validation(format!(
                "max_results must be at most {MAX_RESULTS_CEILING}"
            )));
        }
        if self.sources.is_empty() {
            return Err(QuaestorError::Validation(
                "at least one source must be requested".into(),
            ));
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(QuaestorError::Validation(format!(
                    "date_from ({from}) must not be after date_to ({to})"
                )));
            }
        }
        Ok(())
    }
}

/// AI-generated relevance analysis attached to a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enhancement {
    pub relevance_score: f64,
    pub topics: Vec<String>,
    pub key_insights: String,
    pub geographic_relevance: Option<String>,
}

/// A normalized result record from one literature source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Source-assigned identifier (PMID, arXiv id, DOI, …).
    pub id: String,
    pub source: SourceSpec,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub url: Option<String>,
    pub doi: Option<String>,
    pub published: Option<NaiveDate>,
    pub enhancement: Option<Enhancement>,
}

/// Outcome of one source connector within a job. `error == None` means
/// the connector resolved successfully (possibly with zero records).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: SourceSpec,
    pub records: usize,
    pub error: Option<String>,
}

/// The unit of work tracking one submitted query's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchJob {
    pub id: Uuid,
    pub query: String,
    pub enhanced_query: Option<String>,
    pub constraints: SearchConstraints,
    pub status: JobStatus,
    pub results_count: usize,
    pub source_outcomes: Vec<SourceOutcome>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchJob {
    pub fn new(query: impl Into<String>, constraints: SearchConstraints) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            enhanced_query: None,
            constraints,
            status: JobStatus::Processing,
            results_count: 0,
            source_outcomes: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Compact job view for the recent-searches listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub query: String,
    pub status: JobStatus,
    pub results_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&SearchJob> for JobSummary {
    fn from(job: &SearchJob) -> Self {
        Self {
            id: job.id,
            query: job.query.clone(),
            status: job.status,
            results_count: job.results_count,
            created_at: job.created_at,
        }
    }
}
