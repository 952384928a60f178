//! Literature source clients.

pub mod arxiv;
pub mod crossref;
pub mod pubmed;

use async_trait::async_trait;

use quaestor_common::models::{RecordMetadata, SearchConstraints, SourceSpec};

/// Common interface for all literature source clients.
///
/// Recoverable upstream conditions (rate limiting, empty result sets) must
/// not surface as errors — return an empty list instead. An `Err` from
/// `search` is recorded by the orchestrator as a per-source failure and
/// never aborts the whole job.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Which source this client wraps.
    fn name(&self) -> SourceSpec;

    /// Search for records matching a query under the given constraints.
    /// Connectors honor `max_results`, the date range, and the language
    /// filter wherever the upstream API supports them.
    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<RecordMetadata>>;
}
