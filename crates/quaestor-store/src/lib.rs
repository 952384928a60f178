//! quaestor-store — Persistence connector for search jobs and result
//! records.
//!
//! The [`JobStore`] trait defines every storage operation the orchestrator
//! needs (create/read/update/delete/list plus record pagination), enabling
//! pluggable backends:
//!   - [`memory::MemoryStore`] — process-local, used in tests and as the
//!     credential-less fallback
//!   - [`firestore::FirestoreStore`] — Firestore REST API

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use quaestor_common::models::{JobSummary, RecordMetadata, SearchJob};
use quaestor_common::QuaestorError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for QuaestorError {
    fn from(e: StoreError) -> Self {
        QuaestorError::Store(e.to_string())
    }
}

impl From<QuaestorError> for StoreError {
    fn from(e: QuaestorError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Abstract document store for search jobs.
///
/// No multi-document transactional guarantees are assumed: a job document
/// may be visible before all of its result records have landed. Callers
/// read the job status to decide whether a partial record set is expected.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly created job.
    async fn create_job(&self, job: &SearchJob) -> Result<()>;

    /// Fetch a job by id; `None` if unknown.
    async fn get_job(&self, id: Uuid) -> Result<Option<SearchJob>>;

    /// Overwrite a job's mutable fields (status, counts, outcomes, error).
    /// Only the single orchestrator task for the job may call this.
    async fn update_job(&self, job: &SearchJob) -> Result<()>;

    /// Append result records to a job, preserving insertion order.
    async fn append_records(&self, id: Uuid, records: &[RecordMetadata]) -> Result<()>;

    /// A stable-ordered page of records plus the total count.
    /// `page` is 1-based. `None` if the job is unknown.
    async fn get_records(
        &self,
        id: Uuid,
        page: usize,
        page_size: usize,
    ) -> Result<Option<(Vec<RecordMetadata>, usize)>>;

    /// Most-recent-first job summaries.
    async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>>;

    /// Delete a job and all of its records. Returns whether the job
    /// existed; deleting an unknown id is not an error.
    async fn delete_job(&self, id: Uuid) -> Result<bool>;

    /// Cheap existence probe used by the orchestrator before each write.
    async fn job_exists(&self, id: Uuid) -> Result<bool>;
}
