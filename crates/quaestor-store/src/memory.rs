//! In-memory [`JobStore`] implementation.
//!
//! Used by the test suites and as the runtime fallback when no Firestore
//! credentials are configured. Records are kept in insertion order, which
//! is what gives paginated reads their stability.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use quaestor_common::models::{JobSummary, RecordMetadata, SearchJob};

use crate::{JobStore, Result};

struct Entry {
    job: SearchJob,
    records: Vec<RecordMetadata>,
}

#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &SearchJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(
            job.id,
            Entry {
                job: job.clone(),
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<SearchJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id).map(|e| e.job.clone()))
    }

    async fn update_job(&self, job: &SearchJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        // Writes for a deleted job are silently discarded.
        if let Some(entry) = jobs.get_mut(&job.id) {
            entry.job = job.clone();
        }
        Ok(())
    }

    async fn append_records(&self, id: Uuid, records: &[RecordMetadata]) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(&id) {
            entry.records.extend_from_slice(records);
        }
        Ok(())
    }

    async fn get_records(
        &self,
        id: Uuid,
        page: usize,
        page_size: usize,
    ) -> Result<Option<(Vec<RecordMetadata>, usize)>> {
        let jobs = self.jobs.read().await;
        let Some(entry) = jobs.get(&id) else {
            return Ok(None);
        };
        let total = entry.records.len();
        let start = page.saturating_sub(1).saturating_mul(page_size);
        let slice = entry
            .records
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();
        Ok(Some((slice, total)))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<JobSummary> =
            jobs.values().map(|e| JobSummary::from(&e.job)).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.remove(&id).is_some())
    }

    async fn job_exists(&self, id: Uuid) -> Result<bool> {
        let jobs = self.jobs.read().await;
        Ok(jobs.contains_key(&id))
    }
}
