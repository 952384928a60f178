//! Search-job orchestration.
//!
//! `submit` validates, persists a `processing` job, spawns the background
//! pipeline, and returns immediately. The pipeline fans out to every
//! requested source concurrently, merges results as each source finishes,
//! and flips the job to `completed` or `failed` at the end. One source
//! failing never fails the job as long as another succeeds.
//!
//! Single-writer discipline: the spawned pipeline task is the only writer
//! for its job. Deletion is handled cooperatively, the pipeline probes
//! `job_exists` before each write and stops silently once the job is gone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use quaestor_common::models::{
    JobStatus, JobSummary, RecordMetadata, SearchConstraints, SearchJob, SourceOutcome, SourceSpec,
};
use quaestor_common::QuaestorError;
use quaestor_llm::enhancer::Enhancer;
use quaestor_store::JobStore;

use crate::sources::LiteratureSource;

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ENHANCE_TIMEOUT: Duration = Duration::from_secs(30);

type Result<T> = std::result::Result<T, QuaestorError>;

/// Orchestrates search jobs end to end. Cheap to clone; all state is
/// behind `Arc`.
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn JobStore>,
    connectors: Arc<HashMap<SourceSpec, Arc<dyn LiteratureSource>>>,
    enhancer: Option<Arc<Enhancer>>,
    source_timeout: Duration,
    enhance_timeout: Duration,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn JobStore>,
        connectors: Vec<Arc<dyn LiteratureSource>>,
        enhancer: Option<Arc<Enhancer>>,
    ) -> Self {
        let connectors = connectors.into_iter().map(|c| (c.name(), c)).collect();
        Self {
            store,
            connectors: Arc::new(connectors),
            enhancer,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            enhance_timeout: DEFAULT_ENHANCE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, source: Duration, enhance: Duration) -> Self {
        self.source_timeout = source;
        self.enhance_timeout = enhance;
        self
    }

    // ── Operations ─────────────────────────────────────────────────────────

    /// Validate and persist a new job, then kick off the background
    /// pipeline. Returns the job id without waiting for any source.
    #[instrument(skip(self, constraints))]
    pub async fn submit(&self, query: &str, constraints: SearchConstraints) -> Result<Uuid> {
        constraints.validate(query)?;

        let job = SearchJob::new(query.trim(), constraints);
        let id = job.id;
        self.store.create_job(&job).await?;
        info!(%id, query = %job.query, "search job accepted");

        let service = self.clone();
        tokio::spawn(async move {
            service.run_job(job).await;
        });

        Ok(id)
    }

    pub async fn status(&self, id: Uuid) -> Result<SearchJob> {
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| QuaestorError::NotFound(format!("search job {id} not found")))
    }

    /// A stable page of records plus the total count. Pages are 1-based;
    /// records keep insertion order so pagination stays consistent even
    /// while the job is still processing.
    pub async fn results(
        &self,
        id: Uuid,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<RecordMetadata>, usize)> {
        if page == 0 {
            return Err(QuaestorError::Validation("page must be at least 1".into()));
        }
        if page_size == 0 {
            return Err(QuaestorError::Validation(
                "page_size must be at least 1".into(),
            ));
        }
        self.store
            .get_records(id, page, page_size)
            .await?
            .ok_or_else(|| QuaestorError::NotFound(format!("search job {id} not found")))
    }

    pub async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>> {
        Ok(self.store.list_recent(limit).await?)
    }

    /// Delete a job and its records. Idempotent; returns whether the job
    /// existed. A mid-flight pipeline for this job notices the deletion
    /// and stops writing.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.store.delete_job(id).await?)
    }

    // ── Pipeline ───────────────────────────────────────────────────────────

    #[instrument(skip(self, job), fields(id = %job.id))]
    async fn run_job(&self, mut job: SearchJob) {
        // Step 1: optional query rewrite.
        if job.constraints.use_ai_enhancement {
            if let Some(enhancer) = &self.enhancer {
                match timeout(self.enhance_timeout, enhancer.enhance_query(&job.query)).await {
                    Ok(rewritten) if rewritten != job.query => {
                        debug!(%rewritten, "query rewritten");
                        job.enhanced_query = Some(rewritten);
                    }
                    Ok(_) => {}
                    Err(_) => warn!("query enhancement timed out, using original query"),
                }
                if !self.write_progress(&mut job).await {
                    return;
                }
            }
        }
        let effective_query = job.enhanced_query.clone().unwrap_or_else(|| job.query.clone());

        // Step 2: fan out to every requested source.
        let mut failures: Vec<String> = Vec::new();
        let mut tasks = JoinSet::new();
        for spec in job.constraints.sources.clone() {
            let Some(connector) = self.connectors.get(&spec).cloned() else {
                failures.push(format!("{}: no connector configured", spec.as_str()));
                job.source_outcomes.push(SourceOutcome {
                    source: spec,
                    records: 0,
                    error: Some("no connector configured for this source".into()),
                });
                continue;
            };
            let query = effective_query.clone();
            let constraints = job.constraints.clone();
            let per_source = self.source_timeout;
            tasks.spawn(async move {
                let outcome = match timeout(per_source, connector.search(&query, &constraints)).await
                {
                    Ok(Ok(records)) => Ok(records),
                    Ok(Err(e))      => Err(e.to_string()),
                    Err(_)          => Err(format!("timed out after {}s", per_source.as_secs())),
                };
                (spec, outcome)
            });
        }

        // Step 3: merge as each source lands. This loop is the job's only
        // writer, so incremental counts never race.
        while let Some(joined) = tasks.join_next().await {
            let (spec, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("source task panicked: {e}");
                    failures.push(format!("internal: {e}"));
                    continue;
                }
            };

            match outcome {
                Ok(mut records) => {
                    // max_results caps the job total, not each source.
                    let remaining =
                        job.constraints.max_results.saturating_sub(job.results_count);
                    records.truncate(remaining);

                    if job.constraints.use_ai_enhancement {
                        self.enhance_batch(&mut records).await;
                    }

                    if !self.job_still_exists(job.id).await {
                        tasks.abort_all();
                        info!(id = %job.id, "job deleted mid-flight, discarding results");
                        return;
                    }
                    if let Err(e) = self.store.append_records(job.id, &records).await {
                        warn!(source = spec.as_str(), "failed to persist records: {e}");
                        failures.push(format!("{}: {e}", spec.as_str()));
                        job.source_outcomes.push(SourceOutcome {
                            source: spec,
                            records: 0,
                            error: Some(e.to_string()),
                        });
                    } else {
                        job.results_count += records.len();
                        job.source_outcomes.push(SourceOutcome {
                            source: spec,
                            records: records.len(),
                            error: None,
                        });
                        debug!(source = spec.as_str(), n = records.len(), "records merged");
                    }
                }
                Err(msg) => {
                    warn!(source = spec.as_str(), "source failed: {msg}");
                    failures.push(format!("{}: {msg}", spec.as_str()));
                    job.source_outcomes.push(SourceOutcome {
                        source: spec,
                        records: 0,
                        error: Some(msg),
                    });
                }
            }

            if !self.write_progress(&mut job).await {
                tasks.abort_all();
                return;
            }
        }

        // Step 4: finalize. Completed as long as at least one source
        // resolved; failed only when every source errored out.
        let any_ok = job.source_outcomes.iter().any(|o| o.error.is_none());
        if any_ok {
            job.status = JobStatus::Completed;
        } else {
            job.status = JobStatus::Failed;
            job.error = Some(if failures.is_empty() {
                "no sources produced results".to_string()
            } else {
                failures.join("; ")
            });
        }
        if self.write_progress(&mut job).await {
            info!(
                id = %job.id,
                status = job.status.as_str(),
                results = job.results_count,
                "search job finished"
            );
        }
    }

    /// Analyze each record in place. A slow or broken backend degrades to
    /// unenhanced records instead of failing the batch.
    async fn enhance_batch(&self, records: &mut [RecordMetadata]) {
        let Some(enhancer) = &self.enhancer else {
            return;
        };
        for record in records.iter_mut() {
            let analysis = timeout(
                self.enhance_timeout,
                enhancer.analyze(&record.title, record.abstract_text.as_deref()),
            )
            .await;
            match analysis {
                Ok(enhancement) => record.enhancement = Some(enhancement),
                Err(_) => {
                    warn!("record analysis timed out, leaving batch unenhanced");
                    break;
                }
            }
        }
    }

    /// Persist job progress unless the job was deleted. Returns false when
    /// the pipeline should stop writing.
    async fn write_progress(&self, job: &mut SearchJob) -> bool {
        if !self.job_still_exists(job.id).await {
            info!(id = %job.id, "job deleted mid-flight, dropping update");
            return false;
        }
        job.updated_at = Utc::now();
        if let Err(e) = self.store.update_job(job).await {
            warn!(id = %job.id, "failed to persist job update: {e}");
        }
        true
    }

    async fn job_still_exists(&self, id: Uuid) -> bool {
        self.store.job_exists(id).await.unwrap_or(false)
    }
}
