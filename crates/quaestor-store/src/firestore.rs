//! Firestore REST [`JobStore`] backend.
//!
//! Document layout:
//!   searches/{search_id}                 — job document
//!   searches/{search_id}/results/{id}    — one document per result record
//!
//! Result records carry the full record as a JSON payload plus a few
//! queryable fields (`seq`, `title`, `source`); `seq` preserves insertion
//! order so paginated reads stay stable. Writes are batched at the
//! Firestore limit of 500. No multi-document transactions are used — the
//! orchestrator tolerates a job document existing before all of its
//! records have landed.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use quaestor_common::models::{JobStatus, JobSummary, RecordMetadata, SearchJob};
use quaestor_common::sandbox::SandboxClient;

use crate::{JobStore, Result, StoreError};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
const WRITE_BATCH_LIMIT: usize = 500;

pub struct FirestoreStore {
    client: SandboxClient,
    project_id: String,
    bearer_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, bearer_token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: SandboxClient::new()?,
            project_id: project_id.into(),
            bearer_token,
        })
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn documents_root(&self) -> String {
        format!("{FIRESTORE_BASE}/{}/documents", self.database_path())
    }

    fn job_doc_url(&self, id: Uuid) -> String {
        format!("{}/searches/{}", self.documents_root(), id)
    }

    fn auth(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(t) => rb.bearer_auth(t),
            None => rb,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!(
                "Firestore returned {status}: {body}"
            )));
        }
        Ok(resp.json().await?)
    }

    /// GET a document; `None` on 404.
    async fn get_document(&self, url: &str) -> Result<Option<Value>> {
        let resp = self.auth(self.client.get(url)?).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(resp).await?))
    }

    async fn run_query(&self, parent_url: &str, structured_query: Value) -> Result<Vec<Value>> {
        let url = format!("{parent_url}:runQuery");
        let resp = self
            .auth(self.client.post(&url)?)
            .json(&json!({ "structuredQuery": structured_query }))
            .send()
            .await?;
        let body = Self::check(resp).await?;
        // runQuery streams an array of {document}/{readTime} entries.
        let docs = body
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("document").cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    /// Count the result records under a job via an aggregation query.
    async fn count_records(&self, id: Uuid) -> Result<usize> {
        let url = format!("{}:runAggregationQuery", self.job_doc_url(id));
        let body = json!({
            "structuredAggregationQuery": {
                "structuredQuery": { "from": [{ "collectionId": "results" }] },
                "aggregations": [{ "alias": "total", "count": {} }]
            }
        });
        let resp = self.auth(self.client.post(&url)?).json(&body).send().await?;
        let body = Self::check(resp).await?;
        let total = body
            .as_array()
            .and_then(|a| a.first())
            .and_then(|e| e["result"]["aggregateFields"]["total"]["integerValue"].as_str())
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        Ok(total)
    }

    async fn batch_write(&self, writes: Vec<Value>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{FIRESTORE_BASE}/{}/documents:batchWrite",
            self.database_path()
        );
        for chunk in writes.chunks(WRITE_BATCH_LIMIT) {
            let resp = self
                .auth(self.client.post(&url)?)
                .json(&json!({ "writes": chunk }))
                .send()
                .await?;
            Self::check(resp).await?;
        }
        Ok(())
    }

    fn record_doc_name(&self, job_id: Uuid, record_id: &str) -> String {
        format!(
            "{}/documents/searches/{}/results/{}",
            self.database_path(),
            job_id,
            sanitize_doc_id(record_id)
        )
    }
}

#[async_trait]
impl JobStore for FirestoreStore {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create_job(&self, job: &SearchJob) -> Result<()> {
        let url = self.job_doc_url(job.id);
        let resp = self
            .auth(self.client.patch(&url)?)
            .json(&json!({ "fields": job_to_fields(job)? }))
            .send()
            .await?;
        Self::check(resp).await?;
        debug!("job document created");
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<SearchJob>> {
        match self.get_document(&self.job_doc_url(id)).await? {
            Some(doc) => Ok(Some(fields_to_job(&doc["fields"])?)),
            None => Ok(None),
        }
    }

    async fn update_job(&self, job: &SearchJob) -> Result<()> {
        // Same PATCH as create; the orchestrator checks existence first so
        // a deleted job is not resurrected.
        self.create_job(job).await
    }

    #[instrument(skip(self, records), fields(job_id = %id, n = records.len()))]
    async fn append_records(&self, id: Uuid, records: &[RecordMetadata]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let seq_base = self.count_records(id).await?;
        let writes = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Ok(json!({
                    "update": {
                        "name": self.record_doc_name(id, &r.id),
                        "fields": record_to_fields(r, seq_base + i)?
                    }
                }))
            })
            .collect::<Result<Vec<Value>>>()?;
        self.batch_write(writes).await
    }

    async fn get_records(
        &self,
        id: Uuid,
        page: usize,
        page_size: usize,
    ) -> Result<Option<(Vec<RecordMetadata>, usize)>> {
        if self.get_document(&self.job_doc_url(id)).await?.is_none() {
            return Ok(None);
        }
        let total = self.count_records(id).await?;
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let docs = self
            .run_query(
                &self.job_doc_url(id),
                json!({
                    "from": [{ "collectionId": "results" }],
                    "orderBy": [{ "field": { "fieldPath": "seq" }, "direction": "ASCENDING" }],
                    "offset": offset,
                    "limit": page_size
                }),
            )
            .await?;
        let records = docs
            .iter()
            .map(|d| fields_to_record(&d["fields"]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some((records, total)))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>> {
        let docs = self
            .run_query(
                &self.documents_root(),
                json!({
                    "from": [{ "collectionId": "searches" }],
                    "orderBy": [{ "field": { "fieldPath": "created_at" }, "direction": "DESCENDING" }],
                    "limit": limit
                }),
            )
            .await?;
        docs.iter()
            .map(|d| fields_to_job(&d["fields"]).map(|j| JobSummary::from(&j)))
            .collect()
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        if self.get_document(&self.job_doc_url(id)).await?.is_none() {
            return Ok(false);
        }

        // Delete result records first, then the job document itself.
        let docs = self
            .run_query(
                &self.job_doc_url(id),
                json!({
                    "from": [{ "collectionId": "results" }],
                    "select": { "fields": [{ "fieldPath": "__name__" }] }
                }),
            )
            .await?;
        let deletes: Vec<Value> = docs
            .iter()
            .filter_map(|d| d["name"].as_str())
            .map(|name| json!({ "delete": name }))
            .collect();
        self.batch_write(deletes).await?;

        let resp = self
            .auth(self.client.delete(&self.job_doc_url(id))?)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(true)
    }

    async fn job_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.get_document(&self.job_doc_url(id)).await?.is_some())
    }
}

// ── Typed-value encoding ──────────────────────────────────────────────────────

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

fn integer_value(n: usize) -> Value {
    // Firestore encodes int64 as a decimal string.
    json!({ "integerValue": n.to_string() })
}

fn timestamp_value(t: &DateTime<Utc>) -> Value {
    json!({ "timestampValue": t.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

fn get_string(fields: &Value, name: &str) -> Option<String> {
    fields[name]["stringValue"].as_str().map(String::from)
}

fn get_integer(fields: &Value, name: &str) -> usize {
    fields[name]["integerValue"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn get_timestamp(fields: &Value, name: &str) -> Result<DateTime<Utc>> {
    let raw = fields[name]["timestampValue"]
        .as_str()
        .ok_or_else(|| StoreError::Backend(format!("missing timestamp field {name}")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp in {name}: {e}")))
}

/// Firestore document ids must not contain `/` (DOIs do).
fn sanitize_doc_id(id: &str) -> String {
    id.replace(['/', ' '], "_")
}

fn job_to_fields(job: &SearchJob) -> Result<Value> {
    let mut fields = json!({
        "search_id": string_value(&job.id.to_string()),
        "query": string_value(&job.query),
        "status": string_value(job.status.as_str()),
        "results_count": integer_value(job.results_count),
        "constraints": string_value(&serde_json::to_string(&job.constraints)?),
        "source_outcomes": string_value(&serde_json::to_string(&job.source_outcomes)?),
        "created_at": timestamp_value(&job.created_at),
        "updated_at": timestamp_value(&job.updated_at),
    });
    if let Some(ref q) = job.enhanced_query {
        fields["enhanced_query"] = string_value(q);
    }
    if let Some(ref e) = job.error {
        fields["error"] = string_value(e);
    }
    Ok(fields)
}

fn fields_to_job(fields: &Value) -> Result<SearchJob> {
    let id = get_string(fields, "search_id")
        .and_then(|s| Uuid::parse_str(&s).ok())
        .ok_or_else(|| StoreError::Backend("job document missing search_id".into()))?;
    let status = match get_string(fields, "status").as_deref() {
        Some("completed") => JobStatus::Completed,
        Some("failed") => JobStatus::Failed,
        _ => JobStatus::Processing,
    };
    let constraints = get_string(fields, "constraints")
        .ok_or_else(|| StoreError::Backend("job document missing constraints".into()))
        .and_then(|s| serde_json::from_str(&s).map_err(StoreError::from))?;
    let source_outcomes = match get_string(fields, "source_outcomes") {
        Some(s) => serde_json::from_str(&s)?,
        None => Vec::new(),
    };

    Ok(SearchJob {
        id,
        query: get_string(fields, "query").unwrap_or_default(),
        enhanced_query: get_string(fields, "enhanced_query"),
        constraints,
        status,
        results_count: get_integer(fields, "results_count"),
        source_outcomes,
        error: get_string(fields, "error"),
        created_at: get_timestamp(fields, "created_at")?,
        updated_at: get_timestamp(fields, "updated_at")?,
    })
}

fn record_to_fields(record: &RecordMetadata, seq: usize) -> Result<Value> {
    Ok(json!({
        "seq": integer_value(seq),
        "title": string_value(&record.title),
        "source": string_value(record.source.as_str()),
        "record": string_value(&serde_json::to_string(record)?),
    }))
}

fn fields_to_record(fields: &Value) -> Result<RecordMetadata> {
    let raw = get_string(fields, "record")
        .ok_or_else(|| StoreError::Backend("result document missing record payload".into()))?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quaestor_common::models::{SearchConstraints, SourceOutcome, SourceSpec};

    #[test]
    fn test_job_fields_roundtrip() {
        let mut job = SearchJob::new("treasury management", SearchConstraints::default());
        job.enhanced_query = Some("treasury management OR cash pooling".into());
        job.status = JobStatus::Completed;
        job.results_count = 42;
        job.source_outcomes.push(SourceOutcome {
            source: SourceSpec::Arxiv,
            records: 42,
            error: None,
        });

        let fields = job_to_fields(&job).unwrap();
        let back = fields_to_job(&fields).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.query, job.query);
        assert_eq!(back.enhanced_query, job.enhanced_query);
        assert_eq!(back.status, JobStatus::Completed);
        assert_eq!(back.results_count, 42);
        assert_eq!(back.source_outcomes.len(), 1);
    }

    #[test]
    fn test_record_fields_roundtrip() {
        let record = RecordMetadata {
            id: "10.1111/abcd.12345".into(),
            source: SourceSpec::CrossRef,
            title: "Corporate cash holdings".into(),
            authors: vec!["A. Author".into()],
            abstract_text: Some("Treasury abstract.".into()),
            url: Some("https://doi.org/10.1111/abcd.12345".into()),
            doi: Some("10.1111/abcd.12345".into()),
            published: None,
            enhancement: None,
        };
        let fields = record_to_fields(&record, 7).unwrap();
        assert_eq!(fields["seq"]["integerValue"], "7");
        let back = fields_to_record(&fields).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.title, record.title);
    }

    #[test]
    fn test_sanitize_doc_id_strips_slashes() {
        assert_eq!(sanitize_doc_id("10.1111/abcd.123"), "10.1111_abcd.123");
        assert_eq!(sanitize_doc_id("arxiv 2401.0001"), "arxiv_2401.0001");
    }

    #[test]
    fn test_missing_status_defaults_to_processing() {
        let job = SearchJob::new("q", SearchConstraints::default());
        let mut fields = job_to_fields(&job).unwrap();
        fields.as_object_mut().unwrap().remove("status");
        assert_eq!(fields_to_job(&fields).unwrap().status, JobStatus::Processing);
    }
}
