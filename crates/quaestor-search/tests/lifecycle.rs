//! End-to-end job lifecycle tests against the in-memory store, with mock
//! source connectors and a mock LLM backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::sleep;
use uuid::Uuid;

use quaestor_common::models::{
    JobStatus, RecordMetadata, SearchConstraints, SearchJob, SourceSpec,
};
use quaestor_common::QuaestorError;
use quaestor_llm::backend::{LlmBackend, LlmError, LlmRequest};
use quaestor_llm::enhancer::Enhancer;
use quaestor_search::sources::LiteratureSource;
use quaestor_search::SearchService;
use quaestor_store::memory::MemoryStore;
use quaestor_store::JobStore;

// ── Mocks ──────────────────────────────────────────────────────────────────

enum Behavior {
    Records(usize),
    Fail(&'static str),
    Slow(Duration, usize),
}

struct MockSource {
    spec: SourceSpec,
    behavior: Behavior,
}

impl MockSource {
    fn new(spec: SourceSpec, behavior: Behavior) -> Arc<dyn LiteratureSource> {
        Arc::new(Self { spec, behavior })
    }
}

fn make_records(spec: SourceSpec, n: usize) -> Vec<RecordMetadata> {
    (0..n)
        .map(|i| RecordMetadata {
            id: format!("{}-{i}", spec.as_str()),
            source: spec,
            title: format!("{} paper {i}", spec.as_str()),
            authors: vec!["A. Author".to_string()],
            abstract_text: Some("Liquidity buffers in corporate treasuries.".to_string()),
            url: None,
            doi: None,
            published: None,
            enhancement: None,
        })
        .collect()
}

#[async_trait]
impl LiteratureSource for MockSource {
    fn name(&self) -> SourceSpec {
        self.spec
    }

    async fn search(
        &self,
        _query: &str,
        _constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<RecordMetadata>> {
        match &self.behavior {
            Behavior::Records(n) => Ok(make_records(self.spec, *n)),
            Behavior::Fail(msg) => anyhow::bail!("{msg}"),
            Behavior::Slow(delay, n) => {
                sleep(*delay).await;
                Ok(make_records(self.spec, *n))
            }
        }
    }
}

struct MockBackend {
    rewrite: String,
    delay: Option<Duration>,
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, _req: LlmRequest) -> Result<String, LlmError> {
        if let Some(d) = self.delay {
            sleep(d).await;
        }
        Ok(self.rewrite.clone())
    }

    async fn complete_structured(
        &self,
        _req: LlmRequest,
        _schema: Value,
    ) -> Result<Value, LlmError> {
        if let Some(d) = self.delay {
            sleep(d).await;
        }
        Ok(json!({
            "relevance_score": 0.8,
            "treasury_topics": ["liquidity"],
            "key_insights": "Relevant to cash management.",
            "geographic_relevance": "global"
        }))
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn service(sources: Vec<Arc<dyn LiteratureSource>>) -> (SearchService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let svc = SearchService::new(store.clone(), sources, None);
    (svc, store)
}

fn service_with_enhancer(
    sources: Vec<Arc<dyn LiteratureSource>>,
    backend: MockBackend,
) -> SearchService {
    let store = Arc::new(MemoryStore::new());
    let enhancer = Arc::new(Enhancer::new(Arc::new(backend)));
    SearchService::new(store, sources, Some(enhancer))
}

async fn wait_for_terminal(svc: &SearchService, id: Uuid) -> SearchJob {
    for _ in 0..200 {
        let job = svc.status(id).await.expect("job should exist");
        if job.status != JobStatus::Processing {
            return job;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached a terminal status");
}

fn constraints(sources: Vec<SourceSpec>) -> SearchConstraints {
    SearchConstraints {
        sources,
        ..SearchConstraints::default()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_submit_acknowledges_before_sources_finish() {
    let (svc, _) = service(vec![MockSource::new(
        SourceSpec::PubMed,
        Behavior::Slow(Duration::from_millis(200), 2),
    )]);

    let id = svc
        .submit("treasury management", constraints(vec![SourceSpec::PubMed]))
        .await
        .unwrap();

    let early = svc.status(id).await.unwrap();
    assert_eq!(early.status, JobStatus::Processing);
    assert_eq!(early.results_count, 0);

    let done = wait_for_terminal(&svc, id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.results_count, 2);
}

#[tokio::test]
async fn test_partial_failure_still_completes() {
    let (svc, _) = service(vec![
        MockSource::new(SourceSpec::PubMed, Behavior::Records(3)),
        MockSource::new(SourceSpec::Arxiv, Behavior::Fail("upstream 503")),
    ]);

    let id = svc
        .submit(
            "liquidity risk",
            constraints(vec![SourceSpec::PubMed, SourceSpec::Arxiv]),
        )
        .await
        .unwrap();
    let job = wait_for_terminal(&svc, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results_count, 3);
    assert!(job.error.is_none());

    let arxiv = job
        .source_outcomes
        .iter()
        .find(|o| o.source == SourceSpec::Arxiv)
        .unwrap();
    assert!(arxiv.error.as_deref().unwrap().contains("upstream 503"));
    let pubmed = job
        .source_outcomes
        .iter()
        .find(|o| o.source == SourceSpec::PubMed)
        .unwrap();
    assert!(pubmed.error.is_none());
    assert_eq!(pubmed.records, 3);
}

#[tokio::test]
async fn test_all_sources_failing_fails_the_job() {
    let (svc, _) = service(vec![
        MockSource::new(SourceSpec::PubMed, Behavior::Fail("rate limited")),
        MockSource::new(SourceSpec::Arxiv, Behavior::Fail("connection reset")),
    ]);

    let id = svc
        .submit(
            "cash pooling",
            constraints(vec![SourceSpec::PubMed, SourceSpec::Arxiv]),
        )
        .await
        .unwrap();
    let job = wait_for_terminal(&svc, id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.results_count, 0);
    let error = job.error.unwrap();
    assert!(error.contains("rate limited"));
    assert!(error.contains("connection reset"));
}

#[tokio::test]
async fn test_max_results_caps_the_job_total() {
    let (svc, _) = service(vec![
        MockSource::new(SourceSpec::PubMed, Behavior::Records(40)),
        MockSource::new(SourceSpec::Arxiv, Behavior::Records(40)),
    ]);

    let mut c = constraints(vec![SourceSpec::PubMed, SourceSpec::Arxiv]);
    c.max_results = 50;
    let id = svc.submit("fx hedging", c).await.unwrap();
    let job = wait_for_terminal(&svc, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results_count, 50);
    let (_, total) = svc.results(id, 1, 10).await.unwrap();
    assert_eq!(total, 50);
}

#[tokio::test]
async fn test_enhancement_rewrites_query_and_analyzes_records() {
    let svc = service_with_enhancer(
        vec![MockSource::new(SourceSpec::PubMed, Behavior::Records(2))],
        MockBackend {
            rewrite: "treasury management OR cash pooling OR liquidity planning".to_string(),
            delay: None,
        },
    );

    let mut c = constraints(vec![SourceSpec::PubMed]);
    c.use_ai_enhancement = true;
    let id = svc.submit("treasury management", c).await.unwrap();
    let job = wait_for_terminal(&svc, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job
        .enhanced_query
        .as_deref()
        .unwrap()
        .contains("cash pooling"));

    let (records, _) = svc.results(id, 1, 10).await.unwrap();
    let enhancement = records[0].enhancement.as_ref().unwrap();
    assert!((enhancement.relevance_score - 0.8).abs() < f64::EPSILON);
    assert_eq!(enhancement.topics, vec!["liquidity"]);
}

#[tokio::test]
async fn test_slow_enhancer_degrades_to_unenhanced() {
    let store = Arc::new(MemoryStore::new());
    let enhancer = Arc::new(Enhancer::new(Arc::new(MockBackend {
        rewrite: "never arrives in time".to_string(),
        delay: Some(Duration::from_millis(500)),
    })));
    let svc = SearchService::new(
        store,
        vec![MockSource::new(SourceSpec::PubMed, Behavior::Records(2))],
        Some(enhancer),
    )
    .with_timeouts(Duration::from_secs(5), Duration::from_millis(20));

    let mut c = constraints(vec![SourceSpec::PubMed]);
    c.use_ai_enhancement = true;
    let id = svc.submit("liquidity stress", c).await.unwrap();
    let job = wait_for_terminal(&svc, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.enhanced_query.is_none());
    let (records, total) = svc.results(id, 1, 10).await.unwrap();
    assert_eq!(total, 2);
    assert!(records.iter().all(|r| r.enhancement.is_none()));
}

#[tokio::test]
async fn test_delete_mid_flight_discards_late_results() {
    let (svc, store) = service(vec![MockSource::new(
        SourceSpec::PubMed,
        Behavior::Slow(Duration::from_millis(200), 5),
    )]);

    let id = svc
        .submit("working capital", constraints(vec![SourceSpec::PubMed]))
        .await
        .unwrap();
    sleep(Duration::from_millis(20)).await;
    assert!(svc.delete(id).await.unwrap());

    // Let the slow source land and try to write.
    sleep(Duration::from_millis(400)).await;
    assert!(matches!(
        svc.status(id).await,
        Err(QuaestorError::NotFound(_))
    ));
    assert!(!store.job_exists(id).await.unwrap());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (svc, _) = service(vec![MockSource::new(
        SourceSpec::PubMed,
        Behavior::Records(1),
    )]);

    let id = svc
        .submit("cash forecasting", constraints(vec![SourceSpec::PubMed]))
        .await
        .unwrap();
    wait_for_terminal(&svc, id).await;

    assert!(svc.delete(id).await.unwrap());
    assert!(!svc.delete(id).await.unwrap());
}

#[tokio::test]
async fn test_results_pagination_is_stable_and_disjoint() {
    let (svc, _) = service(vec![MockSource::new(
        SourceSpec::Arxiv,
        Behavior::Records(25),
    )]);

    let id = svc
        .submit("payment systems", constraints(vec![SourceSpec::Arxiv]))
        .await
        .unwrap();
    wait_for_terminal(&svc, id).await;

    let mut seen = Vec::new();
    for page in 1..=3 {
        let (records, total) = svc.results(id, page, 10).await.unwrap();
        assert_eq!(total, 25);
        seen.extend(records.into_iter().map(|r| r.id));
    }
    assert_eq!(seen.len(), 25);
    let mut deduped = seen.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), 25, "pages must not overlap");

    // Past-the-end page is empty, not an error.
    let (records, total) = svc.results(id, 4, 10).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(total, 25);
}

#[tokio::test]
async fn test_results_rejects_bad_paging_and_unknown_jobs() {
    let (svc, _) = service(vec![]);

    assert!(matches!(
        svc.results(Uuid::new_v4(), 0, 10).await,
        Err(QuaestorError::Validation(_))
    ));
    assert!(matches!(
        svc.results(Uuid::new_v4(), 1, 0).await,
        Err(QuaestorError::Validation(_))
    ));
    assert!(matches!(
        svc.results(Uuid::new_v4(), 1, 10).await,
        Err(QuaestorError::NotFound(_))
    ));
    assert!(matches!(
        svc.status(Uuid::new_v4()).await,
        Err(QuaestorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_submit_rejects_invalid_requests() {
    let (svc, _) = service(vec![MockSource::new(
        SourceSpec::PubMed,
        Behavior::Records(1),
    )]);

    assert!(matches!(
        svc.submit("  ", constraints(vec![SourceSpec::PubMed])).await,
        Err(QuaestorError::Validation(_))
    ));

    let mut c = constraints(vec![SourceSpec::PubMed]);
    c.max_results = 5000;
    assert!(matches!(
        svc.submit("treasury", c).await,
        Err(QuaestorError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unregistered_source_recorded_as_failure() {
    let (svc, _) = service(vec![MockSource::new(
        SourceSpec::PubMed,
        Behavior::Records(2),
    )]);

    let id = svc
        .submit(
            "bond issuance",
            constraints(vec![SourceSpec::PubMed, SourceSpec::CrossRef]),
        )
        .await
        .unwrap();
    let job = wait_for_terminal(&svc, id).await;

    assert_eq!(job.status, JobStatus::Completed);
    let crossref = job
        .source_outcomes
        .iter()
        .find(|o| o.source == SourceSpec::CrossRef)
        .unwrap();
    assert!(crossref.error.is_some());
    assert_eq!(job.results_count, 2);
}

#[tokio::test]
async fn test_recent_listing_includes_finished_jobs() {
    let (svc, _) = service(vec![MockSource::new(
        SourceSpec::PubMed,
        Behavior::Records(1),
    )]);

    let first = svc
        .submit("query one", constraints(vec![SourceSpec::PubMed]))
        .await
        .unwrap();
    wait_for_terminal(&svc, first).await;
    let second = svc
        .submit("query two", constraints(vec![SourceSpec::PubMed]))
        .await
        .unwrap();
    wait_for_terminal(&svc, second).await;

    let summaries = svc.list_recent(10).await.unwrap();
    assert_eq!(summaries.len(), 2);
    let ids: Vec<Uuid> = summaries.iter().map(|s| s.id).collect();
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));
}
