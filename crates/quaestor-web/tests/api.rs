//! HTTP API tests driven through the router with an in-memory store and a
//! stub source connector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::time::sleep;
use tower::util::ServiceExt;

use quaestor_common::models::{RecordMetadata, SearchConstraints, SourceSpec};
use quaestor_search::sources::LiteratureSource;
use quaestor_search::SearchService;
use quaestor_store::memory::MemoryStore;
use quaestor_web::router::build_router;
use quaestor_web::state::AppState;

struct StubSource {
    records: usize,
}

#[async_trait]
impl LiteratureSource for StubSource {
    fn name(&self) -> SourceSpec {
        SourceSpec::PubMed
    }

    async fn search(
        &self,
        _query: &str,
        _constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<RecordMetadata>> {
        Ok((0..self.records)
            .map(|i| RecordMetadata {
                id: format!("pmid-{i}"),
                source: SourceSpec::PubMed,
                title: format!("Cash management paper {i}"),
                authors: vec!["T. Author".to_string()],
                abstract_text: None,
                url: None,
                doi: None,
                published: None,
                enhancement: None,
            })
            .collect())
    }
}

fn app(records: usize) -> Router {
    let store = Arc::new(MemoryStore::new());
    let search = SearchService::new(store, vec![Arc::new(StubSource { records })], None);
    build_router(AppState::new(search))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn submit_and_wait(app: &Router, query: &str) -> String {
    let (status, body) = send(
        app,
        post_json("/api/search", json!({ "query": query, "sources": ["pubmed"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");
    let id = body["search_id"].as_str().unwrap().to_string();

    for _ in 0..200 {
        let (_, status_body) = send(app, get(&format!("/api/search/{id}/status"))).await;
        if status_body["status"] != "processing" {
            assert_eq!(status_body["status"], "completed");
            return id;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job never completed");
}

#[tokio::test]
async fn test_root_banner() {
    let (status, body) = send(&app(0), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "quaestor");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_submit_then_status_then_results() {
    let app = app(3);
    let id = submit_and_wait(&app, "treasury liquidity").await;

    let (status, body) = send(&app, get(&format!("/api/search/{id}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "treasury liquidity");
    assert_eq!(body["results_count"], 3);
    assert_eq!(body["sources"][0]["source"], "pubmed");

    let (status, body) = send(
        &app,
        get(&format!("/api/search/{id}/results?page=1&page_size=2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 2);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_submit_rejects_empty_query() {
    let (status, body) = send(&app(0), post_json("/api/search", json!({ "query": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_submit_rejects_unknown_source() {
    let (status, body) = send(
        &app(0),
        post_json(
            "/api/search",
            json!({ "query": "cash", "sources": ["google_scholar"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("google_scholar"));
}

#[tokio::test]
async fn test_submit_rejects_oversized_max_results() {
    let (status, _) = send(
        &app(0),
        post_json(
            "/api/search",
            json!({ "query": "cash", "max_results": 100000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let app = app(0);
    let id = uuid::Uuid::new_v4();
    let (status, _) = send(&app, get(&format!("/api/search/{id}/status"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get(&format!("/api/search/{id}/results"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_id_is_client_error() {
    let (status, _) = send(&app(0), get("/api/search/not-a-uuid/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_is_idempotent_over_http() {
    let app = app(1);
    let id = submit_and_wait(&app, "fx exposure").await;

    let (status, _) = send(&app, delete(&format!("/api/search/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, delete(&format!("/api/search/{id}"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/api/search/{id}/status"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recent_searches_listing() {
    let app = app(2);
    submit_and_wait(&app, "cash pooling").await;
    submit_and_wait(&app, "liquidity buffers").await;

    let (status, body) = send(&app, get("/api/searches?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    let searches = body["searches"].as_array().unwrap();
    assert_eq!(searches.len(), 2);
    assert!(searches[0]["query"].is_string());
    assert!(searches[0]["results_count"].is_number());
}
