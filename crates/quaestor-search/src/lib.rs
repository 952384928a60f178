//! quaestor-search — Literature source connectors and the search-job
//! orchestrator.
//!
//! Covers the whole life of a search:
//! - Job submission, validation, and background execution
//! - Concurrent fan-out to PubMed, arXiv, and CrossRef
//! - Optional AI enhancement (query rewrite + per-record analysis)
//! - Status/results/listing/deletion against the job store

pub mod service;
pub mod sources;

pub use service::SearchService;
