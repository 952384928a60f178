//! quaestor-common — Shared types, errors, and the sandboxed HTTP client
//! used across all Quaestor crates.

pub mod error;
pub mod models;
pub mod sandbox;

pub use error::{ApiError, QuaestorError};
pub use models::{
    Enhancement, JobStatus, JobSummary, RecordMetadata, SearchConstraints, SearchJob,
    SourceOutcome, SourceSpec,
};
