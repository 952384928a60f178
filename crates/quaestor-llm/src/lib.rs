//! quaestor-llm — Hosted-LLM enhancement connector.
//!
//! Implements the [`backend::LlmBackend`] trait (Gemini) and the
//! [`enhancer::Enhancer`] wrapper that turns raw completions into query
//! rewrites and per-record relevance analyses. Everything here is
//! best-effort: callers degrade to unenhanced behavior on any failure.

pub mod backend;
pub mod enhancer;

pub use backend::{GeminiBackend, LlmBackend, LlmError, LlmRequest, Message};
pub use enhancer::Enhancer;
