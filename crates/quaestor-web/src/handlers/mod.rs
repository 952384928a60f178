//! HTTP handlers, grouped by concern.

pub mod search;
pub mod system;
