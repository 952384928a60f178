//! quaestor-web — HTTP surface for the treasury research service.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
