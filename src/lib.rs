pub mod api;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod metrics;
pub mod obs;

pub use api::{router, AppState};
