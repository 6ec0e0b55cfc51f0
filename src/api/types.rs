use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub question: String,
    #[serde(default)]
    pub max_words: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub trace_id: String,
    pub generation_id: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub llm_configured: bool,
    pub tracing_enabled: bool,
}
