use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use tracing::error;

use crate::{
    api::middleware::RequestId,
    api::types::{AskRequest, AskResponse, HealthResponse},
    error::ApiError,
    guardrails::{non_empty_answer, toxicity_score, truncate_words},
};

use super::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        llm_configured: state.llm_configured,
        tracing_enabled: state.obs.enabled(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

pub async fn ask(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::Validation("question must not be empty".into()));
    }
    // Character counts, not byte lengths: questions are expected in Spanish.
    let question_chars = req.question.chars().count();
    if question_chars < 3 {
        return Err(ApiError::Validation("question must be at least 3 characters".into()));
    }
    if question_chars > 2000 {
        return Err(ApiError::Validation("question exceeds 2000 characters".into()));
    }
    let max_words = match req.max_words {
        Some(0) => return Err(ApiError::Validation("max_words must be positive".into())),
        Some(n) => n,
        None => state.guardrails.default_max_words,
    };

    let trace = state.obs.trace("qa_chat", &req.user_id, &req.question);

    let completion = state
        .llm
        .ask(&req.question, &request_id)
        .await
        .map_err(|err| {
            error!(
                %request_id,
                attempts = err.attempts,
                error = %err.last_error,
                "upstream llm unavailable"
            );
            ApiError::UpstreamUnavailable {
                attempts: err.attempts,
            }
        })?;

    let answer = truncate_words(&completion.answer, max_words, &state.guardrails.ellipsis);

    if let Some(usage) = completion.usage {
        state.metrics.tokens_used.observe(usage.total_tokens as f64);
    }

    let generation = state.obs.generation(
        &trace.id,
        "chat_completion",
        &completion.model,
        &req.question,
        &answer,
        completion.usage,
    );
    state.obs.score(
        &trace.id,
        "non_empty_answer",
        if non_empty_answer(&answer) { 1.0 } else { 0.0 },
    );
    state.obs.score(
        &trace.id,
        "toxicity_safe",
        toxicity_score(&answer, &state.guardrails.deny_list),
    );

    Ok(Json(AskResponse {
        answer,
        trace_id: trace.id,
        generation_id: generation.id,
        request_id,
    }))
}
