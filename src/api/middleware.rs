use std::time::Instant;

use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use tracing::info;
use uuid::Uuid;

use super::AppState;

/// Correlation id attached to every request; handlers pull it back out of
/// the request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Per-request bookkeeping: request_id, in-progress gauge, latency histogram,
/// status-labeled counter, one completion log line.
pub async fn track_requests(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let endpoint = req.uri().path().to_string();
    let method = req.method().to_string();
    state.metrics.in_progress.inc();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16().to_string();
    state
        .metrics
        .request_latency
        .with_label_values(&[&endpoint, &method])
        .observe(elapsed.as_secs_f64());
    state
        .metrics
        .requests_total
        .with_label_values(&[&endpoint, &method, &status])
        .inc();
    state.metrics.in_progress.dec();

    info!(
        %request_id,
        %endpoint,
        %method,
        %status,
        elapsed_ms = elapsed.as_millis() as u64,
        "request completed"
    );

    response
}
