//! Trace/generation/score emitter for Langfuse.
//!
//! Identifiers are generated locally for every request so responses always
//! carry a trace and generation id; the ingestion calls themselves only
//! happen when the backend is configured, and they run fire-and-forget so a
//! slow or failing Langfuse can never delay a response.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::config::LangfuseSettings;
use crate::llm::Usage;

pub struct Trace {
    pub id: String,
}

pub struct Generation {
    pub id: String,
}

pub struct Obs {
    client: Option<Arc<LangfuseClient>>,
}

impl Obs {
    pub fn from_settings(settings: Option<&LangfuseSettings>) -> Self {
        Self {
            client: settings.map(|s| Arc::new(LangfuseClient::new(s.clone()))),
        }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn trace(&self, name: &str, user_id: &str, input: &str) -> Trace {
        let id = Uuid::new_v4().to_string();
        if let Some(client) = &self.client {
            client.send(
                "trace-create",
                json!({
                    "id": id,
                    "name": name,
                    "userId": user_id,
                    "input": input,
                }),
            );
        }
        Trace { id }
    }

    pub fn generation(
        &self,
        trace_id: &str,
        name: &str,
        model: &str,
        input: &str,
        output: &str,
        usage: Option<Usage>,
    ) -> Generation {
        let id = Uuid::new_v4().to_string();
        if let Some(client) = &self.client {
            let usage = usage.map(|u| {
                json!({
                    "input": u.prompt_tokens,
                    "output": u.completion_tokens,
                    "total": u.total_tokens,
                    "unit": "TOKENS",
                })
            });
            client.send(
                "generation-create",
                json!({
                    "id": id,
                    "traceId": trace_id,
                    "name": name,
                    "model": model,
                    "input": input,
                    "output": output,
                    "usage": usage,
                }),
            );
        }
        Generation { id }
    }

    pub fn score(&self, trace_id: &str, name: &str, value: f64) {
        if let Some(client) = &self.client {
            client.send(
                "score-create",
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "traceId": trace_id,
                    "name": name,
                    "value": value,
                }),
            );
        }
    }
}

struct LangfuseClient {
    http: reqwest::Client,
    settings: LangfuseSettings,
}

impl LangfuseClient {
    fn new(settings: LangfuseSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn send(self: &Arc<Self>, event_type: &'static str, body: Value) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let payload = json!({
                "batch": [{
                    "id": Uuid::new_v4().to_string(),
                    "timestamp": Utc::now().to_rfc3339(),
                    "type": event_type,
                    "body": body,
                }],
            });
            let result = client
                .http
                .post(format!("{}/api/public/ingestion", client.settings.host))
                .basic_auth(
                    &client.settings.public_key,
                    Some(&client.settings.secret_key),
                )
                .json(&payload)
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    warn!(status = %response.status(), event_type, "langfuse ingestion rejected");
                }
                Err(err) => {
                    warn!(%err, event_type, "langfuse ingestion failed");
                }
                _ => {}
            }
        });
    }
}
