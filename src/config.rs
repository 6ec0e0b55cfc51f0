use std::time::Duration;

use crate::guardrails::GuardrailConfig;

/// Provider credential resolved once at startup. Handlers never look at the
/// environment; they only see which variant was injected.
#[derive(Debug, Clone)]
pub enum Credential {
    Configured { api_key: String },
    Unconfigured,
}

impl Credential {
    pub fn is_configured(&self) -> bool {
        matches!(self, Credential::Configured { .. })
    }
}

/// Langfuse connection info; present only when all three variables are set.
#[derive(Debug, Clone)]
pub struct LangfuseSettings {
    pub public_key: String,
    pub secret_key: String,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: String,
    pub log_level: String,
    pub port: u16,
    pub credential: Credential,
    pub openai_base_url: String,
    pub model: String,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub langfuse: Option<LangfuseSettings>,
    pub guardrails: GuardrailConfig,
}

impl Settings {
    /// Read all configuration from the environment. Missing optional keys
    /// disable the matching capability instead of failing startup.
    pub fn from_env() -> Self {
        let credential = match dotenvy::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()) {
            Some(api_key) => Credential::Configured { api_key },
            None => Credential::Unconfigured,
        };

        let langfuse = match (
            dotenvy::var("LANGFUSE_PUBLIC_KEY").ok(),
            dotenvy::var("LANGFUSE_SECRET_KEY").ok(),
            dotenvy::var("LANGFUSE_HOST").ok(),
        ) {
            (Some(public_key), Some(secret_key), Some(host)) => Some(LangfuseSettings {
                public_key,
                secret_key,
                host,
            }),
            _ => None,
        };

        let mut guardrails = GuardrailConfig::default();
        if let Ok(raw) = dotenvy::var("GUARDRAIL_DENY_LIST") {
            guardrails.deny_list = parse_deny_list(&raw);
        }
        if let Some(n) = parse_var("DEFAULT_MAX_WORDS") {
            guardrails.default_max_words = n;
        }

        Self {
            app_env: dotenvy::var("APP_ENV").unwrap_or_else(|_| "dev".to_string()),
            log_level: dotenvy::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            port: parse_var("PORT").unwrap_or(8000),
            credential,
            openai_base_url: dotenvy::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: dotenvy::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_attempts: parse_var("LLM_MAX_ATTEMPTS").unwrap_or(3).max(1),
            backoff_base: Duration::from_millis(parse_var("LLM_BACKOFF_BASE_MS").unwrap_or(300)),
            langfuse,
            guardrails,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    dotenvy::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_deny_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
