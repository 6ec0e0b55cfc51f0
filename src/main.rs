use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sabio::{
    api::AppState,
    config::{Credential, Settings},
    llm::{ChatProvider, OpenAiProvider, ResilientClient, RetryPolicy, StubProvider, TokioSleeper},
    metrics::Metrics,
    obs::Obs,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();

    // -----------------------------
    // Logging: one JSON object per line, level from LOG_LEVEL
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let llm_configured = settings.credential.is_configured();
    let provider: Arc<dyn ChatProvider> = match &settings.credential {
        Credential::Configured { api_key } => Arc::new(OpenAiProvider::new(
            api_key.clone(),
            settings.openai_base_url.clone(),
            settings.model.clone(),
        )),
        Credential::Unconfigured => {
            tracing::info!("no OPENAI_API_KEY set, serving stub answers (degraded mode)");
            Arc::new(StubProvider)
        }
    };

    let metrics = Arc::new(Metrics::new()?);
    let llm = Arc::new(ResilientClient::new(
        provider,
        RetryPolicy::new(settings.max_attempts, settings.backoff_base),
        Arc::new(TokioSleeper),
        metrics.clone(),
    ));
    let obs = Arc::new(Obs::from_settings(settings.langfuse.as_ref()));
    if !obs.enabled() {
        tracing::info!("langfuse keys missing, tracing backend disabled");
    }

    let state = AppState {
        llm,
        obs,
        metrics,
        guardrails: Arc::new(settings.guardrails.clone()),
        llm_configured,
    };

    let app = sabio::router(state);

    let addr = format!("0.0.0.0:{}", settings.port);
    tracing::info!(%addr, env = %settings.app_env, llm_configured, "starting sabio");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
