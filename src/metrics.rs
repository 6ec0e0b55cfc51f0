use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Process-wide metrics. Registered once at startup and shared through
/// `AppState`; all updates go through the collectors' atomic operations.
pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_latency: HistogramVec,
    pub llm_latency: HistogramVec,
    pub in_progress: IntGauge,
    pub tokens_used: Histogram,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("app_requests_total", "Total HTTP requests"),
            &["endpoint", "method", "status"],
        )?;
        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "app_request_latency_seconds",
                "Latency of HTTP requests in seconds",
            ),
            &["endpoint", "method"],
        )?;
        let llm_latency = HistogramVec::new(
            HistogramOpts::new("app_llm_latency_seconds", "Latency of LLM calls in seconds"),
            &["model"],
        )?;
        let in_progress = IntGauge::new("app_requests_in_progress", "In-progress HTTP requests")?;
        let tokens_used = Histogram::with_opts(
            HistogramOpts::new("app_llm_tokens_used", "Tokens used per request").buckets(vec![
                0.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0,
            ]),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(llm_latency.clone()))?;
        registry.register(Box::new(in_progress.clone()))?;
        registry.register(Box::new(tokens_used.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_latency,
            llm_latency,
            in_progress,
            tokens_used,
        })
    }

    /// Prometheus text exposition of every registered collector.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buf) {
            tracing::error!(?err, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
