use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use crate::error::{LlmError, UpstreamUnavailable};
use crate::metrics::Metrics;

pub mod openai;

pub use openai::OpenAiProvider;

/// Token accounting as reported by the provider.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One completed chat call, provider-agnostic.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub answer: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn model(&self) -> &str;
    async fn chat(&self, question: &str) -> Result<ChatCompletion, LlmError>;
}

/// Degraded-mode provider used when no API credential is configured. Always
/// answers, never fails, reports no usage.
pub struct StubProvider;

pub const STUB_ANSWER: &str =
    "Modo degradado: no hay un modelo configurado, esta es una respuesta fija.";

#[async_trait]
impl ChatProvider for StubProvider {
    fn model(&self) -> &str {
        "stub"
    }

    async fn chat(&self, _question: &str) -> Result<ChatCompletion, LlmError> {
        Ok(ChatCompletion {
            answer: STUB_ANSWER.to_string(),
            model: "stub".to_string(),
            usage: None,
        })
    }
}

/// Injectable sleep so retry tests run instantly and can record delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            // A zero budget would fail every request without ever calling
            // the provider; the floor is one attempt.
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(3),
        }
    }

    /// Delay before the attempt following `attempt` (1-based): doubling from
    /// the base plus up to 25% jitter, hard-capped at `max_delay`. The jitter
    /// bound stays below the doubling factor and the cap is applied last, so
    /// consecutive delays never decrease even once they saturate at the cap.
    fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
        let jitter = exp.mul_f64(rand::thread_rng().gen_range(0.0..0.25));
        exp.saturating_add(jitter).min(self.max_delay)
    }
}

/// Thin policy wrapper around a provider: bounded retry with exponential
/// backoff for transient failures, immediate pass-through otherwise. Holds no
/// per-request state; safe to share across all in-flight requests.
pub struct ResilientClient {
    provider: Arc<dyn ChatProvider>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    metrics: Arc<Metrics>,
}

impl ResilientClient {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            policy,
            sleeper,
            metrics,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Obtain an answer for `question`, retrying transient provider failures
    /// up to the configured budget. Observes one latency sample per call
    /// sequence (not per retry) and logs a single line with the request id.
    pub async fn ask(
        &self,
        question: &str,
        request_id: &str,
    ) -> Result<ChatCompletion, UpstreamUnavailable> {
        let start = Instant::now();
        let mut attempts = 0;
        let mut last_error: Option<LlmError> = None;

        while attempts < self.policy.max_attempts {
            attempts += 1;
            match self.provider.chat(question).await {
                Ok(completion) => {
                    self.observe_latency(start);
                    info!(
                        %request_id,
                        model = %completion.model,
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "llm call succeeded"
                    );
                    return Ok(completion);
                }
                Err(err) => {
                    let transient = err.is_transient();
                    warn!(
                        %request_id,
                        attempt = attempts,
                        error = %err,
                        transient,
                        "llm call attempt failed"
                    );
                    last_error = Some(err);
                    if !transient || attempts == self.policy.max_attempts {
                        break;
                    }
                    self.sleeper.sleep(self.policy.delay_after(attempts)).await;
                }
            }
        }

        self.observe_latency(start);
        Err(UpstreamUnavailable {
            attempts,
            last_error: last_error
                .unwrap_or(LlmError::InvalidResponse("no attempt was made".into())),
        })
    }

    fn observe_latency(&self, start: Instant) {
        self.metrics
            .llm_latency
            .with_label_values(&[self.provider.model()])
            .observe(start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    struct NoopSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl NoopSleeper {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delays: Mutex::new(Vec::new()),
            })
        }

        fn recorded(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    struct FlakyProvider {
        calls: AtomicU32,
        fail_first: u32,
        transient: bool,
    }

    #[async_trait]
    impl ChatProvider for FlakyProvider {
        fn model(&self) -> &str {
            "test-model"
        }

        async fn chat(&self, _question: &str) -> Result<ChatCompletion, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                if self.transient {
                    Err(LlmError::Upstream {
                        status: 503,
                        message: "unavailable".into(),
                    })
                } else {
                    Err(LlmError::Upstream {
                        status: 401,
                        message: "bad key".into(),
                    })
                }
            } else {
                Ok(ChatCompletion {
                    answer: "respuesta".into(),
                    model: "test-model".into(),
                    usage: None,
                })
            }
        }
    }

    fn client(provider: Arc<FlakyProvider>, sleeper: Arc<NoopSleeper>) -> ResilientClient {
        ResilientClient::new(
            provider,
            RetryPolicy::new(3, Duration::from_millis(300)),
            sleeper,
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: 2,
            transient: true,
        });
        let sleeper = NoopSleeper::new();
        let out = client(provider.clone(), sleeper.clone())
            .ask("hola", "req-1")
            .await
            .unwrap();
        assert_eq!(out.answer, "respuesta");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn exhausts_budget_with_exact_attempt_count() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            transient: true,
        });
        let sleeper = NoopSleeper::new();
        let err = client(provider.clone(), sleeper.clone())
            .ask("hola", "req-2")
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        // Exponential ordering: each backoff at least as long as the previous.
        let delays = sleeper.recorded();
        assert_eq!(delays.len(), 2);
        assert!(delays[1] >= delays[0]);
    }

    #[tokio::test]
    async fn non_transient_failure_is_not_retried() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            transient: false,
        });
        let sleeper = NoopSleeper::new();
        let err = client(provider.clone(), sleeper.clone())
            .ask("hola", "req-3")
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn stub_provider_answers_immediately() {
        let sleeper = NoopSleeper::new();
        let client = ResilientClient::new(
            Arc::new(StubProvider),
            RetryPolicy::new(3, Duration::from_millis(300)),
            sleeper.clone(),
            Arc::new(Metrics::new().unwrap()),
        );
        let out = client.ask("hola", "req-4").await.unwrap();
        assert_eq!(out.answer, STUB_ANSWER);
        assert!(out.usage.is_none());
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn delays_double_from_base_and_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(300));
        let d1 = policy.delay_after(1);
        let d2 = policy.delay_after(2);
        let d3 = policy.delay_after(3);
        assert!(d1 >= Duration::from_millis(300) && d1 < Duration::from_millis(375));
        assert!(d2 >= Duration::from_millis(600) && d2 < Duration::from_millis(750));
        assert!(d3 >= Duration::from_millis(1200) && d3 < Duration::from_millis(1500));
        // Once saturated the delay is exactly the cap, jitter or not.
        assert_eq!(policy.delay_after(12), Duration::from_secs(3));
    }

    #[test]
    fn jittered_delays_stay_ordered_across_the_cap() {
        let policy = RetryPolicy::new(8, Duration::from_millis(300));
        // Attempts 4..6 straddle max_delay: 2.4s uncapped, then saturated.
        // Jitter must never let a later delay undercut an earlier one.
        for _ in 0..200 {
            let d4 = policy.delay_after(4);
            let d5 = policy.delay_after(5);
            let d6 = policy.delay_after(6);
            assert!(d5 >= d4, "delay after attempt 5 ({d5:?}) < attempt 4 ({d4:?})");
            assert!(d6 >= d5, "delay after attempt 6 ({d6:?}) < attempt 5 ({d5:?})");
            assert!(d6 <= Duration::from_secs(3));
        }
    }

    #[tokio::test]
    async fn zero_attempt_budget_still_makes_one_call() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            transient: true,
        });
        let sleeper = NoopSleeper::new();
        let client = ResilientClient::new(
            provider.clone(),
            RetryPolicy::new(0, Duration::from_millis(300)),
            sleeper,
            Arc::new(Metrics::new().unwrap()),
        );
        let err = client.ask("hola", "req-5").await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
