//! Exponential-backoff retry and per-attempt timeouts.
//!
//! Attempts are numbered from 1. The delay before attempt `k + 1` is
//! `initial_delay * multiplier^(k - 1)`, capped at `max_delay`, then perturbed
//! by `± jitter_factor * delay` and clamped to `[0, max_delay]`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flowtool_core::config::RetryDefaults;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{classify_error, ClassifiedError, ErrorMetadata};

/// Custom retry decision, replacing the default retryable-code set.
pub type RetryPredicate = Arc<dyn Fn(&ClassifiedError) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: Option<f64>,
    pub is_retryable: Option<RetryPredicate>,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = Some(factor);
        self
    }

    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&ClassifiedError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    /// Panics on a malformed configuration.
    pub fn assert_valid(&self) {
        assert!(
            self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0,
            "backoff_multiplier must be a finite number >= 1.0, got {}",
            self.backoff_multiplier
        );
        if let Some(jitter) = self.jitter_factor {
            assert!(
                (0.0..=1.0).contains(&jitter),
                "jitter_factor must be within [0, 1], got {}",
                jitter
            );
        }
        assert!(
            self.initial_delay <= self.max_delay,
            "initial_delay ({:?}) must not exceed max_delay ({:?})",
            self.initial_delay,
            self.max_delay
        );
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: None,
            is_retryable: None,
        }
    }
}

impl From<&RetryDefaults> for RetryConfig {
    /// Unusable settings are replaced by their defaults, so the result
    /// always passes [`RetryConfig::assert_valid`].
    fn from(defaults: &RetryDefaults) -> Self {
        let defaults = defaults.clone().sanitized();
        Self {
            max_retries: defaults.max_retries,
            initial_delay: Duration::from_millis(defaults.initial_delay_ms),
            max_delay: Duration::from_millis(defaults.max_delay_ms),
            backoff_multiplier: defaults.backoff_multiplier,
            jitter_factor: defaults.jitter_factor,
            is_retryable: None,
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .field("is_retryable", &self.is_retryable.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

pub fn is_retryable_error(err: &ClassifiedError, config: &RetryConfig) -> bool {
    match &config.is_retryable {
        Some(predicate) => predicate(err),
        None => err.retryable,
    }
}

/// Delay to wait after failed attempt number `attempt` (1-based).
pub fn calculate_retry_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_ms = config.max_delay.as_millis() as f64;
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let base_ms = config.initial_delay.as_millis() as f64 * config.backoff_multiplier.powi(exponent);
    let mut delay_ms = base_ms.min(max_ms);

    if let Some(jitter) = config.jitter_factor.filter(|j| *j > 0.0) {
        let spread = jitter * delay_ms;
        delay_ms += rand::thread_rng().gen_range(-spread..=spread);
    }

    Duration::from_millis(delay_ms.clamp(0.0, max_ms).round() as u64)
}

/// Result of [`with_retry_result`], with attempt telemetry.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ClassifiedError>,
    pub attempts: u32,
    pub total_delay: Duration,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_retries + 1` attempts have been made.
pub async fn with_retry_result<T, E, F, Fut>(mut operation: F, config: &RetryConfig) -> RetryOutcome<T>
where
    E: ErrorMetadata,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    config.assert_valid();

    let max_attempts = config.max_retries.saturating_add(1);
    let mut total_delay = Duration::ZERO;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    total_delay,
                };
            }
            Err(err) => {
                let classified = classify_error(&err);
                if attempt >= max_attempts || !is_retryable_error(&classified, config) {
                    debug!(
                        attempt,
                        code = %classified.code,
                        retryable = classified.retryable,
                        "Giving up"
                    );
                    return RetryOutcome {
                        result: Err(classified),
                        attempts: attempt,
                        total_delay,
                    };
                }

                let delay = calculate_retry_delay(attempt, config);
                warn!(
                    attempt,
                    max_attempts,
                    code = %classified.code,
                    delay_ms = delay.as_millis() as u64,
                    error = %classified.message,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
                total_delay += delay;
                attempt += 1;
            }
        }
    }
}

pub async fn with_retry<T, E, F, Fut>(operation: F, config: &RetryConfig) -> Result<T, ClassifiedError>
where
    E: ErrorMetadata,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_result(operation, config).await.result
}

/// Bound `operation` by `timeout`; expiry yields a `TIMEOUT` error.
///
/// The pending operation is dropped on expiry, so no timer or task outlives it.
pub async fn with_timeout<T, E, Fut>(operation: Fut, timeout: Duration) -> Result<T, ClassifiedError>
where
    E: ErrorMetadata,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(classify_error(&err)),
        Err(_) => Err(ClassifiedError::timeout(timeout)),
    }
}

/// Each attempt is individually timed; retries span attempts.
pub async fn with_retry_and_timeout<T, E, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    timeout: Duration,
) -> Result<T, ClassifiedError>
where
    E: ErrorMetadata,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry(|| with_timeout(operation(), timeout), config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .with_delays(Duration::from_millis(100), Duration::from_millis(1_000))
    }

    #[test]
    fn test_delay_without_jitter() {
        let config = RetryConfig::default();
        assert_eq!(calculate_retry_delay(1, &config), Duration::from_secs(1));
        assert_eq!(calculate_retry_delay(2, &config), Duration::from_secs(2));
        assert_eq!(calculate_retry_delay(3, &config), Duration::from_secs(4));
        assert_eq!(calculate_retry_delay(4, &config), Duration::from_secs(8));
        assert_eq!(calculate_retry_delay(5, &config), Duration::from_secs(10));
        assert_eq!(calculate_retry_delay(60, &config), Duration::from_secs(10));
    }

    #[test]
    fn test_delay_with_jitter_stays_in_bounds() {
        let config = RetryConfig::default().with_jitter(0.5);
        for _ in 0..200 {
            let first = calculate_retry_delay(1, &config);
            assert!(first >= Duration::from_millis(500), "{first:?}");
            assert!(first <= Duration::from_millis(1_500), "{first:?}");

            let capped = calculate_retry_delay(10, &config);
            assert!(capped >= Duration::from_secs(5), "{capped:?}");
            assert!(capped <= Duration::from_secs(10), "{capped:?}");
        }
    }

    #[test]
    #[should_panic(expected = "jitter_factor")]
    fn test_invalid_jitter_panics() {
        RetryConfig::default().with_jitter(1.5).assert_valid();
    }

    #[test]
    #[should_panic(expected = "backoff_multiplier")]
    fn test_invalid_multiplier_panics() {
        RetryConfig::default()
            .with_backoff_multiplier(f64::NAN)
            .assert_valid();
    }

    #[test]
    fn test_from_defaults() {
        let config = RetryConfig::from(&RetryDefaults::default());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert!(config.is_retryable.is_none());
    }

    #[test]
    fn test_from_unusable_defaults_is_valid() {
        let config = RetryConfig::from(&RetryDefaults {
            initial_delay_ms: 20_000,
            backoff_multiplier: 0.5,
            jitter_factor: Some(3.0),
            ..RetryDefaults::default()
        });
        config.assert_valid();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.jitter_factor, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = &AtomicU32::new(0);
        let outcome = with_retry_result(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("connect ECONNREFUSED 10.0.0.1:443".to_string())
                } else {
                    Ok(n)
                }
            },
            &fast_config(3),
        )
        .await;

        assert_eq!(outcome.result.unwrap(), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.total_delay, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("request timed out")
            },
            &fast_config(2),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.retryable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_non_retryable() {
        let calls = &AtomicU32::new(0);
        let outcome: RetryOutcome<()> = with_retry_result(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("401 Unauthorized")
            },
            &fast_config(5),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.total_delay, Duration::ZERO);
        assert_eq!(outcome.result.unwrap_err().code, ErrorCode::AuthFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate() {
        let calls = &AtomicU32::new(0);
        let config = fast_config(2).with_predicate(|e| e.code == ErrorCode::ServerError);
        let _: Result<(), _> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClassifiedError::new(ErrorCode::ServerError, "boom"))
            },
            &config,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result: Result<(), ClassifiedError> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), ClassifiedError>(())
            },
            Duration::from_millis(250),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.message.contains("250ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_and_timeout_times_each_attempt() {
        let calls = &AtomicU32::new(0);
        let result = with_retry_and_timeout(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, ClassifiedError>(n)
            },
            &fast_config(1),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
