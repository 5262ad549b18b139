//! Bounded retry policy with exponential backoff.
//!
//! A [`RetryPolicy`] is an explicit object (attempt budget, classifier, backoff) rather than a
//! decorator, so its decisions can be tested against a fake [`Clock`]. Only transient failures
//! are retried: network errors for any method, and 5xx answers for idempotent methods. After
//! the budget is spent the last error is returned unchanged.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, clock::Clock, config::RetryConfig, request::Method};

/// Decides whether a failed attempt may be repeated.
pub trait RetryClassifier
where
	Self: Send + Sync,
{
	/// Returns `true` if `error` from a `method` call is safe and useful to retry.
	fn should_retry(&self, method: Method, error: &Error) -> bool;
}

/// Retries network failures for any method and 5xx answers for idempotent methods.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetworkOrIdempotent;
impl RetryClassifier for NetworkOrIdempotent {
	fn should_retry(&self, method: Method, error: &Error) -> bool {
		match error {
			Error::Transport(_) => true,
			Error::Server { .. } => method.is_idempotent(),
			_ => false,
		}
	}
}

/// Computes the delay before a retry.
pub trait Backoff
where
	Self: Send + Sync,
{
	/// Delay before retry number `retry` (1-based) following `error`.
	fn delay(&self, retry: u32, error: &Error) -> Duration;
}

/// `base * 2^(retry - 1)`, optionally jittered and stretched to honor `Retry-After`, capped at
/// `max`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
	/// Delay before the first retry.
	pub base: Duration,
	/// Upper bound for any delay.
	pub max: Duration,
	/// Adds up to 20% random jitter.
	pub jitter: bool,
	/// Waits at least as long as a server `Retry-After` hint.
	pub honor_retry_after: bool,
}
impl ExponentialBackoff {
	const JITTER_RATIO: f64 = 0.2;

	fn exponential(&self, retry: u32) -> Duration {
		let factor = 1_u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);

		self.base.checked_mul(factor).unwrap_or(self.max)
	}
}
impl From<&RetryConfig> for ExponentialBackoff {
	fn from(config: &RetryConfig) -> Self {
		Self {
			base: Duration::from_millis(config.base_delay_ms),
			max: Duration::from_millis(config.max_delay_ms),
			jitter: config.jitter,
			honor_retry_after: config.honor_retry_after,
		}
	}
}
impl Backoff for ExponentialBackoff {
	fn delay(&self, retry: u32, error: &Error) -> Duration {
		let mut delay = self.exponential(retry);

		if self.jitter && !delay.is_zero() {
			delay += delay.mul_f64(rand::rng().random_range(0.0..=Self::JITTER_RATIO));
		}
		if self.honor_retry_after {
			if let Error::Server { retry_after: Some(hint), .. } = error {
				delay = delay.max(*hint);
			}
		}

		delay.min(self.max)
	}
}

/// Bookkeeping for one logical call while it is being retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryAttempt {
	/// Method of the call being retried.
	pub method: Method,
	/// Attempts made so far (1 after the original dispatch).
	pub attempt_count: u32,
	/// Delay scheduled before the next attempt, once one is scheduled.
	pub next_delay: Option<Duration>,
}

/// Attempt budget plus the classifier and backoff that drive it.
#[derive(Clone)]
pub struct RetryPolicy {
	max_attempts: u32,
	classifier: Arc<dyn RetryClassifier>,
	backoff: Arc<dyn Backoff>,
}
impl RetryPolicy {
	/// Policy with `max_attempts` total attempts, the default classifier, and un-jittered
	/// exponential backoff from `base`.
	pub fn new(max_attempts: u32, base: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			classifier: Arc::new(NetworkOrIdempotent),
			backoff: Arc::new(ExponentialBackoff {
				base,
				max: Duration::MAX,
				jitter: false,
				honor_retry_after: false,
			}),
		}
	}

	/// Policy that never retries.
	pub fn disabled() -> Self {
		Self::new(1, Duration::ZERO)
	}

	/// Replaces the classifier.
	pub fn with_classifier(mut self, classifier: impl 'static + RetryClassifier) -> Self {
		self.classifier = Arc::new(classifier);

		self
	}

	/// Replaces the backoff.
	pub fn with_backoff(mut self, backoff: impl 'static + Backoff) -> Self {
		self.backoff = Arc::new(backoff);

		self
	}

	/// Total attempts allowed, including the original one.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// Records a failed attempt and returns the delay before the next one, or `None` when the
	/// failure must propagate.
	pub fn schedule(&self, attempt: &mut RetryAttempt, error: &Error) -> Option<Duration> {
		attempt.next_delay = None;

		if attempt.attempt_count >= self.max_attempts
			|| !self.classifier.should_retry(attempt.method, error)
		{
			return None;
		}

		let delay = self.backoff.delay(attempt.attempt_count, error);

		attempt.next_delay = Some(delay);

		Some(delay)
	}

	/// Runs `op` until it succeeds, the failure is not retryable, or the budget is spent.
	///
	/// `op` receives the 1-based attempt number.
	pub async fn run<F, Fut, T>(&self, clock: &dyn Clock, method: Method, mut op: F) -> Result<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = RetryAttempt { method, attempt_count: 0, next_delay: None };

		loop {
			attempt.attempt_count += 1;

			let error = match op(attempt.attempt_count).await {
				Ok(value) => return Ok(value),
				Err(e) => e,
			};
			let Some(delay) = self.schedule(&mut attempt, &error) else {
				return Err(error);
			};

			tracing::warn!(
				method = %method,
				attempt = attempt.attempt_count,
				delay_ms = delay.as_millis() as u64,
				error = %error,
				"Retrying transient failure."
			);

			clock.sleep(delay).await;
		}
	}
}
impl From<&RetryConfig> for RetryPolicy {
	fn from(config: &RetryConfig) -> Self {
		Self::new(config.max_attempts, Duration::ZERO)
			.with_backoff(ExponentialBackoff::from(config))
	}
}
impl Debug for RetryPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryPolicy").field("max_attempts", &self.max_attempts).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;
	use crate::{
		clock::ManualClock,
		error::{ApiErrorBody, TransportError},
	};

	fn server_error(retry_after: Option<Duration>) -> Error {
		Error::Server { status: 503, body: ApiErrorBody::default(), retry_after }
	}

	fn validation_error() -> Error {
		Error::Client { status: 422, body: ApiErrorBody::parse(br#"{"message":"bad price"}"#) }
	}

	fn network_error() -> Error {
		TransportError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
			.into()
	}

	#[test]
	fn classifier_matches_taxonomy() {
		let classifier = NetworkOrIdempotent;

		assert!(classifier.should_retry(Method::Post, &network_error()));
		assert!(classifier.should_retry(Method::Get, &server_error(None)));
		assert!(classifier.should_retry(Method::Delete, &server_error(None)));
		assert!(!classifier.should_retry(Method::Post, &server_error(None)));
		assert!(!classifier.should_retry(Method::Patch, &server_error(None)));
		assert!(!classifier.should_retry(Method::Get, &validation_error()));
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let backoff = ExponentialBackoff {
			base: Duration::from_millis(100),
			max: Duration::from_millis(350),
			jitter: false,
			honor_retry_after: true,
		};
		let error = server_error(None);

		assert_eq!(backoff.delay(1, &error), Duration::from_millis(100));
		assert_eq!(backoff.delay(2, &error), Duration::from_millis(200));
		assert_eq!(backoff.delay(3, &error), Duration::from_millis(350));
		assert_eq!(backoff.delay(64, &error), Duration::from_millis(350));
	}

	#[test]
	fn backoff_honors_retry_after_within_cap() {
		let backoff = ExponentialBackoff {
			base: Duration::from_millis(100),
			max: Duration::from_secs(10),
			jitter: false,
			honor_retry_after: true,
		};

		assert_eq!(
			backoff.delay(1, &server_error(Some(Duration::from_secs(2)))),
			Duration::from_secs(2)
		);
		assert_eq!(
			backoff.delay(1, &server_error(Some(Duration::from_secs(60)))),
			Duration::from_secs(10)
		);
	}

	#[test]
	fn jitter_stays_within_twenty_percent() {
		let backoff = ExponentialBackoff {
			base: Duration::from_millis(1_000),
			max: Duration::from_secs(10),
			jitter: true,
			honor_retry_after: false,
		};

		for _ in 0..100 {
			let delay = backoff.delay(1, &network_error());

			assert!(delay >= Duration::from_millis(1_000));
			assert!(delay <= Duration::from_millis(1_200));
		}
	}

	#[test]
	fn schedule_tracks_attempt_state() {
		let policy = RetryPolicy::new(2, Duration::from_millis(100));
		let mut attempt = RetryAttempt { method: Method::Get, attempt_count: 1, next_delay: None };

		assert_eq!(
			policy.schedule(&mut attempt, &server_error(None)),
			Some(Duration::from_millis(100))
		);
		assert_eq!(attempt.next_delay, Some(Duration::from_millis(100)));

		attempt.attempt_count = 2;

		assert_eq!(policy.schedule(&mut attempt, &server_error(None)), None);
		assert_eq!(attempt.next_delay, None);
	}

	#[tokio::test]
	async fn server_errors_retry_once_then_surface() {
		let clock = ManualClock::new();
		let policy = RetryPolicy::new(2, Duration::from_millis(100));
		let calls = AtomicU32::new(0);
		let result: Result<()> = policy
			.run(&clock, Method::Get, |_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err(server_error(None)) }
			})
			.await;

		assert!(matches!(result, Err(Error::Server { status: 503, .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
	}

	#[tokio::test]
	async fn validation_errors_are_not_retried() {
		let clock = ManualClock::new();
		let policy = RetryPolicy::new(2, Duration::from_millis(100));
		let calls = AtomicU32::new(0);
		let result: Result<()> = policy
			.run(&clock, Method::Post, |_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err(validation_error()) }
			})
			.await;

		assert!(matches!(result, Err(Error::Client { status: 422, .. })));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(clock.sleeps().is_empty());
	}

	#[tokio::test]
	async fn non_idempotent_server_errors_are_not_retried() {
		let clock = ManualClock::new();
		let policy = RetryPolicy::new(2, Duration::from_millis(100));
		let calls = AtomicU32::new(0);
		let _ = policy
			.run(&clock, Method::Post, |_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err::<(), _>(server_error(None)) }
			})
			.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn network_error_then_success_recovers() {
		let clock = ManualClock::new();
		let policy = RetryPolicy::new(2, Duration::from_millis(100));
		let result = policy
			.run(&clock, Method::Post, |attempt| async move {
				if attempt == 1 { Err(network_error()) } else { Ok(attempt) }
			})
			.await
			.expect("Second attempt should succeed.");

		assert_eq!(result, 2);
		assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
	}

	#[tokio::test]
	async fn disabled_policy_runs_once() {
		let clock = ManualClock::new();
		let calls = AtomicU32::new(0);
		let _ = RetryPolicy::disabled()
			.run(&clock, Method::Get, |_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async { Err::<(), _>(network_error()) }
			})
			.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
