//! Time source used by the dispatcher and retry policy.
//!
//! Every artificial delay in the client (rate-window waits and retry backoff) goes through a
//! [`Clock`], so tests can swap in paused Tokio time or a [`ManualClock`] instead of waiting on
//! the wall clock.

// self
use crate::_prelude::*;

/// Boxed future returned by [`Clock::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Monotonic time source plus a way to suspend until a delay has elapsed.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Returns the current monotonic instant.
	fn now(&self) -> Instant;

	/// Suspends the calling task for `duration`.
	fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// Default clock backed by the Tokio timer (honors `tokio::time::pause`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;
impl Clock for TokioClock {
	fn now(&self) -> Instant {
		tokio::time::Instant::now().into_std()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture {
		Box::pin(tokio::time::sleep(duration))
	}
}

/// Fake clock that never blocks: `sleep` records the requested delay and jumps virtual time
/// forward to the wake-up instant.
#[derive(Debug)]
pub struct ManualClock {
	origin: Instant,
	state: Mutex<ManualState>,
}
#[derive(Debug, Default)]
struct ManualState {
	elapsed: Duration,
	sleeps: Vec<Duration>,
}
impl ManualClock {
	/// Creates a clock whose virtual time starts at the current instant.
	pub fn new() -> Self {
		Self { origin: Instant::now(), state: Default::default() }
	}

	/// Moves virtual time forward without recording a sleep.
	pub fn advance(&self, by: Duration) {
		self.state.lock().elapsed += by;
	}

	/// Virtual time elapsed since construction.
	pub fn elapsed(&self) -> Duration {
		self.state.lock().elapsed
	}

	/// Every delay passed to [`Clock::sleep`], in call order.
	pub fn sleeps(&self) -> Vec<Duration> {
		self.state.lock().sleeps.clone()
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}
impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.origin + self.state.lock().elapsed
	}

	fn sleep(&self, duration: Duration) -> SleepFuture {
		let mut state = self.state.lock();

		state.sleeps.push(duration);
		state.elapsed += duration;

		Box::pin(std::future::ready(()))
	}
}
