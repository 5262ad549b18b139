//! Process-wide rate gate in front of every transport call.
//!
//! The [`Dispatcher`] admits at most `max_requests` dispatches per rolling `window`, no matter
//! which audience a request targets. Arrivals reserve a dispatch slot under a short lock, so slot
//! instants are handed out in arrival order and never decrease; a throttled caller then sleeps
//! until its slot. Nothing is ever rejected here, only delayed.

// self
use crate::{
	_prelude::*,
	clock::{Clock, TokioClock},
	config::RateLimitConfig,
	http::{ApiResponse, ApiTransport, HttpRequest},
};

/// Dispatch instants of the most recent admitted requests.
#[derive(Debug, Default)]
pub(crate) struct RateWindow {
	slots: VecDeque<Instant>,
}
impl RateWindow {
	/// Reserves the earliest slot at or after `now` that keeps the window under `max` and comes
	/// no earlier than any previously reserved slot.
	pub(crate) fn reserve(&mut self, now: Instant, max: usize, window: Duration) -> Instant {
		let mut slot = now;

		if let Some(last) = self.slots.back() {
			slot = slot.max(*last);
		}
		if self.slots.len() >= max {
			if let Some(oldest) = self.slots.get(self.slots.len() - max) {
				slot = slot.max(*oldest + window);
			}
		}

		self.slots.push_back(slot);

		while self.slots.len() > max {
			self.slots.pop_front();
		}

		slot
	}
}

/// Shared gate enforcing the rolling request ceiling.
pub struct Dispatcher {
	max_requests: usize,
	window: Duration,
	clock: Arc<dyn Clock>,
	state: Mutex<RateWindow>,
}
impl Dispatcher {
	/// Creates a dispatcher driven by the Tokio clock.
	pub fn new(limit: &RateLimitConfig) -> Self {
		Self::with_clock(limit, Arc::new(TokioClock))
	}

	/// Creates a dispatcher driven by `clock`.
	pub fn with_clock(limit: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			max_requests: usize::try_from(limit.max_requests).unwrap_or(usize::MAX).max(1),
			window: limit.window(),
			clock,
			state: Mutex::new(RateWindow::default()),
		}
	}

	/// Waits until the window has room, returning the instant the request was admitted.
	pub async fn admit(&self) -> Instant {
		let now = self.clock.now();
		let slot = self.state.lock().reserve(now, self.max_requests, self.window);
		let wait = slot.saturating_duration_since(now);

		if !wait.is_zero() {
			tracing::debug!(
				wait_ms = wait.as_millis() as u64,
				"Rate window full; delaying dispatch."
			);

			self.clock.sleep(wait).await;
		}

		slot
	}

	/// Admits `request` through the gate and hands it to `transport`.
	///
	/// Transport failures propagate unchanged.
	pub async fn dispatch<T>(&self, transport: &T, request: HttpRequest) -> Result<ApiResponse>
	where
		T: ?Sized + ApiTransport,
	{
		self.admit().await;

		transport.execute(request).await
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("max_requests", &self.max_requests)
			.field("window", &self.window)
			.finish()
	}
}
