//! Observability helpers for client calls.
//!
//! # Feature Flags
//!
//! - Spans named `listing_client.call` carry `audience`, `method`, and `path` fields and wrap
//!   every logical call, including its retries.
//! - Enable `metrics` to increment the `listing_client_call_total` counter for every
//!   attempt/retry/success/failure, labeled by `audience` + `outcome`.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// A dispatch was attempted.
	Attempt,
	/// A failed attempt was scheduled for another try.
	Retry,
	/// The call resolved successfully.
	Success,
	/// The call failed and the error was propagated.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Retry => "retry",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
