// self
use crate::{obs::CallOutcome, request::Audience};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(audience: Audience, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"listing_client_call_total",
			"audience" => audience.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (audience, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_call_outcome_is_safe_without_recorder() {
		record_call_outcome(Audience::Public, CallOutcome::Failure);
	}
}
