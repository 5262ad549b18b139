// crates.io
use tracing::{Instrument, instrument::Instrumented};
// self
use crate::{_prelude::*, request::RequestDescriptor};

/// Span wrapping one logical call.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a span tagged with the descriptor's audience, method, and path.
	pub fn new(descriptor: &RequestDescriptor) -> Self {
		let span = tracing::info_span!(
			"listing_client.call",
			audience = descriptor.audience().as_str(),
			method = descriptor.method().as_str(),
			path = descriptor.path(),
		);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
