//! Credential side effects evaluated on every network round trip.
//!
//! Two independent channels run after each attempt, retried or not:
//!
//! - **Rotation**: a successful response carrying the rotation header replaces the stored token
//!   via [`CredentialStore::set_token`], one write per qualifying response.
//! - **Invalidation**: a failed response whose error payload matches the configured
//!   [`InvalidationClassifier`] logs the process out through [`CredentialStore::logout`], which
//!   only transitions (and fires hooks) once.
//!
//! Neither channel alters the outcome handed back to the caller.

// self
use crate::{
	_prelude::*,
	client::ClientMetrics,
	credential::CredentialStore,
	http::ApiResponse,
};

/// Decides whether a failure means the current credential is no longer valid.
pub trait InvalidationClassifier
where
	Self: Send + Sync,
{
	/// Returns `true` if `error` signals an invalid credential.
	fn is_invalidation(&self, error: &Error) -> bool;
}

/// Matches a marker substring inside the error payload's `message` field.
///
/// Only the structured `message` field is inspected, never the raw body, so a validation error
/// that merely mentions a token elsewhere does not log the user out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageMarker {
	marker: String,
}
impl MessageMarker {
	/// Creates a classifier for `marker`.
	pub fn new(marker: impl Into<String>) -> Self {
		Self { marker: marker.into() }
	}

	/// Marker substring.
	pub fn marker(&self) -> &str {
		&self.marker
	}
}
impl InvalidationClassifier for MessageMarker {
	fn is_invalidation(&self, error: &Error) -> bool {
		if self.marker.is_empty() {
			return false;
		}

		error
			.api_body()
			.and_then(|body| body.message.as_deref())
			.is_some_and(|message| message.contains(&self.marker))
	}
}

/// Side effect performed by [`Interceptor::inspect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intercepted {
	/// Nothing matched.
	Nothing,
	/// The stored token was replaced.
	Rotated,
	/// This attempt logged the process out.
	Invalidated,
	/// The invalidation marker matched but the process was already logged out.
	AlreadyInvalidated,
}

/// Rotation and invalidation channels bound to one credential store.
#[derive(Clone)]
pub struct Interceptor {
	store: CredentialStore,
	rotation_header: String,
	classifier: Arc<dyn InvalidationClassifier>,
	metrics: Arc<ClientMetrics>,
}
impl Interceptor {
	/// Creates an interceptor reading `rotation_header` and matching `classifier`.
	pub fn new(
		store: CredentialStore,
		rotation_header: impl Into<String>,
		classifier: Arc<dyn InvalidationClassifier>,
	) -> Self {
		Self {
			store,
			rotation_header: rotation_header.into(),
			classifier,
			metrics: Default::default(),
		}
	}

	/// Shares `metrics` with the owning client.
	pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Replaces the invalidation classifier.
	pub fn with_classifier(mut self, classifier: Arc<dyn InvalidationClassifier>) -> Self {
		self.classifier = classifier;

		self
	}

	/// Rotation channel: stores a replacement token carried by a successful response.
	pub fn on_response(&self, response: &ApiResponse) -> Intercepted {
		let Some(token) = response.header(&self.rotation_header).map(str::trim) else {
			return Intercepted::Nothing;
		};

		if token.is_empty() {
			return Intercepted::Nothing;
		}

		self.store.set_token(token);
		self.metrics.record_rotation();

		tracing::info!(header = %self.rotation_header, "Rotated credential from response header.");

		Intercepted::Rotated
	}

	/// Invalidation channel: logs out when `error` carries the invalidation marker.
	pub fn on_error(&self, error: &Error) -> Intercepted {
		if !self.classifier.is_invalidation(error) {
			return Intercepted::Nothing;
		}
		if !self.store.logout() {
			return Intercepted::AlreadyInvalidated;
		}

		self.metrics.record_invalidation();

		tracing::info!(status = ?error.status(), "Credential invalidated by API; logged out.");

		Intercepted::Invalidated
	}

	/// Runs the channel matching `outcome`.
	pub fn inspect(&self, outcome: &Result<ApiResponse>) -> Intercepted {
		match outcome {
			Ok(response) => self.on_response(response),
			Err(error) => self.on_error(error),
		}
	}
}
impl Debug for Interceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Interceptor").field("rotation_header", &self.rotation_header).finish()
	}
}
