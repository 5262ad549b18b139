//! Caller-facing client composed from the credential store, dispatcher, retry policy, and
//! interceptor.
//!
//! One logical call flows through the layers in a fixed order: the descriptor is resolved
//! against the configured base address, the [`RetryPolicy`] drives one or more attempts, each
//! attempt passes the shared [`Dispatcher`] gate before reaching the transport, the raw response
//! is classified into success or the error taxonomy, and the [`Interceptor`] applies rotation or
//! invalidation before the outcome is handed back to the retry loop.
//!
//! Every call runs on a detached Tokio task. Dropping the future returned by
//! [`ApiClient::send`] stops the caller from waiting but never cancels the round trip, so
//! credential side effects still land. Calls must therefore be issued from inside a Tokio
//! runtime.

mod stats;

pub use stats::*;

// crates.io
use serde::de::DeserializeOwned;
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	clock::{Clock, TokioClock},
	config::ClientConfig,
	credential::{Credential, CredentialStore},
	dispatch::Dispatcher,
	error::ApiErrorBody,
	http::{ApiResponse, ApiTransport, HttpRequest},
	intercept::{Interceptor, InvalidationClassifier, MessageMarker},
	obs::{self, CallOutcome, CallSpan},
	request::{Audience, Method, RequestDescriptor, RequestDescriptorBuilder},
	retry::RetryPolicy,
};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Shared handle issuing API calls through the rate gate, retry policy, and interceptor.
///
/// Clones share the transport, the credential store, the dispatcher, and the metrics, so a
/// single client (or its clones) enforces one rate ceiling across every caller in the process.
pub struct ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	store: CredentialStore,
	dispatcher: Arc<Dispatcher>,
	retry: RetryPolicy,
	interceptor: Interceptor,
	clock: Arc<dyn Clock>,
	metrics: Arc<ClientMetrics>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a client over a caller-provided transport.
	///
	/// The configuration is validated first; the retry policy, dispatcher, and invalidation
	/// marker are all derived from it.
	pub fn with_transport(
		config: ClientConfig,
		store: CredentialStore,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let config = config.validated()?;
		let clock: Arc<dyn Clock> = Arc::new(TokioClock);
		let metrics = Arc::<ClientMetrics>::default();
		let interceptor = Interceptor::new(
			store.clone(),
			config.rotation_header.clone(),
			Arc::new(MessageMarker::new(config.invalidation_marker.clone())),
		)
		.with_metrics(metrics.clone());

		Ok(Self {
			dispatcher: Arc::new(Dispatcher::with_clock(&config.rate_limit, clock.clone())),
			retry: RetryPolicy::from(&config.retry),
			config: Arc::new(config),
			transport: transport.into(),
			store,
			interceptor,
			clock,
			metrics,
		})
	}

	/// Replaces the time source and rebuilds the dispatcher on top of it.
	///
	/// Call before [`ApiClient::with_dispatcher`] when both are customized.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.dispatcher = Arc::new(Dispatcher::with_clock(&self.config.rate_limit, clock.clone()));
		self.clock = clock;

		self
	}

	/// Shares an existing dispatcher, e.g. one gate across several clients.
	pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
		self.dispatcher = dispatcher;

		self
	}

	/// Replaces the retry policy derived from the configuration.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Replaces the marker-based invalidation classifier.
	pub fn with_invalidation_classifier(
		mut self,
		classifier: Arc<dyn InvalidationClassifier>,
	) -> Self {
		self.interceptor = self.interceptor.with_classifier(classifier);

		self
	}

	/// Validated configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential store shared with the interceptor.
	pub fn store(&self) -> &CredentialStore {
		&self.store
	}

	/// Snapshot of the current credential.
	pub fn credential(&self) -> Credential {
		self.store.get()
	}

	/// Round-trip counters.
	pub fn metrics(&self) -> &ClientMetrics {
		&self.metrics
	}

	/// Stores `token` as an authenticated credential.
	pub fn login(&self, token: impl Into<String>) {
		self.store.set_token(token);
	}

	/// Signs out; returns `false` when already signed out.
	pub fn logout(&self) -> bool {
		self.store.logout()
	}

	/// Registers a callback fired once per logout, whether explicit or API-triggered.
	pub fn on_logout(&self, hook: impl Fn() + Send + Sync + 'static) {
		self.store.on_logout(hook);
	}

	/// Starts a descriptor builder for `method path` against `audience`.
	pub fn request(
		&self,
		audience: Audience,
		method: Method,
		path: impl Into<String>,
	) -> RequestDescriptorBuilder {
		RequestDescriptor::builder(audience, method, path)
	}

	/// Builds `builder` against the current credential and sends it.
	pub async fn execute(&self, builder: RequestDescriptorBuilder) -> Result<ApiResponse> {
		let descriptor = builder.build(&self.store.get())?;

		self.send(descriptor).await
	}

	/// Like [`ApiClient::execute`], decoding the success body as JSON.
	pub async fn execute_json<R>(&self, builder: RequestDescriptorBuilder) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.execute(builder).await?.json()
	}

	/// Sends a prepared descriptor on a detached task and waits for its outcome.
	pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
		let client = self.clone();
		let span = CallSpan::new(&descriptor);
		let call =
			tokio::spawn(span.instrument(async move { client.round_trip(descriptor).await }));

		call.await.map_err(|e| Error::Detached { message: e.to_string() })?
	}

	/// Like [`ApiClient::send`], decoding the success body as JSON.
	pub async fn send_json<R>(&self, descriptor: RequestDescriptor) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.send(descriptor).await?.json()
	}

	async fn round_trip(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
		let audience = descriptor.audience();
		let result = match descriptor.resolve(&self.config) {
			Ok(request) =>
				self.retry
					.run(self.clock.as_ref(), descriptor.method(), |attempt| {
						let request = request.clone();

						async move { self.attempt(audience, attempt, request).await }
					})
					.await,
			Err(e) => Err(e),
		};

		match &result {
			Ok(response) => {
				self.metrics.record_success();
				obs::record_call_outcome(audience, CallOutcome::Success);

				tracing::debug!(status = response.status, "Call succeeded.");
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_call_outcome(audience, CallOutcome::Failure);

				tracing::debug!(status = ?e.status(), error = %e, "Call failed.");
			},
		}

		result
	}

	async fn attempt(
		&self,
		audience: Audience,
		attempt: u32,
		request: HttpRequest,
	) -> Result<ApiResponse> {
		if attempt > 1 {
			self.metrics.record_retry();
			obs::record_call_outcome(audience, CallOutcome::Retry);
		}

		self.metrics.record_attempt();
		obs::record_call_outcome(audience, CallOutcome::Attempt);

		let outcome =
			self.dispatcher.dispatch(self.transport.as_ref(), request).await.and_then(classify);

		self.interceptor.inspect(&outcome);

		outcome
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client backed by a reqwest transport using the configured request timeout.
	pub fn new(config: ClientConfig, store: CredentialStore) -> Result<Self> {
		let transport = ReqwestTransport::with_timeout(config.request_timeout())?;

		Self::with_transport(config, store, transport)
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			store: self.store.clone(),
			dispatcher: self.dispatcher.clone(),
			retry: self.retry.clone(),
			interceptor: self.interceptor.clone(),
			clock: self.clock.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("config", &self.config)
			.field("store", &self.store)
			.field("dispatcher", &self.dispatcher)
			.field("retry", &self.retry)
			.finish()
	}
}

/// Maps a raw response onto success, [`Error::Server`] (5xx), or [`Error::Client`].
fn classify(response: ApiResponse) -> Result<ApiResponse> {
	if response.is_success() {
		return Ok(response);
	}

	let status = response.status;
	let body = ApiErrorBody::parse(&response.body);

	if status >= 500 {
		Err(Error::Server { status, body, retry_after: response.retry_after() })
	} else {
		Err(Error::Client { status, body })
	}
}
