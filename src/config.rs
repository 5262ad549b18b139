//! Client configuration: audience base addresses, rate ceiling, retry budget, and the
//! credential signal names the interceptors look for.

// self
use crate::{_prelude::*, request::Audience};

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// Configuration document could not be parsed.
	#[error("Configuration document is invalid: {message}.")]
	Parse {
		/// Parser-supplied reason.
		message: String,
	},
	/// Base addresses must use HTTP(S).
	#[error("The {audience} base address must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which audience failed validation.
		audience: &'static str,
		/// Offending URL.
		url: String,
	},
	/// Base addresses must be able to carry relative paths.
	#[error("The {audience} base address cannot be used as a base: {url}.")]
	CannotBeBase {
		/// Which audience failed validation.
		audience: &'static str,
		/// Offending URL.
		url: String,
	},
	/// The rate ceiling must admit at least one request.
	#[error("Rate limit must admit at least one request per window.")]
	ZeroRateCeiling,
	/// The rate window must be non-empty.
	#[error("Rate limit window must be longer than zero milliseconds.")]
	ZeroRateWindow,
	/// At least the original attempt must be allowed.
	#[error("Retry policy must allow at least one attempt.")]
	ZeroAttempts,
	/// Rotation header name is required.
	#[error("Rotation header name must not be empty.")]
	EmptyRotationHeader,
	/// Invalidation marker is required.
	#[error("Invalidation marker must not be empty.")]
	EmptyInvalidationMarker,
}

/// Sliding-window rate ceiling shared by every caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Requests initiated per window.
	pub max_requests: u32,
	/// Window length in milliseconds.
	pub window_ms: u64,
}
impl RateLimitConfig {
	/// Window length as a [`Duration`].
	pub fn window(&self) -> Duration {
		Duration::from_millis(self.window_ms)
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self { max_requests: 5, window_ms: 1_000 }
	}
}

/// Retry budget and backoff curve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	/// Total attempts including the original one.
	pub max_attempts: u32,
	/// Delay before the first retry, in milliseconds; doubles per further retry.
	pub base_delay_ms: u64,
	/// Upper bound for any single delay, in milliseconds.
	pub max_delay_ms: u64,
	/// Adds up to 20% random jitter on top of the exponential delay.
	pub jitter: bool,
	/// Waits at least as long as a server-supplied `Retry-After`.
	pub honor_retry_after: bool,
}
impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 2,
			base_delay_ms: 100,
			max_delay_ms: 10_000,
			jitter: true,
			honor_retry_after: true,
		}
	}
}

/// Complete client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base address of the authenticated API.
	pub authenticated_base: Url,
	/// Base address of the public API.
	pub public_base: Url,
	/// Process-wide rate ceiling.
	#[serde(default)]
	pub rate_limit: RateLimitConfig,
	/// Retry budget and backoff.
	#[serde(default)]
	pub retry: RetryConfig,
	/// Response header carrying a replacement token.
	#[serde(default = "ClientConfig::default_rotation_header")]
	pub rotation_header: String,
	/// Substring of an error `message` that marks the credential as invalid.
	#[serde(default = "ClientConfig::default_invalidation_marker")]
	pub invalidation_marker: String,
	/// Transport timeout in milliseconds; a timed-out call counts as a network error.
	#[serde(default = "ClientConfig::default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}
impl ClientConfig {
	/// Default rotation header name.
	pub const DEFAULT_ROTATION_HEADER: &'static str = "x-refresh-token";
	/// Default invalidation marker.
	pub const DEFAULT_INVALIDATION_MARKER: &'static str = "Token error";

	/// Starts a builder with both base addresses and default tuning.
	pub fn builder(authenticated_base: Url, public_base: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(authenticated_base, public_base)
	}

	/// Parses a JSON document and validates it.
	pub fn from_json(raw: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(raw)
			.map_err(|e| ClientConfigError::Parse { message: e.to_string() })?;

		Ok(config.validated()?)
	}

	/// Validates the configuration and normalizes base addresses to end with `/`.
	pub fn validated(mut self) -> Result<Self, ClientConfigError> {
		self.authenticated_base = normalize_base("authenticated", self.authenticated_base)?;
		self.public_base = normalize_base("public", self.public_base)?;

		if self.rate_limit.max_requests == 0 {
			return Err(ClientConfigError::ZeroRateCeiling);
		}
		if self.rate_limit.window_ms == 0 {
			return Err(ClientConfigError::ZeroRateWindow);
		}
		if self.retry.max_attempts == 0 {
			return Err(ClientConfigError::ZeroAttempts);
		}
		if self.rotation_header.trim().is_empty() {
			return Err(ClientConfigError::EmptyRotationHeader);
		}
		if self.invalidation_marker.is_empty() {
			return Err(ClientConfigError::EmptyInvalidationMarker);
		}

		Ok(self)
	}

	/// Base address for the given audience.
	pub fn base_url(&self, audience: Audience) -> &Url {
		match audience {
			Audience::Authenticated => &self.authenticated_base,
			Audience::Public => &self.public_base,
		}
	}

	/// Transport timeout as a [`Duration`].
	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	fn default_rotation_header() -> String {
		Self::DEFAULT_ROTATION_HEADER.into()
	}

	fn default_invalidation_marker() -> String {
		Self::DEFAULT_INVALIDATION_MARKER.into()
	}

	fn default_request_timeout_ms() -> u64 {
		30_000
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	fn new(authenticated_base: Url, public_base: Url) -> Self {
		Self {
			config: ClientConfig {
				authenticated_base,
				public_base,
				rate_limit: RateLimitConfig::default(),
				retry: RetryConfig::default(),
				rotation_header: ClientConfig::default_rotation_header(),
				invalidation_marker: ClientConfig::default_invalidation_marker(),
				request_timeout_ms: ClientConfig::default_request_timeout_ms(),
			},
		}
	}

	/// Overrides the rate ceiling.
	pub fn rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
		self.config.rate_limit = RateLimitConfig {
			max_requests,
			window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
		};

		self
	}

	/// Overrides the retry configuration.
	pub fn retry(mut self, retry: RetryConfig) -> Self {
		self.config.retry = retry;

		self
	}

	/// Overrides the rotation header name.
	pub fn rotation_header(mut self, name: impl Into<String>) -> Self {
		self.config.rotation_header = name.into();

		self
	}

	/// Overrides the invalidation marker.
	pub fn invalidation_marker(mut self, marker: impl Into<String>) -> Self {
		self.config.invalidation_marker = marker.into();

		self
	}

	/// Overrides the transport timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		self.config.validated()
	}
}

fn normalize_base(audience: &'static str, mut url: Url) -> Result<Url, ClientConfigError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ClientConfigError::UnsupportedScheme { audience, url: url.to_string() });
	}
	if url.cannot_be_a_base() {
		return Err(ClientConfigError::CannotBeBase { audience, url: url.to_string() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn builder_normalizes_trailing_slash() {
		let config = ClientConfig::builder(
			url("https://api.example.com/api"),
			url("https://public.example.com"),
		)
		.build()
		.expect("Config fixture should validate.");

		assert_eq!(config.authenticated_base.as_str(), "https://api.example.com/api/");
		assert_eq!(config.public_base.as_str(), "https://public.example.com/");
		assert_eq!(config.base_url(Audience::Public), &config.public_base);
	}

	#[test]
	fn builder_rejects_bad_tuning() {
		let base =
			|| ClientConfig::builder(url("https://a.example.com"), url("https://b.example.com"));

		assert_eq!(
			base().rate_limit(0, Duration::from_secs(1)).build(),
			Err(ClientConfigError::ZeroRateCeiling)
		);
		assert_eq!(
			base().rate_limit(5, Duration::ZERO).build(),
			Err(ClientConfigError::ZeroRateWindow)
		);
		assert_eq!(
			base().retry(RetryConfig { max_attempts: 0, ..RetryConfig::default() }).build(),
			Err(ClientConfigError::ZeroAttempts)
		);
		assert_eq!(
			base().rotation_header(" ").build(),
			Err(ClientConfigError::EmptyRotationHeader)
		);
		assert_eq!(
			base().invalidation_marker("").build(),
			Err(ClientConfigError::EmptyInvalidationMarker)
		);
	}

	#[test]
	fn builder_rejects_non_http_bases() {
		let err =
			ClientConfig::builder(url("ftp://files.example.com"), url("https://b.example.com"))
				.build()
				.expect_err("FTP base address should be rejected.");

		assert!(matches!(
			err,
			ClientConfigError::UnsupportedScheme { audience: "authenticated", .. }
		));
	}

	#[test]
	fn json_config_reports_parse_failures() {
		let err = ClientConfig::from_json(r#"{"public_base":"https://www.example.com"}"#)
			.expect_err("Config without an authenticated base should fail.");

		assert!(matches!(
			err,
			Error::Config(crate::error::ConfigError::Client(ClientConfigError::Parse { .. }))
		));
	}

	#[test]
	fn json_config_fills_defaults() {
		let config = ClientConfig::from_json(
			r#"{"authenticated_base":"https://api.example.com/v1","public_base":"https://www.example.com/public/"}"#,
		)
		.expect("Minimal JSON config should parse.");

		assert_eq!(config.rate_limit, RateLimitConfig { max_requests: 5, window_ms: 1_000 });
		assert_eq!(config.retry.max_attempts, 2);
		assert_eq!(config.rotation_header, ClientConfig::DEFAULT_ROTATION_HEADER);
		assert_eq!(config.invalidation_marker, ClientConfig::DEFAULT_INVALIDATION_MARKER);
		assert_eq!(config.authenticated_base.as_str(), "https://api.example.com/v1/");
		assert_eq!(config.request_timeout(), Duration::from_secs(30));
	}
}
