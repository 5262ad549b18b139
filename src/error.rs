//! Client-level error types shared across the dispatcher, retry policy, and interceptors.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// The layer never swallows a failure; retries and credential side effects happen alongside
/// propagation, so callers always receive one of these variants for a failed call.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (connect, reset, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// API answered with a 5xx status.
	#[error("API responded with server error HTTP {status}.")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Parsed error payload.
		body: ApiErrorBody,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// API rejected the request (4xx validation or business-rule failure).
	#[error("API rejected the request with HTTP {status}.")]
	Client {
		/// HTTP status code.
		status: u16,
		/// Parsed error payload, propagated verbatim for field-level rendering.
		body: ApiErrorBody,
	},
	/// Successful response body did not match the expected shape.
	#[error("API response body could not be decoded.")]
	Decode {
		/// Structured parsing failure including the failing JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// The detached call task ended without reporting an outcome.
	#[error("Call task ended without a result: {message}.")]
	Detached {
		/// Runtime-supplied reason.
		message: String,
	},
}
impl Error {
	/// Returns the HTTP status attached to the failure, when the API answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Server { status, .. }
			| Self::Client { status, .. }
			| Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns the structured error payload for failures answered by the API.
	pub fn api_body(&self) -> Option<&ApiErrorBody> {
		match self {
			Self::Server { body, .. } | Self::Client { body, .. } => Some(body),
			_ => None,
		}
	}

	/// Returns `true` for network-level failures that never reached an HTTP status.
	pub fn is_network(&self) -> bool {
		matches!(self, Self::Transport(_))
	}

	/// Returns `true` for failures worth repeating: network errors and 5xx answers.
	///
	/// Whether a repeat is actually safe also depends on the method; see
	/// [`crate::retry::NetworkOrIdempotent`].
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transport(_) | Self::Server { .. })
	}
}

/// Error payload returned by the API on non-2xx responses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
	/// The `message` field; arrays of messages are joined with `"; "`.
	pub message: Option<String>,
	/// Entire JSON document, when the body parsed as JSON.
	pub payload: Option<serde_json::Value>,
	/// Raw body text (lossy UTF-8).
	pub raw: String,
}
impl ApiErrorBody {
	/// Parses an error body, tolerating non-JSON payloads.
	pub fn parse(bytes: &[u8]) -> Self {
		let raw = String::from_utf8_lossy(bytes).into_owned();
		let payload = serde_json::from_slice::<serde_json::Value>(bytes).ok();
		let message = payload.as_ref().and_then(|value| match value.get("message")? {
			serde_json::Value::String(message) => Some(message.to_owned()),
			serde_json::Value::Array(items) => {
				let joined = items.iter().filter_map(|item| item.as_str()).collect::<Vec<_>>();

				if joined.is_empty() { None } else { Some(joined.join("; ")) }
			},
			_ => None,
		});

		Self { message, payload, raw }
	}
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Transport refused to build the outbound request (bad header, bad multipart part).
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying transport failure.
		#[source]
		source: BoxError,
	},
	/// Client configuration failed validation.
	#[error(transparent)]
	Client(#[from] crate::config::ClientConfigError),
	/// Request descriptor failed validation.
	#[error(transparent)]
	Request(#[from] crate::request::RequestBuildError),
	/// Request payload could not be serialized.
	#[error("Request payload could not be serialized.")]
	PayloadEncode(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a transport's request construction failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpRequest { source: Box::new(src) }
	}
}
impl From<crate::config::ClientConfigError> for Error {
	fn from(e: crate::config::ClientConfigError) -> Self {
		Self::Config(e.into())
	}
}
impl From<crate::request::RequestBuildError> for Error {
	fn from(e: crate::request::RequestBuildError) -> Self {
		Self::Config(e.into())
	}
}

/// Transport-level failures (network, IO). Always classified as retryable.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Connection could not be established or was reset.
	#[error("Could not connect to the API.")]
	Connect {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The transport gave up waiting for the API.
	#[error("Request to the API timed out.")]
	Timeout {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Any other network failure reported by the transport.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a connection failure.
	pub fn connect(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connect { source: Box::new(src) }
	}

	/// Wraps a timeout failure.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}

	/// Wraps a generic network failure.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for Error {
	fn from(e: ReqwestError) -> Self {
		if e.is_builder() {
			ConfigError::http_request(e).into()
		} else if e.is_timeout() {
			TransportError::timeout(e).into()
		} else if e.is_connect() {
			TransportError::connect(e).into()
		} else {
			TransportError::network(e).into()
		}
	}
}
