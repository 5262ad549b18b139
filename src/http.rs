//! Transport primitives for API calls.
//!
//! [`ApiTransport`] is the client's only dependency on an HTTP stack. The dispatcher hands it
//! fully resolved [`HttpRequest`] values and receives raw [`ApiResponse`] values back; status
//! classification, retries, and credential side effects all happen above this layer, so a
//! transport only reports what the wire said. Implementations must be `Send + Sync + 'static`
//! because every logical call runs on a detached task.

// crates.io
use serde::de::DeserializeOwned;
use time::{OffsetDateTime, format_description::well_known::Rfc2822};
// self
use crate::{_prelude::*, request::Method};

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Abstraction over HTTP transports able to execute API calls.
///
/// Implementations return `Ok` for every response that carries an HTTP status, including 4xx
/// and 5xx, and reserve `Err` for failures that never produced one (connect, reset, timeout)
/// or for requests the transport refused to build.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns whatever the API answered.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Case-insensitive header map; names are stored lowercased.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);
impl Headers {
	/// Inserts or replaces a header.
	pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
		self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
	}

	/// Looks up a header by case-insensitive name.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns `true` if the header is present.
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(&name.to_ascii_lowercase())
	}

	/// Iterates `(name, value)` pairs in name order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}
}
impl Debug for Headers {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_map()
			.entries(self.0.iter().map(|(name, value)| {
				let shown = if name == "authorization" { "<redacted>" } else { value.as_str() };

				(name.as_str(), shown)
			}))
			.finish()
	}
}
impl<K, V> FromIterator<(K, V)> for Headers
where
	K: AsRef<str>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut headers = Self::default();

		for (name, value) in iter {
			headers.insert(name, value);
		}

		headers
	}
}

/// Fully resolved outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Headers to send (`authorization`, `content-type`).
	pub headers: Headers,
	/// Encoded body.
	pub body: Body,
}

/// Encoded request body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
	/// No body.
	Empty,
	/// Serialized JSON bytes.
	Json(Vec<u8>),
	/// Multipart parts; the transport picks the boundary.
	Multipart(MultipartForm),
}

/// Ordered multipart form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipartForm(Vec<MultipartPart>);
impl MultipartForm {
	/// Creates an empty form.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a text field.
	pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.push(MultipartPart { name: name.into(), content: PartContent::Text(value.into()) });

		self
	}

	/// Appends a file field.
	pub fn file(
		mut self,
		name: impl Into<String>,
		file_name: impl Into<String>,
		mime: impl Into<String>,
		bytes: Vec<u8>,
	) -> Self {
		self.0.push(MultipartPart {
			name: name.into(),
			content: PartContent::File { file_name: file_name.into(), mime: mime.into(), bytes },
		});

		self
	}

	/// Parts in insertion order.
	pub fn parts(&self) -> &[MultipartPart] {
		&self.0
	}
}

/// One multipart field.
#[derive(Clone, Debug, PartialEq)]
pub struct MultipartPart {
	/// Field name.
	pub name: String,
	/// Field content.
	pub content: PartContent,
}

/// Content of a multipart field.
#[derive(Clone, PartialEq)]
pub enum PartContent {
	/// Plain text value.
	Text(String),
	/// Binary file.
	File {
		/// File name reported to the server.
		file_name: String,
		/// MIME type of the bytes.
		mime: String,
		/// Raw contents.
		bytes: Vec<u8>,
	},
}
impl Debug for PartContent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Text(value) => f.debug_tuple("Text").field(value).finish(),
			Self::File { file_name, mime, bytes } => f
				.debug_struct("File")
				.field("file_name", file_name)
				.field("mime", mime)
				.field("len", &bytes.len())
				.finish(),
		}
	}
}

/// Raw response returned by a transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: Headers,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with no headers.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: Headers::default(), body: body.into() }
	}

	/// Adds a header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Looks up a response header.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name)
	}

	/// Parses `Retry-After` as delay seconds or an RFC 2822 date.
	pub fn retry_after(&self) -> Option<Duration> {
		let raw = self.header("retry-after")?.trim();

		if let Ok(secs) = raw.parse::<u64>() {
			return Some(Duration::from_secs(secs));
		}
		if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
			let delta = moment - OffsetDateTime::now_utc();

			if delta.is_positive() {
				return Duration::try_from(delta).ok();
			}
		}

		None
	}

	/// Decodes the JSON body, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status })
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests time out after `timeout`.
	pub fn with_timeout(timeout: Duration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(crate::error::ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	fn method(method: Method) -> reqwest::Method {
		match method {
			Method::Get => reqwest::Method::GET,
			Method::Head => reqwest::Method::HEAD,
			Method::Options => reqwest::Method::OPTIONS,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		}
	}

	fn multipart(form: MultipartForm) -> Result<reqwest::multipart::Form> {
		let mut out = reqwest::multipart::Form::new();

		for part in form.0 {
			out = match part.content {
				PartContent::Text(value) => out.text(part.name, value),
				PartContent::File { file_name, mime, bytes } => {
					let file = reqwest::multipart::Part::bytes(bytes)
						.file_name(file_name)
						.mime_str(&mime)?;

					out.part(part.name, file)
				},
			};
		}

		Ok(out)
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut builder = self.0.request(Self::method(request.method), request.url);

			for (name, value) in request.headers.iter() {
				builder = builder.header(name, value);
			}

			builder = match request.body {
				Body::Empty => builder,
				Body::Json(bytes) => builder.body(bytes),
				Body::Multipart(form) => builder.multipart(Self::multipart(form)?),
			};

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
				.collect::<Headers>();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}
