//! Request descriptors: what a caller wants sent, independent of any transport.
//!
//! A [`RequestDescriptor`] is produced by [`RequestDescriptorBuilder::build`] against a
//! credential snapshot and is immutable afterwards. The `Authorization` header is resolved at
//! build time and only ever for the authenticated audience.

pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ConfigError,
	http::{Body, Headers, HttpRequest, MultipartForm},
};

/// Which backend base address a request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
	/// Property and admin operations.
	Authenticated,
	/// Unauthenticated browsing.
	Public,
}
impl Audience {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Audience::Authenticated => "authenticated",
			Audience::Public => "public",
		}
	}
}
impl Display for Audience {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// HTTP methods the client issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `HEAD`
	Head,
	/// `OPTIONS`
	Options,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Wire name of the method.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Head => "HEAD",
			Method::Options => "OPTIONS",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}

	/// Whether repeating the request has no effect beyond the original intent.
	pub const fn is_idempotent(self) -> bool {
		matches!(self, Method::Get | Method::Head | Method::Options | Method::Put | Method::Delete)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Encoding used for the request body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
	/// `application/json`.
	#[default]
	Json,
	/// `multipart/form-data` for file-carrying calls.
	Multipart,
}
impl ContentType {
	/// MIME type advertised for JSON bodies.
	pub const JSON_MIME: &'static str = "application/json";
}

/// Request body as supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
	/// Arbitrary JSON document.
	Json(serde_json::Value),
	/// Text and file parts.
	Multipart(MultipartForm),
}

/// Immutable description of one logical API call.
#[derive(Clone)]
pub struct RequestDescriptor {
	method: Method,
	path: String,
	payload: Option<Payload>,
	use_token: bool,
	content_type: ContentType,
	audience: Audience,
	authorization: Option<String>,
}
impl RequestDescriptor {
	/// Starts a builder for `method path` against `audience`.
	pub fn builder(
		audience: Audience,
		method: Method,
		path: impl Into<String>,
	) -> RequestDescriptorBuilder {
		RequestDescriptorBuilder::new(audience, method, path)
	}

	/// HTTP method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Path relative to the audience base address.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Caller-supplied body.
	pub fn payload(&self) -> Option<&Payload> {
		self.payload.as_ref()
	}

	/// Whether the caller asked for the bearer token.
	pub fn use_token(&self) -> bool {
		self.use_token
	}

	/// Body encoding.
	pub fn content_type(&self) -> ContentType {
		self.content_type
	}

	/// Target backend.
	pub fn audience(&self) -> Audience {
		self.audience
	}

	/// Resolved `Authorization` header value; always `None` for the public audience.
	pub fn authorization(&self) -> Option<&str> {
		self.authorization.as_deref()
	}

	/// Resolves the descriptor into a transport request against the configured base address.
	pub fn resolve(&self, config: &ClientConfig) -> Result<HttpRequest> {
		let relative = self.path.trim_start_matches('/');
		let url = config.base_url(self.audience).join(relative).map_err(|source| {
			RequestBuildError::InvalidPath { path: self.path.clone(), reason: source.to_string() }
		})?;
		let mut headers = Headers::default();

		if let Some(value) = &self.authorization {
			headers.insert("authorization", value);
		}

		let body = match &self.payload {
			None => Body::Empty,
			Some(Payload::Json(value)) =>
				Body::Json(serde_json::to_vec(value).map_err(ConfigError::from)?),
			Some(Payload::Multipart(form)) => Body::Multipart(form.clone()),
		};

		// Multipart boundaries are chosen by the transport, which also sets the header.
		if self.content_type == ContentType::Json {
			headers.insert("content-type", ContentType::JSON_MIME);
		}

		Ok(HttpRequest { method: self.method, url, headers, body })
	}
}
impl Debug for RequestDescriptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDescriptor")
			.field("method", &self.method)
			.field("path", &self.path)
			.field("audience", &self.audience)
			.field("content_type", &self.content_type)
			.field("use_token", &self.use_token)
			.field("authorization_set", &self.authorization.is_some())
			.finish()
	}
}
