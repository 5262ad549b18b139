//! Validating builder for [`RequestDescriptor`] values.

// self
use crate::{
	_prelude::*,
	credential::Credential,
	error::ConfigError,
	http::MultipartForm,
	request::{Audience, ContentType, Method, Payload, RequestDescriptor},
};

/// Errors raised while constructing or resolving descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum RequestBuildError {
	/// Path is empty.
	#[error("Request path must not be empty.")]
	EmptyPath,
	/// Absolute URLs would bypass the audience base address.
	#[error("Request path must be relative to the audience base address: {path}.")]
	AbsolutePath {
		/// Offending path.
		path: String,
	},
	/// Path could not be joined onto the base address.
	#[error("Request path {path} is invalid: {reason}.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Parser-supplied reason.
		reason: String,
	},
	/// Multipart calls need a multipart payload.
	#[error("Multipart requests must carry a multipart payload.")]
	MultipartWithoutForm,
}

/// Builder for [`RequestDescriptor`] values.
#[derive(Debug)]
pub struct RequestDescriptorBuilder {
	/// Target backend.
	pub audience: Audience,
	/// HTTP method.
	pub method: Method,
	/// Path relative to the audience base address.
	pub path: String,
	/// Optional body.
	pub payload: Option<Payload>,
	/// Attach the bearer token (authenticated audience only). Defaults to `true`.
	pub use_token: bool,
	/// Body encoding.
	pub content_type: ContentType,
}
impl RequestDescriptorBuilder {
	/// Creates a new builder with a JSON content type and `use_token = true`.
	pub fn new(audience: Audience, method: Method, path: impl Into<String>) -> Self {
		Self {
			audience,
			method,
			path: path.into(),
			payload: None,
			use_token: true,
			content_type: ContentType::Json,
		}
	}

	/// Sets a JSON body.
	pub fn json(mut self, value: serde_json::Value) -> Self {
		self.payload = Some(Payload::Json(value));
		self.content_type = ContentType::Json;

		self
	}

	/// Serializes `value` into a JSON body.
	pub fn serialize<T>(self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		Ok(self.json(serde_json::to_value(value)?))
	}

	/// Sets a multipart body and switches the content type accordingly.
	pub fn multipart(mut self, form: MultipartForm) -> Self {
		self.payload = Some(Payload::Multipart(form));
		self.content_type = ContentType::Multipart;

		self
	}

	/// Overrides the `use_token` flag.
	pub fn use_token(mut self, use_token: bool) -> Self {
		self.use_token = use_token;

		self
	}

	/// Consumes the builder, resolving the `Authorization` header against `credential`.
	pub fn build(self, credential: &Credential) -> Result<RequestDescriptor, RequestBuildError> {
		let trimmed = self.path.trim();

		if trimmed.is_empty() {
			return Err(RequestBuildError::EmptyPath);
		}
		if trimmed.starts_with("//") || Url::parse(trimmed).is_ok() {
			return Err(RequestBuildError::AbsolutePath { path: self.path });
		}
		if self.content_type == ContentType::Multipart
			&& !matches!(self.payload, Some(Payload::Multipart(_)))
		{
			return Err(RequestBuildError::MultipartWithoutForm);
		}

		let authorization = (self.use_token && self.audience == Audience::Authenticated)
			.then(|| credential.bearer());

		Ok(RequestDescriptor {
			method: self.method,
			path: trimmed.to_owned(),
			payload: self.payload,
			use_token: self.use_token,
			content_type: self.content_type,
			audience: self.audience,
			authorization,
		})
	}
}
