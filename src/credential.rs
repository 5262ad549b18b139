//! Process-wide credential holder with synchronous best-effort persistence.
//!
//! [`CredentialStore`] owns the one live [`Credential`] for the process. Clones share state, so
//! the store is constructed once at startup with [`CredentialStore::init`] and handed to every
//! client. Each mutation swaps the whole value under a write lock and persists it before
//! returning; readers therefore never observe a half-rotated credential. Persistence failures
//! are logged and swallowed.

// self
use crate::{
	_prelude::*,
	store::{CredentialBackend, MemoryBackend},
};

/// Callback registered by other subsystems to tear down session state on logout.
pub type LogoutHook = Arc<dyn Fn() + Send + Sync>;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Bearer credential plus the authenticated flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Current bearer token, if any.
	pub token: Option<TokenSecret>,
	/// Whether the holder completed a login.
	pub is_authenticated: bool,
}
impl Credential {
	/// Value placed after `Bearer ` when a token is requested but none is stored.
	pub const MISSING_TOKEN_PLACEHOLDER: &'static str = "null";

	/// `true` while there is anything a logout would need to clear.
	pub fn is_active(&self) -> bool {
		self.token.is_some() || self.is_authenticated
	}

	/// Renders the `Authorization` header value for this credential.
	pub fn bearer(&self) -> String {
		let token =
			self.token.as_ref().map_or(Self::MISSING_TOKEN_PLACEHOLDER, TokenSecret::expose);

		format!("Bearer {token}")
	}
}

/// Shared handle to the process credential.
#[derive(Clone)]
pub struct CredentialStore {
	state: Arc<RwLock<Credential>>,
	backend: Arc<dyn CredentialBackend>,
	logout_hooks: Arc<RwLock<Vec<LogoutHook>>>,
}
impl CredentialStore {
	/// Key the serialized credential lives under in the backend.
	pub const STORAGE_KEY: &'static str = "listing_client.credential";

	/// Loads the persisted credential from `backend`, starting signed out when nothing usable
	/// is stored.
	pub fn init(backend: Arc<dyn CredentialBackend>) -> Self {
		let initial = match backend.get(Self::STORAGE_KEY) {
			Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
				tracing::warn!(error = %e, "Discarding unreadable persisted credential.");

				Credential::default()
			}),
			Ok(None) => Credential::default(),
			Err(e) => {
				tracing::warn!(error = %e, "Failed to load persisted credential.");

				Credential::default()
			},
		};

		Self {
			state: Arc::new(RwLock::new(initial)),
			backend,
			logout_hooks: Default::default(),
		}
	}

	/// Store backed by a fresh [`MemoryBackend`].
	pub fn in_memory() -> Self {
		Self::init(Arc::new(MemoryBackend::default()))
	}

	/// Snapshot of the current credential.
	pub fn get(&self) -> Credential {
		self.state.read().clone()
	}

	/// Replaces the token and marks the holder authenticated.
	pub fn set_token(&self, token: impl Into<String>) {
		self.replace(Credential { token: Some(TokenSecret::new(token)), is_authenticated: true });
	}

	/// Replaces the token without touching the authenticated flag (pre-login public flows).
	pub fn set_unauthenticated_token(&self, token: impl Into<String>) {
		let mut guard = self.state.write();

		guard.token = Some(TokenSecret::new(token));

		self.persist_locked(&guard);
	}

	/// Drops the token and the authenticated flag.
	pub fn clear(&self) {
		let mut guard = self.state.write();

		*guard = Credential::default();

		self.remove_locked();
	}

	/// Registers a callback fired once per logout.
	pub fn on_logout(&self, hook: impl Fn() + Send + Sync + 'static) {
		self.logout_hooks.write().push(Arc::new(hook));
	}

	/// Clears the credential and runs logout hooks, unless already signed out.
	///
	/// Returns `true` only for the call that performed the transition, so concurrent logouts
	/// fire the hooks once.
	pub fn logout(&self) -> bool {
		{
			let mut guard = self.state.write();

			if !guard.is_active() {
				return false;
			}

			*guard = Credential::default();

			self.remove_locked();
		}

		let hooks = self.logout_hooks.read().clone();

		for hook in hooks {
			hook();
		}

		true
	}

	fn replace(&self, next: Credential) {
		let mut guard = self.state.write();

		*guard = next;

		self.persist_locked(&guard);
	}

	fn persist_locked(&self, credential: &Credential) {
		let result = serde_json::to_string(credential)
			.map_err(|e| crate::store::StoreError::Serialization { message: e.to_string() })
			.and_then(|raw| self.backend.set(Self::STORAGE_KEY, &raw));

		if let Err(e) = result {
			tracing::warn!(error = %e, "Credential was not persisted.");
		}
	}

	fn remove_locked(&self) {
		if let Err(e) = self.backend.remove(Self::STORAGE_KEY) {
			tracing::warn!(error = %e, "Credential removal was not persisted.");
		}
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore")
			.field("credential", &*self.state.read())
			.field("logout_hooks", &self.logout_hooks.read().len())
			.finish()
	}
}
