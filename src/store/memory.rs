//! Thread-safe in-memory [`CredentialBackend`] for tests and ephemeral sessions.

// std
use std::collections::HashMap;
// self
use crate::{
	_prelude::*,
	store::{CredentialBackend, StoreError},
};

/// Keeps values in-process; clones share the same map so a "restart" can be simulated by
/// building a new store over a clone.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend(Arc<RwLock<HashMap<String, String>>>);
impl MemoryBackend {
	/// Number of keys currently stored.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl CredentialBackend for MemoryBackend {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clones_share_state() {
		let backend = MemoryBackend::default();
		let twin = backend.clone();

		backend.set("k", "v").expect("Memory set should succeed.");

		assert_eq!(twin.get("k").expect("Memory get should succeed."), Some("v".into()));

		twin.remove("k").expect("Memory remove should succeed.");
		twin.remove("k").expect("Removing a missing key should succeed.");

		assert!(backend.is_empty());
	}
}
