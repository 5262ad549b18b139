// std
use std::{
	path::{Path, PathBuf},
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};
// self
use listing_client::{
	client::ApiClient,
	config::ClientConfig,
	credential::{Credential, CredentialStore},
	http::{ApiResponse, ApiTransport, HttpRequest, TransportFuture},
	request::{Audience, Method},
	store::{CredentialBackend, FileBackend},
	url::Url,
};

struct Rotating;
impl ApiTransport for Rotating {
	fn execute(&self, _request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async { Ok(ApiResponse::new(200, "{}").with_header("x-refresh-token", "t2")) })
	}
}

fn temp_store_path(label: &str) -> PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock should be after the epoch.")
		.as_nanos();

	std::env::temp_dir().join(format!("listing-client-{label}-{nanos}")).join("credential.json")
}

fn open(path: &Path) -> CredentialStore {
	CredentialStore::init(Arc::new(FileBackend::open(path).expect("File backend should open.")))
}

#[test]
fn credential_survives_restart() {
	let path = temp_store_path("restart");

	open(&path).set_token("t1");

	let restored = open(&path).get();

	assert_eq!(restored.token.as_ref().map(|t| t.expose()), Some("t1"));
	assert!(restored.is_authenticated);

	open(&path).clear();

	assert_eq!(open(&path).get(), Credential::default());

	let _ = std::fs::remove_dir_all(path.parent().expect("Store path should have a parent."));
}

#[test]
fn unauthenticated_token_persists_without_flag() {
	let path = temp_store_path("guest");

	open(&path).set_unauthenticated_token("guest");

	let restored = open(&path).get();

	assert_eq!(restored.token.as_ref().map(|t| t.expose()), Some("guest"));
	assert!(!restored.is_authenticated);

	let _ = std::fs::remove_dir_all(path.parent().expect("Store path should have a parent."));
}

#[test]
fn unreadable_snapshot_starts_signed_out() {
	let path = temp_store_path("garbage");
	let backend = FileBackend::open(&path).expect("File backend should open.");

	backend
		.set(CredentialStore::STORAGE_KEY, "{not json")
		.expect("Raw value should be written.");

	assert_eq!(CredentialStore::init(Arc::new(backend)).get(), Credential::default());

	let _ = std::fs::remove_dir_all(path.parent().expect("Store path should have a parent."));
}

#[tokio::test]
async fn rotated_token_is_persisted() {
	let path = temp_store_path("rotation");
	let config = ClientConfig::builder(
		Url::parse("https://api.example.com/").expect("Authenticated base should parse."),
		Url::parse("https://public.example.com/").expect("Public base should parse."),
	)
	.build()
	.expect("Client config should be valid.");
	let client: ApiClient<Rotating> =
		ApiClient::with_transport(config, open(&path), Arc::new(Rotating))
			.expect("Client should build.");

	client.login("t1");
	client
		.execute(client.request(Audience::Authenticated, Method::Get, "me"))
		.await
		.expect("Call should succeed.");

	assert_eq!(open(&path).get().token.as_ref().map(|t| t.expose()), Some("t2"));

	let _ = std::fs::remove_dir_all(path.parent().expect("Store path should have a parent."));
}
