// std
use std::{sync::Arc, time::Duration};
// crates.io
use parking_lot::Mutex;
use tokio::time::Instant;
// self
use listing_client::{
	client::ApiClient,
	config::ClientConfig,
	credential::CredentialStore,
	dispatch::Dispatcher,
	http::{ApiResponse, ApiTransport, HttpRequest, TransportFuture},
	request::{Audience, Method},
	url::Url,
};

const WINDOW: Duration = Duration::from_millis(1_000);

/// Answers 200 after a short latency and records when each request reached the wire.
#[derive(Default)]
struct StampingTransport {
	dispatched: Mutex<Vec<(Instant, String)>>,
}
impl ApiTransport for StampingTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		self.dispatched.lock().push((Instant::now(), request.url.path().to_owned()));

		Box::pin(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;

			Ok(ApiResponse::new(200, "{}"))
		})
	}
}

fn config() -> ClientConfig {
	ClientConfig::builder(
		Url::parse("https://api.example.com/").expect("Authenticated base should parse."),
		Url::parse("https://public.example.com/").expect("Public base should parse."),
	)
	.rate_limit(5, WINDOW)
	.build()
	.expect("Client config should be valid.")
}

fn build_client(transport: Arc<StampingTransport>) -> ApiClient<StampingTransport> {
	ApiClient::with_transport(config(), CredentialStore::in_memory(), transport)
		.expect("Client should build.")
}

#[tokio::test(start_paused = true)]
async fn ten_back_to_back_calls_respect_ceiling() {
	let transport = Arc::new(StampingTransport::default());
	let client = build_client(transport.clone());
	let start = Instant::now();
	let mut calls = Vec::new();

	for i in 0..10 {
		let client = client.clone();
		let audience = if i % 2 == 0 { Audience::Authenticated } else { Audience::Public };

		calls.push(tokio::spawn(async move {
			client.execute(client.request(audience, Method::Get, format!("calls/{i}"))).await
		}));
	}
	for call in calls {
		call.await.expect("Call task should not panic.").expect("Every call should resolve.");
	}

	let dispatched = transport.dispatched.lock().clone();
	let stamps = dispatched.iter().map(|(at, _)| *at).collect::<Vec<_>>();

	assert_eq!(stamps.len(), 10);
	assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
	assert!(stamps[..5].iter().all(|at| *at - start < WINDOW));
	assert!(stamps[5] - stamps[0] >= WINDOW);
	assert!((5..10).all(|i| stamps[i] - stamps[i - 5] >= WINDOW));
	assert_eq!(client.metrics().successes(), 10);
}

#[tokio::test(start_paused = true)]
async fn throttled_calls_are_released_in_arrival_order() {
	let transport = Arc::new(StampingTransport::default());
	let client = build_client(transport.clone());
	let mut calls = Vec::new();

	for i in 0..8 {
		let client = client.clone();

		calls.push(tokio::spawn(async move {
			client.execute(client.request(Audience::Public, Method::Get, format!("q/{i}"))).await
		}));
		// Runnable tasks drain before paused time advances, so each call reserves first.
		tokio::time::sleep(Duration::from_millis(1)).await;
	}
	for call in calls {
		call.await.expect("Call task should not panic.").expect("Every call should resolve.");
	}

	let paths =
		transport.dispatched.lock().iter().map(|(_, path)| path.clone()).collect::<Vec<_>>();

	assert_eq!(paths, (0..8).map(|i| format!("/q/{i}")).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn clients_sharing_a_dispatcher_share_the_ceiling() {
	let transport = Arc::new(StampingTransport::default());
	let gate = Arc::new(Dispatcher::new(&config().rate_limit));
	let first = build_client(transport.clone()).with_dispatcher(gate.clone());
	let second = build_client(transport.clone()).with_dispatcher(gate);
	let start = Instant::now();
	let mut calls = Vec::new();

	for i in 0..6 {
		let client = if i % 2 == 0 { first.clone() } else { second.clone() };

		calls.push(tokio::spawn(async move {
			client.execute(client.request(Audience::Public, Method::Get, "properties")).await
		}));
	}
	for call in calls {
		call.await.expect("Call task should not panic.").expect("Every call should resolve.");
	}

	let last = transport.dispatched.lock().iter().map(|(at, _)| *at).max();

	assert!(last.is_some_and(|at| at - start >= WINDOW));
}
