// crates.io
use httpmock::prelude::*;
// self
use affiliate_proxy::{
	_preludet::*,
	error::AuthError,
	token::{AccessToken, Clock},
};

const BASIC_AUTH: &str = "Basic dGVzdC1jbGllbnQ6dGVzdC1zZWNyZXQ=";

fn token_body(token: &str, expires_in: i64) -> String {
	format!(
		"{{\"access_token\":\"{token}\",\"token_type\":\"Application Access Token\",\"expires_in\":{expires_in}}}"
	)
}

#[tokio::test]
async fn acquire_token_caches_after_success() {
	let server = MockServer::start_async().await;
	let clock = Arc::new(ManualClock::default());
	let tokens = build_test_token_manager(&server.url("/token"), clock.clone());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("authorization", BASIC_AUTH)
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("cached-token", 7200));
		})
		.await;
	let first = tokens.acquire_token().await.expect("Initial exchange should succeed.");
	let second = tokens.acquire_token().await.expect("Cached token should be returned.");

	assert_eq!(first.expose(), "cached-token");
	assert_eq!(first, second);

	mock.assert_calls_async(1).await;

	let cached = tokens.cached().expect("Cache should hold the issued token.");

	assert_eq!(cached.expires_at, clock.now() + Duration::seconds(7200));
	assert_eq!(tokens.refresh_metrics.attempts(), 1);
	assert_eq!(tokens.refresh_metrics.successes(), 1);
}

#[tokio::test]
async fn acquire_token_refreshes_once_after_expiry() {
	let server = MockServer::start_async().await;
	let clock = Arc::new(ManualClock::default());
	let tokens = build_test_token_manager(&server.url("/token"), clock.clone());
	let first_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("first-token", 60));
		})
		.await;
	let first = tokens.acquire_token().await.expect("Initial exchange should succeed.");
	let first_expiry = tokens.cached().expect("Cache should be populated.").expires_at;

	// Still outside the 5 second safety margin.
	clock.advance(Duration::seconds(54));

	let reused = tokens.acquire_token().await.expect("Token should still be fresh.");

	assert_eq!(reused, first);

	first_mock.assert_calls_async(1).await;
	first_mock.delete_async().await;

	let second_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("second-token", 7200));
		})
		.await;

	clock.advance(Duration::seconds(10));

	let refreshed = tokens.acquire_token().await.expect("Expired token should be refreshed.");
	let again = tokens.acquire_token().await.expect("Refreshed token should be cached.");

	assert_eq!(refreshed.expose(), "second-token");
	assert_eq!(again, refreshed);

	second_mock.assert_calls_async(1).await;

	let cached = tokens.cached().expect("Cache should hold the refreshed token.");

	assert_eq!(cached.expires_at, clock.now() + Duration::seconds(7200));
	assert!(cached.expires_at > first_expiry);
}

#[tokio::test]
async fn token_inside_safety_margin_is_refreshed() {
	let server = MockServer::start_async().await;
	let clock = Arc::new(ManualClock::default());
	let tokens = build_test_token_manager(&server.url("/token"), clock.clone());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("margin-token", 60));
		})
		.await;

	tokens.acquire_token().await.expect("Initial exchange should succeed.");
	clock.advance(Duration::seconds(56));
	tokens.acquire_token().await.expect("Refresh inside the margin should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let server = MockServer::start_async().await;
	let tokens = build_test_token_manager(&server.url("/token"), Arc::new(ManualClock::default()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(200))
				.body(token_body("shared-token", 900));
		})
		.await;
	let (first, second, third): (
		Result<AccessToken, AuthError>,
		Result<AccessToken, AuthError>,
		Result<AccessToken, AuthError>,
	) = tokio::join!(tokens.acquire_token(), tokens.acquire_token(), tokens.acquire_token());

	for token in [first, second, third] {
		assert_eq!(token.expect("Concurrent call should succeed.").expose(), "shared-token");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_callers_share_one_failed_refresh() {
	let server = MockServer::start_async().await;
	let tokens = build_test_token_manager(&server.url("/token"), Arc::new(ManualClock::default()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(300))
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let started = std::time::Instant::now();
	let (first, second, third) =
		tokio::join!(tokens.acquire_token(), tokens.acquire_token(), tokens.acquire_token());
	let elapsed = started.elapsed();
	let errors = [first, second, third]
		.map(|result| result.expect_err("Every caller should observe the rejection."));

	assert!(errors.iter().all(|err| err.status() == Some(401)));
	assert_eq!(errors.iter().filter(|err| matches!(err, AuthError::Coalesced { .. })).count(), 2);
	assert!(elapsed < std::time::Duration::from_millis(900), "took {elapsed:?}");
	assert_eq!(tokens.refresh_metrics.attempts(), 1);

	mock.assert_calls_async(1).await;

	// A caller arriving after the failure retries instead of reusing it.
	let err = tokens.acquire_token().await.expect_err("Retry should hit the endpoint again.");

	assert!(matches!(err, AuthError::Rejected { status: Some(401), .. }));

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn failed_refresh_leaves_cache_untouched() {
	let server = MockServer::start_async().await;
	let clock = Arc::new(ManualClock::default());
	let tokens = build_test_token_manager(&server.url("/token"), clock.clone());
	let ok_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("stale-token", 60));
		})
		.await;

	tokens.acquire_token().await.expect("Initial exchange should succeed.");

	let before = tokens.cached().expect("Cache should be populated.");

	ok_mock.delete_async().await;

	let failing_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\",\"error_description\":\"client authentication failed\"}");
		})
		.await;

	clock.advance(Duration::seconds(120));

	let err = tokens.acquire_token().await.expect_err("Rejected exchange should surface.");

	assert!(matches!(err, AuthError::Rejected { status: Some(401), .. }));
	assert!(err.body().is_some_and(|body| body.contains("invalid_client")));
	assert_eq!(tokens.cached(), Some(before));
	assert_eq!(tokens.refresh_metrics.failures(), 1);

	failing_mock.assert_async().await;
}

#[tokio::test]
async fn malformed_token_document_is_an_auth_error() {
	let server = MockServer::start_async().await;
	let tokens = build_test_token_manager(&server.url("/token"), Arc::new(ManualClock::default()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body("{\"unexpected\":true}");
		})
		.await;
	let err = tokens.acquire_token().await.expect_err("Malformed body should fail.");

	assert!(matches!(err, AuthError::Parse { status: Some(200), .. }));
	assert!(tokens.cached().is_none());

	mock.assert_async().await;
}

#[tokio::test]
async fn missing_lifetime_is_rejected() {
	let server = MockServer::start_async().await;
	let tokens = build_test_token_manager(&server.url("/token"), Arc::new(ManualClock::default()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"no-expiry\",\"token_type\":\"bearer\"}");
		})
		.await;
	let err = tokens.acquire_token().await.expect_err("Token without lifetime should fail.");

	assert!(matches!(err, AuthError::InvalidLifetime { .. }));
	assert!(tokens.cached().is_none());

	mock.assert_async().await;
}

#[tokio::test]
async fn slow_authorization_endpoint_times_out() {
	let server = MockServer::start_async().await;
	let tokens = build_test_token_manager(&server.url("/token"), Arc::new(ManualClock::default()));
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_secs(3))
				.body(token_body("late-token", 900));
		})
		.await;
	let err = tokens.acquire_token().await.expect_err("Slow exchange should time out.");

	assert!(matches!(err, AuthError::Timeout));
	assert!(tokens.cached().is_none());
}

#[tokio::test]
async fn invalidate_forces_next_exchange() {
	let server = MockServer::start_async().await;
	let tokens = build_test_token_manager(&server.url("/token"), Arc::new(ManualClock::default()));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("fresh-token", 900));
		})
		.await;

	tokens.acquire_token().await.expect("Initial exchange should succeed.");
	tokens.invalidate();

	assert!(tokens.cached().is_none());

	tokens.acquire_token().await.expect("Exchange after invalidation should succeed.");

	mock.assert_calls_async(2).await;
}
