// crates.io
use httpmock::prelude::*;
// self
use affiliate_proxy::{
	_preludet::*,
	error::SearchError,
	search::{MARKETPLACE_HEADER, SearchRequest},
};

const TOKEN_BODY: &str = "{\"access_token\":\"search-token\",\"token_type\":\"Application Access Token\",\"expires_in\":7200}";
const SEARCH_BODY: &str = r#"{
	"total": 1234,
	"itemSummaries": [
		{
			"itemId": "v1|110|0",
			"title": "Ceramic brake pads",
			"price": { "value": "42.50", "currency": "USD" },
			"image": { "imageUrl": "https://i.test/110.jpg" },
			"itemWebUrl": "https://www.ebay.com/itm/110?hash=abc"
		},
		{
			"itemId": "v1|111|0",
			"title": "Listing without a page",
			"itemWebUrl": null
		}
	]
}"#;

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await
}

#[tokio::test]
async fn search_forwards_bearer_and_enriches_items() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token(&server).await;
	let search_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/search")
				.header("authorization", "Bearer search-token")
				.query_param("q", "brakes")
				.query_param("limit", "100");
			then.status(200).header("content-type", "application/json").body(SEARCH_BODY);
		})
		.await;
	let (proxy, _tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let results =
		proxy.search("  brakes ", Some(500)).await.expect("Search against mocks should succeed.");

	assert_eq!(results.total, 1234);
	assert_eq!(results.items.len(), 2);

	let first = &results.items[0];

	assert_eq!(first.item_id.as_deref(), Some("v1|110|0"));
	assert_eq!(first.image.as_deref(), Some("https://i.test/110.jpg"));
	assert_eq!(
		first.affiliate_url.as_deref(),
		Some(
			"https://www.ebay.com/itm/110?hash=abc&mkevt=1&mkcid=1&campid=5338000000&toolid=10001"
		)
	);
	assert_eq!(results.items[1].affiliate_url, None);

	// A second search reuses the cached token.
	proxy.search("brakes", Some(100)).await.expect("Second search should succeed.");

	token_mock.assert_calls_async(1).await;
	search_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn default_limit_and_custom_id_are_applied() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token(&server).await;
	let search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("q", "rotors").query_param("limit", "25");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"itemSummaries\":[{\"itemId\":\"a\",\"itemWebUrl\":\"https://x.test/i/a\"}]}");
		})
		.await;
	let (proxy, _tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let request = SearchRequest::new("rotors", None)
		.expect("Query should be valid.")
		.with_custom_id(Some("newsletter 7"));
	let results = proxy.execute(request).await.expect("Search should succeed.");

	assert_eq!(results.total, 1);
	assert_eq!(
		results.items[0].affiliate_url.as_deref(),
		Some(
			"https://x.test/i/a?mkevt=1&mkcid=1&campid=5338000000&toolid=10001&customid=newsletter%207"
		)
	);

	search_mock.assert_async().await;
}

#[tokio::test]
async fn blank_query_fails_before_any_upstream_call() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token(&server).await;
	let (proxy, _tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let err = proxy.search("   ", Some(10)).await.expect_err("Blank query should be rejected.");

	assert!(matches!(err, Error::Validation { .. }));

	token_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn upstream_error_status_and_body_are_propagated() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token(&server).await;
	let search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search");
			then.status(503)
				.header("content-type", "application/json")
				.body("{\"errors\":[{\"errorId\":11000,\"message\":\"unavailable\"}]}");
		})
		.await;
	let (proxy, _tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let err = proxy.search("brakes", None).await.expect_err("Upstream 503 should surface.");
	let Error::Search(search_err) = err else {
		panic!("Expected a search error.");
	};

	assert_eq!(search_err.status(), Some(503));
	assert_eq!(
		search_err.detail().expect("Upstream body should be kept.")["errors"][0]["errorId"],
		11000
	);

	search_mock.assert_async().await;
}

#[tokio::test]
async fn token_rejection_becomes_search_error() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search");
			then.status(200).body(SEARCH_BODY);
		})
		.await;
	let (proxy, tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let err = proxy.search("brakes", None).await.expect_err("Token failure should surface.");

	assert!(matches!(err, Error::Search(SearchError::Auth(_))));
	assert!(matches!(&err, Error::Search(e) if e.status() == Some(401)));
	assert!(tokens.cached().is_none());

	token_mock.assert_async().await;
	search_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn malformed_search_body_is_a_parse_error() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token(&server).await;
	let _search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search");
			then.status(200).header("content-type", "application/json").body("{\"total\":\"many\"}");
		})
		.await;
	let (proxy, _tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let err = proxy.search("brakes", None).await.expect_err("Malformed body should fail.");

	assert!(matches!(err, Error::Search(SearchError::Parse { status: 200, .. })));
}

#[tokio::test]
async fn marketplace_header_is_sent_when_configured() {
	let server = MockServer::start_async().await;
	let _token_mock = mock_token(&server).await;
	let search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").header(MARKETPLACE_HEADER, "EBAY_DE");
			then.status(200).header("content-type", "application/json").body("{\"total\":0}");
		})
		.await;
	let (proxy, _tokens) = build_test_search_proxy(&server.url("/token"), &server.url("/search"));
	let proxy = proxy.with_marketplace_id(Some("EBAY_DE".into()));
	let results = proxy.search("brakes", None).await.expect("Search should succeed.");

	assert_eq!(results.total, 0);
	assert!(results.items.is_empty());

	search_mock.assert_async().await;
}
