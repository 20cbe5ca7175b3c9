//! Credential-shielding search proxy: caches a client-credentials access token, forwards keyword
//! searches to the upstream item API, and rewrites every result into a tracked affiliate URL.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]
// Unit tests may see the crate's own `test`-featured dev-dependency as an extra extern.
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub mod affiliate;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod redirect;
pub mod search;
pub mod server;
pub mod token;

mod oauth;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` feature, which the crate's own dev-dependency turns on.

	pub use crate::_prelude::*;

	// self
	use crate::{
		affiliate::AffiliateParams,
		http::ReqwestHttpClient,
		search::SearchProxy,
		token::{Clock, ClientCredentials, TokenManager},
	};

	/// Campaign identifier shared by the integration tests.
	pub const TEST_CAMPAIGN_ID: &str = "5338000000";
	/// OAuth scope requested by the integration tests.
	pub const TEST_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

	/// Manually driven clock so tests can move across token expiry without sleeping.
	#[derive(Debug)]
	pub struct ManualClock(Mutex<OffsetDateTime>);
	impl ManualClock {
		/// Starts the clock at the provided instant.
		pub fn new(start: OffsetDateTime) -> Self {
			Self(Mutex::new(start))
		}

		/// Moves the clock forward.
		pub fn advance(&self, by: Duration) {
			*self.0.lock() += by;
		}
	}
	impl Default for ManualClock {
		fn default() -> Self {
			Self::new(OffsetDateTime::now_utc())
		}
	}
	impl Clock for ManualClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.lock()
		}
	}

	/// Builds a token manager that talks to `token_url` and reads time from `clock`.
	pub fn build_test_token_manager(
		token_url: &str,
		clock: Arc<dyn Clock>,
	) -> Arc<TokenManager<ReqwestHttpClient>> {
		let token_url = Url::parse(token_url).expect("Mock token endpoint should parse.");
		let http_client = ReqwestHttpClient::with_timeout(std::time::Duration::from_secs(2))
			.expect("Failed to build reqwest client for tests.");
		let credentials = ClientCredentials::new("test-client", "test-secret");
		let manager = <TokenManager<ReqwestHttpClient>>::new(
			http_client,
			credentials,
			token_url,
			TEST_SCOPE,
		)
		.expect("Failed to build token manager for tests.");

		Arc::new(manager.with_clock(clock))
	}

	/// Builds a search proxy against mock token and search endpoints.
	pub fn build_test_search_proxy(
		token_url: &str,
		search_url: &str,
	) -> (SearchProxy<ReqwestHttpClient>, Arc<TokenManager<ReqwestHttpClient>>) {
		let tokens = build_test_token_manager(token_url, Arc::new(ManualClock::default()));
		let search_url = Url::parse(search_url).expect("Mock search endpoint should parse.");
		let http_client = ReqwestHttpClient::with_timeout(std::time::Duration::from_secs(2))
			.expect("Failed to build reqwest client for tests.");
		let proxy = SearchProxy::new(
			tokens.clone(),
			http_client,
			search_url,
			AffiliateParams::new(TEST_CAMPAIGN_ID),
		);

		(proxy, tokens)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _};
