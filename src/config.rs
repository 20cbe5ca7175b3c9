//! Process configuration, read once at startup from the environment.
//!
//! | Variable              | Required | Default                                               |
//! |-----------------------|----------|-------------------------------------------------------|
//! | `EBAY_CLIENT_ID`      | yes      |                                                       |
//! | `EBAY_CLIENT_SECRET`  | yes      |                                                       |
//! | `EBAY_CAMPAIGN_ID`    | yes      |                                                       |
//! | `PORT`                | no       | `3000`                                                |
//! | `EBAY_TOKEN_URL`      | no       | `https://api.ebay.com/identity/v1/oauth2/token`       |
//! | `EBAY_SEARCH_URL`     | no       | `https://api.ebay.com/buy/browse/v1/item_summary/search` |
//! | `EBAY_SCOPE`          | no       | `https://api.ebay.com/oauth/api_scope`                |
//! | `EBAY_MARKETPLACE_ID` | no       | unset                                                 |
//! | `EBAY_TIMEOUT_SECS`   | no       | `10`                                                  |

// std
use std::collections::BTreeMap;
// crates.io
use figment::{
	Figment,
	providers::{Env, Serialized},
};
// self
use crate::{_prelude::*, error::ConfigError, token::ClientCredentials};

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";
/// Default keyword search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";
/// Default OAuth scope for application tokens.
pub const DEFAULT_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default per-call upstream timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Prefix shared by every proxy variable except `PORT`.
pub const ENV_PREFIX: &str = "EBAY_";
/// Keys read verbatim from the environment.
///
/// figment's `Env` provider parses values as TOML-like literals, which would turn
/// `0053380000` into `53380000` and `1.5e3` into a float. These keys skip that parsing.
pub const TEXT_KEYS: [&str; 7] =
	["client_id", "client_secret", "campaign_id", "marketplace_id", "scope", "token_url", "search_url"];

/// Unvalidated settings as they come out of the environment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<String>,
	/// Affiliate campaign identifier.
	pub campaign_id: Option<String>,
	/// Listen port.
	pub port: Option<u16>,
	/// Token endpoint override.
	pub token_url: Option<String>,
	/// Search endpoint override.
	pub search_url: Option<String>,
	/// OAuth scope override.
	pub scope: Option<String>,
	/// Marketplace header value.
	pub marketplace_id: Option<String>,
	/// Per-call upstream timeout in seconds.
	pub timeout_secs: Option<u64>,
}
impl RawConfig {
	/// Checks required secrets and parses endpoints.
	pub fn validate(self) -> Result<ProxyConfig, ConfigError> {
		let client_id = required(self.client_id, "EBAY_CLIENT_ID")?;
		let client_secret = required(self.client_secret, "EBAY_CLIENT_SECRET")?;
		let campaign_id = required(self.campaign_id, "EBAY_CAMPAIGN_ID")?;
		let token_url = parse_url(self.token_url, DEFAULT_TOKEN_URL, "EBAY_TOKEN_URL")?;
		let search_url = parse_url(self.search_url, DEFAULT_SEARCH_URL, "EBAY_SEARCH_URL")?;
		let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

		if timeout_secs == 0 {
			return Err(ConfigError::NonPositive { key: "EBAY_TIMEOUT_SECS" });
		}

		Ok(ProxyConfig {
			credentials: ClientCredentials::new(client_id, client_secret),
			campaign_id,
			port: self.port.unwrap_or(DEFAULT_PORT),
			token_url,
			search_url,
			scope: non_blank(self.scope).unwrap_or_else(|| DEFAULT_SCOPE.into()),
			marketplace_id: non_blank(self.marketplace_id),
			timeout: std::time::Duration::from_secs(timeout_secs),
		})
	}
}

/// Validated configuration handed to the core at construction time.
#[derive(Clone, Debug)]
pub struct ProxyConfig {
	/// Client id + secret for the client-credentials grant.
	pub credentials: ClientCredentials,
	/// Affiliate campaign identifier.
	pub campaign_id: String,
	/// Listen port.
	pub port: u16,
	/// OAuth token endpoint.
	pub token_url: Url,
	/// Keyword search endpoint.
	pub search_url: Url,
	/// Space-delimited OAuth scope.
	pub scope: String,
	/// Optional marketplace header value.
	pub marketplace_id: Option<String>,
	/// Per-call upstream timeout.
	pub timeout: std::time::Duration,
}
impl ProxyConfig {
	/// Reads `EBAY_*` variables and `PORT` from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_figment(
			Figment::new()
				.merge(Env::prefixed(ENV_PREFIX).ignore(&TEXT_KEYS))
				.merge(Env::raw().only(&["port"]))
				.merge(Serialized::defaults(verbatim_text_env())),
		)
	}

	/// Extracts and validates configuration from any figment.
	pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
		figment.extract::<RawConfig>()?.validate()
	}
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
	non_blank(value).ok_or(ConfigError::Missing { key })
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn parse_url(value: Option<String>, default: &str, key: &'static str) -> Result<Url, ConfigError> {
	let raw = non_blank(value);

	Url::parse(raw.as_deref().unwrap_or(default))
		.map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn verbatim_text_env() -> BTreeMap<&'static str, String> {
	TEXT_KEYS
		.into_iter()
		.filter_map(|key| {
			let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());

			std::env::var(var).ok().map(|value| (key, value))
		})
		.collect()
}
