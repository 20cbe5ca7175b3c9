//! Search proxy: validate, authorize, forward, and rewrite upstream item summaries.

// crates.io
use reqwest::header::{ACCEPT, AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	affiliate::AffiliateParams,
	error::{SearchError, TransportError},
	http::{ReqwestHttpClient, TokenHttpClient},
	obs::{self, CallOutcome, CallSpan, UpstreamCall},
	token::TokenManager,
};

/// Header naming the upstream marketplace a search runs against.
pub const MARKETPLACE_HEADER: &str = "X-EBAY-C-MARKETPLACE-ID";

/// Normalized search parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
	/// Trimmed, non-empty keyword query.
	pub query: String,
	/// Effective result limit within [`SearchRequest::MIN_LIMIT`]..=[`SearchRequest::MAX_LIMIT`].
	pub limit: u32,
	/// Optional sub-tracking id forwarded into every affiliate URL.
	pub custom_id: Option<String>,
}
impl SearchRequest {
	/// Limit used when the caller does not supply one.
	pub const DEFAULT_LIMIT: u32 = 25;
	/// Upper bound accepted by the upstream search endpoint.
	pub const MAX_LIMIT: u32 = 100;
	/// Lower bound for the effective limit.
	pub const MIN_LIMIT: u32 = 1;

	/// Validates the query and clamps the limit. Fails before any upstream call is made.
	pub fn new(query: &str, limit: Option<i64>) -> Result<Self> {
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::validation("Missing search query parameter `q`."));
		}

		Ok(Self { query: query.to_owned(), limit: clamp_limit(limit), custom_id: None })
	}

	/// Attaches a custom id; blank values are ignored.
	pub fn with_custom_id(mut self, custom_id: Option<impl Into<String>>) -> Self {
		self.custom_id = custom_id.map(Into::into).filter(|value: &String| !value.trim().is_empty());

		self
	}
}

/// Clamps a requested limit into the supported range, defaulting when absent.
pub fn clamp_limit(limit: Option<i64>) -> u32 {
	match limit {
		None => SearchRequest::DEFAULT_LIMIT,
		Some(value) => value
			.clamp(i64::from(SearchRequest::MIN_LIMIT), i64::from(SearchRequest::MAX_LIMIT))
			as u32,
	}
}

/// Item price as reported upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
	/// Decimal amount as a string, e.g. `"19.99"`.
	pub value: String,
	/// ISO 4217 currency code.
	pub currency: String,
}

/// Item image reference as reported upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
	/// Absolute image URL.
	pub image_url: Option<String>,
}

/// Upstream item summary (read-only input).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
	/// Upstream item identifier.
	pub item_id: Option<String>,
	/// Listing title.
	pub title: Option<String>,
	/// Listing price.
	pub price: Option<Price>,
	/// Listing image.
	pub image: Option<Image>,
	/// Canonical item detail-page URL.
	pub item_web_url: Option<String>,
}

/// Upstream search document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSearchResponse {
	/// Total matches reported upstream.
	pub total: Option<u64>,
	/// Returned page of item summaries.
	#[serde(default)]
	pub item_summaries: Vec<ItemSummary>,
}

/// Item summary returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedItemSummary {
	/// Upstream item identifier.
	pub item_id: Option<String>,
	/// Listing title.
	pub title: Option<String>,
	/// Listing price.
	pub price: Option<Price>,
	/// Image URL.
	pub image: Option<String>,
	/// Canonical item detail-page URL.
	pub item_web_url: Option<String>,
	/// Tracked affiliate URL; `None` only when `item_web_url` is absent or unusable.
	pub affiliate_url: Option<String>,
}
impl EnrichedItemSummary {
	/// Copies pass-through fields and derives the affiliate URL.
	pub fn enrich(item: ItemSummary, affiliate: &AffiliateParams, custom_id: Option<&str>) -> Self {
		let affiliate_url = item.item_web_url.as_deref().and_then(|url| {
			affiliate
				.build_affiliate_url(url, custom_id)
				.inspect_err(|e| {
					tracing::warn!(item_id = ?item.item_id, error = %e, "Skipping affiliate URL.")
				})
				.ok()
		});

		Self {
			item_id: item.item_id,
			title: item.title,
			price: item.price,
			image: item.image.and_then(|image| image.image_url),
			item_web_url: item.item_web_url,
			affiliate_url,
		}
	}
}

/// Combined payload returned by [`SearchProxy::search`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
	/// Upstream total, or the number of returned items when upstream omits it.
	pub total: u64,
	/// Enriched items in upstream order.
	pub items: Vec<EnrichedItemSummary>,
}
impl SearchResults {
	/// Builds the caller-facing payload from an upstream document.
	pub fn from_upstream(
		response: UpstreamSearchResponse,
		affiliate: &AffiliateParams,
		custom_id: Option<&str>,
	) -> Self {
		let items = response
			.item_summaries
			.into_iter()
			.map(|item| EnrichedItemSummary::enrich(item, affiliate, custom_id))
			.collect::<Vec<_>>();
		let total = response.total.unwrap_or(items.len() as u64);

		Self { total, items }
	}
}

/// Forwards searches upstream using tokens from a shared [`TokenManager`].
pub struct SearchProxy<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	tokens: Arc<TokenManager<C>>,
	http_client: ReqwestHttpClient,
	endpoint: Url,
	affiliate: AffiliateParams,
	marketplace_id: Option<String>,
}
impl<C> SearchProxy<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a proxy for the search endpoint at `endpoint`.
	pub fn new(
		tokens: Arc<TokenManager<C>>,
		http_client: ReqwestHttpClient,
		endpoint: Url,
		affiliate: AffiliateParams,
	) -> Self {
		Self { tokens, http_client, endpoint, affiliate, marketplace_id: None }
	}

	/// Sends the marketplace header with every search.
	pub fn with_marketplace_id(mut self, marketplace_id: Option<String>) -> Self {
		self.marketplace_id = marketplace_id;

		self
	}

	/// Affiliate parameters used to rewrite results.
	pub fn affiliate(&self) -> &AffiliateParams {
		&self.affiliate
	}

	/// Validates `query`, clamps `limit`, and runs the search.
	pub async fn search(&self, query: &str, limit: Option<i64>) -> Result<SearchResults> {
		self.execute(SearchRequest::new(query, limit)?).await
	}

	/// Runs an already-validated search.
	pub async fn execute(&self, request: SearchRequest) -> Result<SearchResults> {
		const CALL: UpstreamCall = UpstreamCall::Search;

		let span = CallSpan::new(CALL, "search");
		let result = span
			.instrument(async {
				let token = self.tokens.acquire_token().await.map_err(SearchError::from)?;

				obs::record_call_outcome(CALL, CallOutcome::Attempt);

				let upstream = self.call_upstream(&request, token.expose()).await?;

				Ok::<_, SearchError>(SearchResults::from_upstream(
					upstream,
					&self.affiliate,
					request.custom_id.as_deref(),
				))
			})
			.await;

		match result {
			Ok(results) => {
				tracing::info!(
					query = %request.query,
					limit = request.limit,
					total = results.total,
					returned = results.items.len(),
					"Search completed."
				);
				obs::record_call_outcome(CALL, CallOutcome::Success);

				Ok(results)
			},
			Err(e) => {
				tracing::error!(
					query = %request.query,
					status = ?e.status(),
					error = %e,
					"Search call failed."
				);
				obs::record_call_outcome(CALL, CallOutcome::Failure);

				Err(e.into())
			},
		}
	}

	async fn call_upstream(
		&self,
		request: &SearchRequest,
		bearer: &str,
	) -> Result<UpstreamSearchResponse, SearchError> {
		let limit = request.limit.to_string();
		let mut builder = self
			.http_client
			.get(self.endpoint.clone())
			.header(AUTHORIZATION, format!("Bearer {bearer}"))
			.header(ACCEPT, "application/json")
			.query(&[("q", request.query.as_str()), ("limit", limit.as_str())]);

		if let Some(marketplace_id) = &self.marketplace_id {
			builder = builder.header(MARKETPLACE_HEADER, marketplace_id);
		}

		let response = builder.send().await.map_err(map_reqwest_error)?;
		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(map_reqwest_error)?;

		if !(200..300).contains(&status) {
			return Err(SearchError::Upstream {
				status,
				body: String::from_utf8_lossy(&body).into_owned(),
			});
		}

		let deserializer = &mut serde_json::Deserializer::from_slice(&body);

		serde_path_to_error::deserialize(deserializer)
			.map_err(|source| SearchError::Parse { source, status })
	}
}
impl<C> Debug for SearchProxy<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SearchProxy")
			.field("endpoint", &self.endpoint.as_str())
			.field("campaign_id", &self.affiliate.campaign_id())
			.field("marketplace_id", &self.marketplace_id)
			.finish()
	}
}

fn map_reqwest_error(err: ReqwestError) -> SearchError {
	if err.is_timeout() { SearchError::Timeout } else { TransportError::from(err).into() }
}
