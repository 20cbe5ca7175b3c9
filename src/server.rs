//! HTTP surface: liveness, search, and affiliate redirect routes.

// std
use std::net::{Ipv4Addr, SocketAddr};
// crates.io
use axum::{
	Json, Router,
	extract::{Query, State},
	http::{StatusCode, header::LOCATION},
	response::{IntoResponse, Response},
	routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	affiliate::AffiliateParams,
	config::ProxyConfig,
	error::ConfigError,
	http::{ReqwestHttpClient, TokenHttpClient},
	redirect,
	search::{SearchProxy, SearchRequest},
	token::TokenManager,
};

/// Body served by the liveness route.
pub const LIVENESS_BODY: &str = "Affiliate search proxy is running.";

/// Shared handler state.
pub struct AppState<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	/// Search pipeline, including the shared token manager.
	pub search: Arc<SearchProxy<C>>,
}
impl<C> AppState<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Wraps a search proxy for use as router state.
	pub fn new(search: SearchProxy<C>) -> Self {
		Self { search: Arc::new(search) }
	}

	fn affiliate(&self) -> &AffiliateParams {
		self.search.affiliate()
	}
}
impl<C> Clone for AppState<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self { search: self.search.clone() }
	}
}
impl AppState<ReqwestHttpClient> {
	/// Wires the token manager and search proxy described by `config`.
	pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::with_timeout(config.timeout)?;
		let tokens = TokenManager::new(
			http_client.clone(),
			config.credentials.clone(),
			config.token_url.clone(),
			config.scope.clone(),
		)?;
		let search = SearchProxy::new(
			Arc::new(tokens),
			http_client,
			config.search_url.clone(),
			AffiliateParams::new(config.campaign_id.clone()),
		)
		.with_marketplace_id(config.marketplace_id.clone());

		Ok(Self::new(search))
	}
}

/// Query string accepted by `GET /search`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchParams {
	/// Keyword query.
	pub q: Option<String>,
	/// Requested page size; non-numeric values fall back to the default.
	pub limit: Option<String>,
	/// Optional sub-tracking id.
	pub customid: Option<String>,
}

/// Query string accepted by `GET /go`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RedirectParams {
	/// Percent-encoded item URL.
	pub url: Option<String>,
}

/// Builds the proxy router.
pub fn router<C>(state: AppState<C>) -> Router
where
	C: ?Sized + TokenHttpClient,
{
	Router::new()
		.route("/", get(liveness))
		.route("/search", get(search::<C>))
		.route("/go", get(go::<C>))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Binds `0.0.0.0:<port>` and serves until Ctrl-C.
pub async fn serve(config: ProxyConfig) -> Result<()> {
	let state = AppState::from_config(&config)?;
	let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
	let listener = TcpListener::bind(addr).await.map_err(ConfigError::Bind)?;

	tracing::info!(%addr, search_url = %config.search_url, "Affiliate proxy listening.");

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(ConfigError::Bind)?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
	}

	tracing::info!("Shutting down.");
}

async fn liveness() -> &'static str {
	LIVENESS_BODY
}

async fn search<C>(State(state): State<AppState<C>>, Query(params): Query<SearchParams>) -> Response
where
	C: ?Sized + TokenHttpClient,
{
	let limit = params.limit.as_deref().and_then(|raw| raw.trim().parse::<i64>().ok());
	let request = match SearchRequest::new(params.q.as_deref().unwrap_or_default(), limit) {
		Ok(request) => request.with_custom_id(params.customid),
		Err(e) => return e.into_response(),
	};

	match state.search.execute(request).await {
		Ok(results) => Json(results).into_response(),
		Err(e) => e.into_response(),
	}
}

async fn go<C>(State(state): State<AppState<C>>, Query(params): Query<RedirectParams>) -> Response
where
	C: ?Sized + TokenHttpClient,
{
	match redirect::resolve_redirect(state.affiliate(), params.url.as_deref()) {
		Ok(target) => (StatusCode::FOUND, [(LOCATION, target)]).into_response(),
		Err(e) => {
			tracing::warn!(error = %e, "Rejected redirect request.");

			(StatusCode::BAD_REQUEST, e.to_string()).into_response()
		},
	}
}

impl Error {
	/// Status code the HTTP surface answers with for this error.
	///
	/// Upstream failures reuse the upstream status when it is an error status.
	pub fn status_code(&self) -> StatusCode {
		let upstream = match self {
			Self::Validation { .. } => return StatusCode::BAD_REQUEST,
			Self::Config(_) => None,
			Self::Search(e) => e.status(),
		};

		upstream
			.filter(|status| (400..600).contains(status))
			.and_then(|status| StatusCode::from_u16(status).ok())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// Stable error kind tag used in response bodies.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Validation { .. } => "validation_error",
			Self::Config(_) => "config_error",
			Self::Search(_) => "search_error",
		}
	}
}
impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let detail = match &self {
			Self::Validation { message } => Some(serde_json::Value::String(message.clone())),
			Self::Search(e) => e.detail(),
			Self::Config(_) => None,
		};

		(self.status_code(), Json(json!({ "error": self.kind(), "detail": detail }))).into_response()
	}
}
