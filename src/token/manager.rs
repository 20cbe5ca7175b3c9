//! Token manager with a cached access token and single-flight refreshes.
//!
//! [`TokenManager::acquire_token`] hands out the cached token while more than the safety margin
//! of its lifetime remains, without I/O or suspension. Otherwise it takes the refresh guard,
//! re-checks the cache (another caller may have refreshed while this one waited), and only then
//! performs the client-credentials exchange. Concurrent callers on an expired token therefore
//! share one upstream call, whatever its outcome: callers that queued behind a failed exchange
//! receive that failure as [`AuthError::Coalesced`] instead of retrying one after another. A
//! failed exchange leaves the cache exactly as it was.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	error::{AuthError, ConfigError},
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::ClientCredentialsFacade,
	obs::{self, CallOutcome, CallSpan, UpstreamCall},
	token::{AccessToken, CachedToken, ClientCredentials, Clock, SystemClock},
};

/// Thread-safe counters for token exchanges performed by a [`TokenManager`].
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of exchanges sent to the authorization endpoint.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that produced a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}

struct FailedRefresh {
	generation: u64,
	error: AuthError,
}

/// Owns the process's single upstream access token.
///
/// One instance is built at startup and shared (behind `Arc`) with the search proxy.
pub struct TokenManager<C = ReqwestHttpClient>
where
	C: ?Sized + TokenHttpClient,
{
	/// Shared counters for exchange outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	facade: ClientCredentialsFacade<C>,
	client_id: String,
	scope: String,
	safety_margin: Duration,
	clock: Arc<dyn Clock>,
	cached: RwLock<Option<CachedToken>>,
	refresh_guard: AsyncMutex<()>,
	refresh_generation: AtomicU64,
	last_failure: Mutex<Option<FailedRefresh>>,
}
impl<C> TokenManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Remaining lifetime under which a cached token is treated as expired.
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(5);

	/// Creates a manager with an empty cache that exchanges `credentials` at `token_url`.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		credentials: ClientCredentials,
		token_url: Url,
		scope: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let facade = ClientCredentialsFacade::new(&credentials, &token_url, http_client.into())?;

		Ok(Self {
			refresh_metrics: Default::default(),
			facade,
			client_id: credentials.client_id,
			scope: scope.into(),
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			clock: Arc::new(SystemClock),
			cached: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			refresh_generation: AtomicU64::new(0),
			last_failure: Mutex::new(None),
		})
	}

	/// Replaces the time source used for expiry decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the safety margin (defaults to 5 seconds); negative values become zero.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Returns a valid access token, exchanging credentials only when the cache is empty or
	/// within the safety margin of expiry.
	pub async fn acquire_token(&self) -> Result<AccessToken, AuthError> {
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		const CALL: UpstreamCall = UpstreamCall::TokenExchange;

		let span = CallSpan::new(CALL, "acquire_token");
		let observed = self.refresh_generation.load(Ordering::Acquire);

		span.instrument(async move {
			let _singleflight = self.refresh_guard.lock().await;

			if let Some(token) = self.fresh_token() {
				tracing::debug!("Reusing token refreshed by a concurrent caller.");

				return Ok(token);
			}
			if let Some(err) = self.failure_since(observed) {
				tracing::debug!(error = %err, "Sharing the failure of a concurrent exchange.");

				return Err(err);
			}

			obs::record_call_outcome(CALL, CallOutcome::Attempt);
			self.refresh_metrics.record_attempt();

			match self.facade.exchange(&self.scope).await {
				Ok(issued) => {
					let cached =
						CachedToken::issued(issued.access_token, self.clock.now(), issued.expires_in);
					let token = cached.token.clone();

					*self.cached.write() = Some(cached);
					self.finish_refresh(None);

					tracing::info!(
						client_id = %self.client_id,
						expires_in = issued.expires_in.whole_seconds(),
						"Refreshed upstream access token."
					);
					obs::record_call_outcome(CALL, CallOutcome::Success);
					self.refresh_metrics.record_success();

					Ok(token)
				},
				Err(e) => {
					tracing::error!(
						client_id = %self.client_id,
						status = ?e.status(),
						error = %e,
						"Token exchange with the authorization endpoint failed."
					);
					obs::record_call_outcome(CALL, CallOutcome::Failure);
					self.refresh_metrics.record_failure();
					self.finish_refresh(Some(e.coalesced()));

					Err(e)
				},
			}
		})
		.await
	}

	/// Returns a snapshot of the cached token, fresh or not.
	pub fn cached(&self) -> Option<CachedToken> {
		self.cached.read().clone()
	}

	/// Drops the cached token so the next call performs an exchange.
	pub fn invalidate(&self) {
		*self.cached.write() = None;
	}

	// A failure is shared only with callers that started waiting before it was recorded.
	fn failure_since(&self, observed: u64) -> Option<AuthError> {
		let current = self.refresh_generation.load(Ordering::Acquire);

		if current == observed {
			return None;
		}

		self.last_failure
			.lock()
			.as_ref()
			.filter(|failure| failure.generation == current)
			.map(|failure| failure.error.coalesced())
	}

	fn finish_refresh(&self, failure: Option<AuthError>) {
		let generation = self.refresh_generation.fetch_add(1, Ordering::AcqRel) + 1;

		*self.last_failure.lock() = failure.map(|error| FailedRefresh { generation, error });
	}

	fn fresh_token(&self) -> Option<AccessToken> {
		let now = self.clock.now();

		self.cached
			.read()
			.as_ref()
			.filter(|cached| cached.is_fresh_at(now, self.safety_margin))
			.map(|cached| cached.token.clone())
	}
}
impl<C> Debug for TokenManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("safety_margin", &self.safety_margin)
			.field("cached", &self.cached.read().is_some())
			.finish()
	}
}
