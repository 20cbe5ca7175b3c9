//! Observability helpers for upstream calls.
//!
//! - Every upstream call runs inside a `tracing` span named `affiliate_proxy.upstream` carrying
//!   the `call` and `stage` fields.
//! - Enable the `metrics` feature to increment the `affiliate_proxy_upstream_total` counter for
//!   every attempt/success/failure, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Upstream calls observed by the proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpstreamCall {
	/// Client-credentials exchange against the authorization endpoint.
	TokenExchange,
	/// Keyword search against the item-search endpoint.
	Search,
}
impl UpstreamCall {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			UpstreamCall::TokenExchange => "token_exchange",
			UpstreamCall::Search => "search",
		}
	}
}
impl Display for UpstreamCall {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Call dispatched.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
