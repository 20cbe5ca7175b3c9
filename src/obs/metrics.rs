// self
use crate::obs::{CallOutcome, UpstreamCall};

/// Counter incremented once per upstream call stage.
pub const UPSTREAM_CALLS_METRIC: &str = "affiliate_proxy_upstream_total";

/// Bumps [`UPSTREAM_CALLS_METRIC`] for `call` and `outcome`.
///
/// Without the `metrics` feature this compiles to nothing.
pub fn record_call_outcome(call: UpstreamCall, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(UPSTREAM_CALLS_METRIC, "call" => call.as_str(), "outcome" => outcome.as_str())
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (call, outcome);
}
