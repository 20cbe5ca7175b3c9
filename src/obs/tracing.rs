// crates.io
use tracing::{Instrument, instrument::Instrumented};
use tracing_subscriber::{EnvFilter, fmt};
// self
use crate::{_prelude::*, obs::UpstreamCall};

/// A span builder used around upstream calls.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call + stage.
	pub fn new(call: UpstreamCall, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("affiliate_proxy.upstream", call = call.as_str(), stage) }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

/// Installs the global `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a subscriber was already installed.
pub fn init_logging() -> bool {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
