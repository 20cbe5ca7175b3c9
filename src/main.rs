//! Binary entry point: load configuration, install logging, serve.

// std
use std::process::ExitCode;
// self
use affiliate_proxy::{config::ProxyConfig, obs, server};

#[tokio::main]
async fn main() -> ExitCode {
	obs::init_logging();

	let config = match ProxyConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			tracing::error!(error = %e, "Refusing to start without a complete configuration.");

			return ExitCode::FAILURE;
		},
	};

	match server::serve(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "Proxy stopped with an error.");

			ExitCode::FAILURE
		},
	}
}
