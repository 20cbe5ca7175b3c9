//! Proxy-level error types shared by the token manager, search proxy, and HTTP surface.

// self
use crate::_prelude::*;

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical proxy error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Upstream search call failed, including failures to acquire its access token.
	#[error(transparent)]
	Search(#[from] SearchError),

	/// Caller input was missing or malformed; never retried.
	#[error("{message}")]
	Validation {
		/// Human-readable reason returned to the caller.
		message: String,
	},
}
impl Error {
	/// Builds a [`Error::Validation`] from any message.
	pub fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}
}

/// Configuration and construction failures raised before serving traffic.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration sources could not be read or deserialized.
	#[error("Configuration could not be loaded.")]
	Load(#[from] Box<figment::Error>),
	/// A required secret is absent or blank.
	#[error("Required configuration `{key}` is missing.")]
	Missing {
		/// Environment key that must be provided.
		key: &'static str,
	},
	/// An endpoint URL cannot be parsed.
	#[error("Configuration `{key}` is not a valid URL.")]
	InvalidUrl {
		/// Environment key holding the bad URL.
		key: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A numeric setting is outside its supported range.
	#[error("Configuration `{key}` must be positive.")]
	NonPositive {
		/// Environment key holding the bad value.
		key: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Listener could not be bound or the server loop failed.
	#[error("HTTP listener failed.")]
	Bind(#[source] std::io::Error),
	/// The authorization endpoint could not be turned into an OAuth token URL.
	#[error("Token endpoint is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<figment::Error> for ConfigError {
	fn from(e: figment::Error) -> Self {
		Self::Load(Box::new(e))
	}
}

/// Token exchange failures. The cached token is never touched when one of these is raised.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Authorization endpoint answered with an error status or an OAuth error document.
	#[error("Token endpoint rejected the exchange with status {status:?}.")]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Upstream response body, when available.
		body: Option<String>,
	},
	/// Token endpoint responded with a body that is not a token document.
	#[error("Token endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Raw response body.
		body: String,
	},
	/// Token document is missing a usable lifetime.
	#[error("Token endpoint response has an unusable expires_in: {reason}.")]
	InvalidLifetime {
		/// What was wrong with the lifetime.
		reason: &'static str,
	},
	/// Request timed out before the authorization endpoint answered.
	#[error("Request timed out while calling the token endpoint.")]
	Timeout,
	/// Transport failure (DNS, TCP, TLS, request construction).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The in-flight exchange this call waited on failed; carries that failure's details.
	#[error("Concurrent token exchange failed: {message}")]
	Coalesced {
		/// HTTP status code of the shared failure, when available.
		status: Option<u16>,
		/// Upstream response body of the shared failure, when available.
		body: Option<String>,
		/// Rendered message of the shared failure.
		message: String,
	},
}
impl AuthError {
	/// Copies the details callers need into an [`AuthError::Coalesced`].
	pub fn coalesced(&self) -> Self {
		match self {
			Self::Coalesced { status, body, message } =>
				Self::Coalesced { status: *status, body: body.clone(), message: message.clone() },
			_ => Self::Coalesced {
				status: self.status(),
				body: self.body().map(ToOwned::to_owned),
				message: self.to_string(),
			},
		}
	}

	/// HTTP status returned by the authorization endpoint, if one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::Parse { status, .. }
			| Self::Coalesced { status, .. } => *status,
			_ => None,
		}
	}

	/// Upstream body to surface to callers, if one was received.
	pub fn body(&self) -> Option<&str> {
		match self {
			Self::Rejected { body, .. } | Self::Coalesced { body, .. } => body.as_deref(),
			Self::Parse { body, .. } => Some(body),
			_ => None,
		}
	}
}

/// Search call failures.
#[derive(Debug, ThisError)]
pub enum SearchError {
	/// No token could be acquired for the search call.
	#[error("Unable to acquire an access token for the search call.")]
	Auth(#[source] AuthError),
	/// Search endpoint answered with a non-success status.
	#[error("Search endpoint returned status {status}.")]
	Upstream {
		/// HTTP status code returned upstream.
		status: u16,
		/// Upstream response body.
		body: String,
	},
	/// Search endpoint answered 2xx with a body that is not a search document.
	#[error("Search endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code returned upstream.
		status: u16,
	},
	/// Request timed out before the search endpoint answered.
	#[error("Request timed out while calling the search endpoint.")]
	Timeout,
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl SearchError {
	/// Upstream HTTP status that should be propagated to the caller, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Auth(inner) => inner.status(),
			Self::Upstream { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Upstream detail payload: parsed JSON when the body is JSON, raw text otherwise.
	pub fn detail(&self) -> Option<serde_json::Value> {
		let body = match self {
			Self::Auth(inner) => inner.body(),
			Self::Upstream { body, .. } => Some(body.as_str()),
			_ => None,
		}?;

		if body.trim().is_empty() {
			return None;
		}

		Some(
			serde_json::from_str(body)
				.unwrap_or_else(|_| serde_json::Value::String(body.to_owned())),
		)
	}
}
impl From<AuthError> for SearchError {
	fn from(e: AuthError) -> Self {
		Self::Auth(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream API.")]
	Io(#[from] std::io::Error),
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn search_detail_prefers_json_bodies() {
		let err = SearchError::Upstream {
			status: 503,
			body: "{\"errors\":[{\"errorId\":11000}]}".into(),
		};

		assert_eq!(err.status(), Some(503));
		assert_eq!(
			err.detail().expect("JSON body should produce a detail payload.")["errors"][0]["errorId"],
			11000
		);

		let err = SearchError::Upstream { status: 502, body: "bad gateway".into() };

		assert_eq!(err.detail(), Some(serde_json::Value::String("bad gateway".into())));
	}

	#[test]
	fn coalesced_auth_errors_keep_status_and_body() {
		let original =
			AuthError::Rejected { status: Some(401), body: Some("{\"error\":\"invalid_client\"}".into()) };
		let shared = original.coalesced();

		assert_eq!(shared.status(), Some(401));
		assert_eq!(shared.body(), original.body());
		assert!(shared.to_string().contains(&original.to_string()));
		assert_eq!(AuthError::Timeout.coalesced().status(), None);
	}

	#[test]
	fn wrapped_auth_errors_keep_upstream_status() {
		let err = SearchError::from(AuthError::Rejected {
			status: Some(401),
			body: Some("{\"error\":\"invalid_client\"}".into()),
		});

		assert_eq!(err.status(), Some(401));
		assert_eq!(
			err.detail().expect("Auth body should be surfaced.")["error"],
			"invalid_client"
		);
		assert_eq!(SearchError::Timeout.status(), None);
		assert_eq!(SearchError::Timeout.detail(), None);
	}
}
