//! Client-credentials exchange built on the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	error::{AuthError, ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	token::{AccessToken, ClientCredentials},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token minted by a successful exchange, before it is stamped with an expiry instant.
#[derive(Debug)]
pub(crate) struct IssuedToken {
	pub(crate) access_token: AccessToken,
	pub(crate) expires_in: Duration,
}

pub(crate) struct ClientCredentialsFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
}
impl<C> ClientCredentialsFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	pub(crate) fn new(
		credentials: &ClientCredentials,
		token_url: &Url,
		http_client: Arc<C>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(token_url.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let oauth_client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::BasicAuth)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client })
	}

	/// Runs `grant_type=client_credentials` with HTTP Basic client authentication.
	pub(crate) async fn exchange(&self, scope: &str) -> Result<IssuedToken, AuthError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let mut request = self.oauth_client.exchange_client_credentials();

		for value in scope.split_whitespace() {
			request = request.add_scope(Scope::new(value.to_owned()));
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error::<C>(meta.take(), err))?;

		map_token_response(response)
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<IssuedToken, AuthError> {
	let expires_in = response
		.expires_in()
		.ok_or(AuthError::InvalidLifetime { reason: "missing" })?
		.as_secs();
	let expires_in =
		i64::try_from(expires_in).map_err(|_| AuthError::InvalidLifetime { reason: "too large" })?;

	if expires_in <= 0 {
		return Err(AuthError::InvalidLifetime { reason: "not positive" });
	}

	Ok(IssuedToken {
		access_token: AccessToken::new(response.access_token().secret().to_owned()),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_request_error<C>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
) -> AuthError
where
	C: ?Sized + TokenHttpClient,
{
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(status, &response),
		RequestTokenError::Request(error) => map_transport_error::<C>(error),
		RequestTokenError::Parse(source, body) => AuthError::Parse {
			source,
			status,
			body: String::from_utf8_lossy(&body).into_owned(),
		},
		RequestTokenError::Other(message) => AuthError::Rejected { status, body: Some(message) },
	}
}

fn map_server_response_error(status: Option<u16>, response: &BasicErrorResponse) -> AuthError {
	let body = serde_json::to_string(response).ok();

	AuthError::Rejected { status, body }
}

fn map_transport_error<C>(err: HttpClientError<C::TransportError>) -> AuthError
where
	C: ?Sized + TokenHttpClient,
{
	match err {
		HttpClientError::Reqwest(inner) if C::is_timeout(&inner) => AuthError::Timeout,
		HttpClientError::Reqwest(inner) => TransportError::Network { source: inner }.into(),
		HttpClientError::Http(inner) => TransportError::HttpRequest(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => AuthError::Rejected { status: None, body: Some(message) },
		_ => AuthError::Rejected { status: None, body: None },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::ReqwestHttpClient;

	#[test]
	fn builds_basic_auth_facade() {
		let credentials = ClientCredentials::new("client-id", "secret");
		let token_url = Url::parse("https://api.ebay.com/identity/v1/oauth2/token")
			.expect("Failed to parse token endpoint URL.");
		let result = <ClientCredentialsFacade<ReqwestHttpClient>>::new(
			&credentials,
			&token_url,
			Arc::new(
				ReqwestHttpClient::with_timeout(ReqwestHttpClient::DEFAULT_TIMEOUT)
					.expect("Failed to build reqwest client."),
			),
		);

		assert!(result.is_ok());
	}

	#[test]
	fn server_response_errors_keep_status_and_body() {
		let response: BasicErrorResponse =
			serde_json::from_str("{\"error\":\"invalid_client\",\"error_description\":\"nope\"}")
				.expect("Failed to parse OAuth error document.");
		let err = map_server_response_error(Some(401), &response);

		assert_eq!(err.status(), Some(401));
		assert!(err.body().is_some_and(|body| body.contains("invalid_client")));
	}
}
