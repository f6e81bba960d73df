//! Token exchange contract and the built-in OAuth 2.0 refresh exchanger.
//!
//! The refresher depends only on [`TokenExchanger`]. [`BasicTokenExchanger`] is the
//! default implementation: it posts a `grant_type=refresh_token` request to
//! `{auth_base_url}/oauth/token` with the client credentials in the request body, using
//! the client's own [`ApiHttpClient`] as transport.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, ExchangeError, TransportError},
	http::{ApiHttpClient, ExchangeHandle, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`TokenExchanger::refresh_user_token`].
pub type ExchangeFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TokenPair, ExchangeError>> + 'a + Send>>;

/// Exchanges a user refresh token for a new access/refresh token pair.
///
/// Implementations perform exactly one exchange per call and never retry internally;
/// the dispatcher owns the retry policy of the outer request.
pub trait TokenExchanger
where
	Self: Send + Sync,
{
	/// Redeems `refresh_token` at the provider.
	fn refresh_user_token<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a>;
}

/// Tokens returned by a successful exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Newly issued user access token.
	pub access_token: TokenSecret,
	/// Refresh token to use for the next exchange.
	pub refresh_token: TokenSecret,
	/// Lifetime of the access token, when the provider reports one.
	pub expires_in: Option<Duration>,
}
impl TokenPair {
	/// Creates a pair without lifetime information.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_in: None,
		}
	}

	/// Sets the access token lifetime.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_in = Some(expires_in);

		self
	}
}

/// Default [`TokenExchanger`] backed by the `oauth2` crate.
pub struct BasicTokenExchanger<C>
where
	C: ?Sized + ApiHttpClient,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
}
impl<C> BasicTokenExchanger<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Token endpoint path relative to the auth base URL.
	pub const TOKEN_PATH: &'static str = "oauth/token";

	/// Builds an exchanger that talks to `{auth_base_url}/oauth/token`.
	pub fn new(
		auth_base_url: &Url,
		client_id: &str,
		client_secret: Option<&str>,
		http_client: Arc<C>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(format!(
			"{}/{}",
			auth_base_url.as_str().trim_end_matches('/'),
			Self::TOKEN_PATH
		))
		.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}

		Ok(Self { oauth_client, http_client })
	}

	/// Returns the token endpoint this exchanger posts to.
	pub fn token_endpoint(&self) -> &str {
		self.oauth_client.token_uri().as_str()
	}
}
impl<C> TokenExchanger for BasicTokenExchanger<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn refresh_user_token<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = ExchangeHandle::new(self.http_client.clone(), meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&handle)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;
			// Providers may keep the refresh token stable and omit it from the response.
			let rotated = response
				.refresh_token()
				.map(|token| token.secret().to_owned())
				.unwrap_or_else(|| refresh_token.to_owned());
			let mut tokens = TokenPair::new(response.access_token().secret().to_owned(), rotated);

			if let Some(expires_in) = response.expires_in() {
				tokens.expires_in = Duration::try_from(expires_in).ok();
			}

			Ok(tokens)
		})
	}
}
impl<C> Debug for BasicTokenExchanger<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicTokenExchanger").field("token_endpoint", &self.token_endpoint()).finish()
	}
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> ExchangeError
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, status),
		RequestTokenError::Request(error) => map_transport_error(error, status),
		RequestTokenError::Parse(source, _body) => ExchangeError::TokenResponseParse { source },
		RequestTokenError::Other(message) => ExchangeError::TokenEndpoint { message, status },
	}
}

fn map_server_response_error(response: BasicErrorResponse, status: Option<u16>) -> ExchangeError {
	let message = match response.error_description() {
		Some(description) => description.clone(),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidGrant => ExchangeError::InvalidGrant { reason: message },
		BasicErrorResponseType::InvalidClient | BasicErrorResponseType::UnauthorizedClient =>
			ExchangeError::InvalidClient { reason: message },
		_ => ExchangeError::TokenEndpoint { message, status },
	}
}

fn map_transport_error<E>(err: HttpClientError<E>, status: Option<u16>) -> ExchangeError
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::Network { source: inner }.into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => ExchangeError::TokenEndpoint { message, status },
		_ => ExchangeError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		},
	}
}
