//! Construction options for [`Client`].

// self
use crate::{
	_prelude::*,
	auth::{CredentialStore, Credentials, TokenSecret},
	client::Client,
	error::ConfigError,
	http::ApiHttpClient,
	oauth::{BasicTokenExchanger, TokenExchanger},
};

/// API host used when no API base URL is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://api.kick.com";
/// OAuth host used when no auth base URL is configured.
pub const DEFAULT_AUTH_BASE_URL: &str = "https://id.kick.com";

/// Builder collecting everything a [`Client`] needs.
///
/// Every option is optional. Unset base URLs fall back to [`DEFAULT_API_BASE_URL`] and
/// [`DEFAULT_AUTH_BASE_URL`], an unset transport to `C::default()`, and an unset exchanger to
/// a [`BasicTokenExchanger`] bound to the auth base URL and the configured client identity.
/// Empty strings are treated as unset.
pub struct ClientOptions<C>
where
	C: ?Sized + ApiHttpClient,
{
	app_access_token: Option<String>,
	user_access_token: Option<String>,
	user_refresh_token: Option<String>,
	http_client: Option<Arc<C>>,
	api_base_url: Option<String>,
	auth_base_url: Option<String>,
	client_id: Option<String>,
	client_secret: Option<String>,
	token_exchanger: Option<Arc<dyn TokenExchanger>>,
}
impl<C> ClientOptions<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Sets the application access token.
	pub fn app_access_token(mut self, token: impl Into<String>) -> Self {
		self.app_access_token = Some(token.into());

		self
	}

	/// Sets the user access token.
	pub fn user_access_token(mut self, token: impl Into<String>) -> Self {
		self.user_access_token = Some(token.into());

		self
	}

	/// Sets the user refresh token.
	pub fn user_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.user_refresh_token = Some(token.into());

		self
	}

	/// Sets the transport used for API requests and token exchanges.
	pub fn http_client(mut self, http_client: impl Into<Arc<C>>) -> Self {
		self.http_client = Some(http_client.into());

		self
	}

	/// Overrides the API base URL.
	pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
		self.api_base_url = Some(url.into());

		self
	}

	/// Overrides the OAuth base URL.
	pub fn auth_base_url(mut self, url: impl Into<String>) -> Self {
		self.auth_base_url = Some(url.into());

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Replaces the built-in OAuth exchanger.
	pub fn token_exchanger(mut self, exchanger: Arc<dyn TokenExchanger>) -> Self {
		self.token_exchanger = Some(exchanger);

		self
	}

	/// Validates the options and builds the client.
	pub fn build(self) -> Result<Client<C>>
	where
		C: Default,
	{
		let api_base_url = parse_base_url("api", self.api_base_url, DEFAULT_API_BASE_URL)?;
		let auth_base_url = parse_base_url("auth", self.auth_base_url, DEFAULT_AUTH_BASE_URL)?;
		let http_client = self.http_client.unwrap_or_default();
		let credentials = Credentials {
			app_access_token: self.app_access_token.and_then(TokenSecret::non_empty),
			user_access_token: self.user_access_token.and_then(TokenSecret::non_empty),
			user_refresh_token: self.user_refresh_token.and_then(TokenSecret::non_empty),
			client_id: self.client_id.filter(|id| !id.is_empty()),
			client_secret: self.client_secret.and_then(TokenSecret::non_empty),
		};
		let exchanger: Arc<dyn TokenExchanger> = match self.token_exchanger {
			Some(exchanger) => exchanger,
			None => Arc::new(BasicTokenExchanger::new(
				&auth_base_url,
				credentials.client_id.as_deref().unwrap_or_default(),
				credentials.client_secret.as_ref().map(TokenSecret::expose),
				http_client.clone(),
			)?),
		};

		Ok(Client {
			http_client,
			exchanger,
			credentials: Arc::new(CredentialStore::new(credentials)),
			notifier: Default::default(),
			metrics: Default::default(),
			api_base_url,
			auth_base_url,
		})
	}
}
impl<C> Default for ClientOptions<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn default() -> Self {
		Self {
			app_access_token: None,
			user_access_token: None,
			user_refresh_token: None,
			http_client: None,
			api_base_url: None,
			auth_base_url: None,
			client_id: None,
			client_secret: None,
			token_exchanger: None,
		}
	}
}
impl<C> Debug for ClientOptions<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientOptions")
			.field("api_base_url", &self.api_base_url)
			.field("auth_base_url", &self.auth_base_url)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("http_client_set", &self.http_client.is_some())
			.field("token_exchanger_set", &self.token_exchanger.is_some())
			.finish()
	}
}

fn parse_base_url(
	which: &'static str,
	value: Option<String>,
	default: &'static str,
) -> Result<Url, ConfigError> {
	let value = value.filter(|value| !value.is_empty()).unwrap_or_else(|| default.to_owned());

	Url::parse(&value).map_err(|source| ConfigError::InvalidBaseUrl { which, value, source })
}
