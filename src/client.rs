//! Authenticated API client wiring the credential store, refresher, and dispatcher together.

pub mod dispatch;
pub mod options;

mod metrics;
mod refresh;

pub use dispatch::*;
pub use metrics::DispatchMetrics;
pub use options::*;

// self
use crate::{
	_prelude::*,
	auth::{CredentialStore, Credentials, RefreshObserver, observer::RefreshNotifier},
	http::ApiHttpClient,
	oauth::TokenExchanger,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = Client<ReqwestHttpClient>;

/// Authenticated client for one API host and its OAuth host.
///
/// Cloning is cheap and every clone shares the same credentials, transport, exchanger, and
/// observer worker, so one logical client can serve any number of concurrent callers.
/// Credentials are read on every send attempt; updating them through the setters affects
/// every dispatch that attaches its header afterwards.
pub struct Client<C>
where
	C: ?Sized + ApiHttpClient,
{
	http_client: Arc<C>,
	exchanger: Arc<dyn TokenExchanger>,
	credentials: Arc<CredentialStore>,
	notifier: Arc<RefreshNotifier>,
	metrics: Arc<DispatchMetrics>,
	api_base_url: Url,
	auth_base_url: Url,
}
impl<C> Client<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Starts a [`ClientOptions`] builder for this transport type.
	pub fn builder() -> ClientOptions<C> {
		ClientOptions::default()
	}

	/// Replaces the application access token; an empty string clears it.
	pub fn set_app_access_token(&self, token: impl Into<String>) {
		self.credentials.set_app_access_token(token);
	}

	/// Replaces the user access token; an empty string clears it.
	pub fn set_user_access_token(&self, token: impl Into<String>) {
		self.credentials.set_user_access_token(token);
	}

	/// Replaces the user refresh token; an empty string clears it.
	pub fn set_user_refresh_token(&self, token: impl Into<String>) {
		self.credentials.set_user_refresh_token(token);
	}

	/// Registers the callback fired after every successful user token refresh.
	///
	/// Only one callback is kept; registering another replaces it. The callback runs on a
	/// dedicated worker thread, so it must not assume it runs inside an async runtime.
	pub fn on_user_access_token_refreshed<F>(&self, observer: F)
	where
		F: 'static + Fn(&str, &str) + Send + Sync,
	{
		let observer: RefreshObserver = Arc::new(observer);

		self.credentials.set_refresh_observer(observer);
	}

	/// Removes the refresh callback, if any.
	pub fn clear_refresh_observer(&self) {
		self.credentials.clear_refresh_observer();
	}

	/// Whether a `401` would currently trigger a refresh.
	pub fn can_refresh_user_token(&self) -> bool {
		self.credentials.can_refresh()
	}

	/// Returns a snapshot of the current credentials.
	pub fn credentials(&self) -> Credentials {
		self.credentials.snapshot()
	}

	/// Effective API base URL.
	pub fn api_base_url(&self) -> &Url {
		&self.api_base_url
	}

	/// Effective OAuth base URL.
	pub fn auth_base_url(&self) -> &Url {
		&self.auth_base_url
	}

	/// Transport shared by API requests and token exchanges.
	pub fn http_client(&self) -> &Arc<C> {
		&self.http_client
	}

	/// Counters for sends and refresh cycles performed by this client and its clones.
	pub fn metrics(&self) -> &DispatchMetrics {
		&self.metrics
	}
}
impl<C> Clone for Client<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			exchanger: self.exchanger.clone(),
			credentials: self.credentials.clone(),
			notifier: self.notifier.clone(),
			metrics: self.metrics.clone(),
			api_base_url: self.api_base_url.clone(),
			auth_base_url: self.auth_base_url.clone(),
		}
	}
}
impl<C> Debug for Client<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("api_base_url", &self.api_base_url.as_str())
			.field("auth_base_url", &self.auth_base_url.as_str())
			.field("credentials", &self.credentials)
			.field("notifier", &self.notifier)
			.finish()
	}
}
