//! Transport primitives for API requests and token exchanges.
//!
//! [`ApiHttpClient`] is the client's only dependency on an HTTP stack. The same
//! implementation sends API requests for the dispatcher and, through an internal
//! [`AsyncHttpClient`] adapter, token requests for the built-in OAuth exchanger, so a
//! custom transport only has to be written once. The adapter records the status of each
//! token response in a [`ResponseMetadataSlot`] so non-OAuth failures can still report it.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
// self
use crate::_prelude::*;

pub use oauth2::{
	HttpRequest, HttpResponse,
	http::{Method, Request, StatusCode, header},
};

/// Boxed future returned by [`ApiHttpClient::execute`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send + Sync>>;

/// Abstraction over HTTP transports capable of executing fully buffered requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// clone of a client, and the futures they return must be `Send + Sync` so dispatches can
/// run on any executor thread. A non-2xx status is a successful execution; only failures
/// to obtain a response at all belong in [`ApiHttpClient::TransportError`].
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and returns the complete response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Captures metadata from the most recent token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] adapter that lets `oauth2` drive an [`ApiHttpClient`].
pub(crate) struct ExchangeHandle<C>
where
	C: ?Sized + ApiHttpClient,
{
	client: Arc<C>,
	slot: ResponseMetadataSlot,
}
impl<C> ExchangeHandle<C>
where
	C: ?Sized + ApiHttpClient,
{
	pub(crate) fn new(client: Arc<C>, slot: ResponseMetadataSlot) -> Self {
		Self { client, slot }
	}
}
impl<'c, C> AsyncHttpClient<'c> for ExchangeHandle<C>
where
	C: ?Sized + ApiHttpClient,
{
	type Error = HttpClientError<C::TransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			// `oauth2` names this variant after reqwest, but it carries any transport error.
			let response = self.client.execute(request).await.map_err(Box::new)?;

			self.slot.store(ResponseMetadata { status: Some(response.status().as_u16()) });

			Ok(response)
		})
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are followed according to the wrapped client's policy; token requests made
/// through the built-in exchanger should not follow redirects, so configure a custom
/// [`ReqwestClient`] accordingly when the auth host is untrusted.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
