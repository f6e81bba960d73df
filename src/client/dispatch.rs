//! Request dispatch with bearer selection and a single refresh-and-replay cycle.
//!
//! Each call moves through `INITIAL → SENT → (DONE | REFRESHING → SENT → DONE)`:
//!
//! 1. The body, if any, is buffered into a [`ReplayableBody`] exactly once.
//! 2. Before every send the bearer token is re-read from the credential store (user token
//!    first, then application token) and written to `Authorization`.
//! 3. A `401` triggers a refresh only when the store can refresh and this call has not
//!    refreshed yet; the body is rewound and the request sent once more.
//!
//! The refresh marker lives in the per-call [`RequestAttempt`], never in shared state, so
//! concurrent dispatches each get their own single retry.

// std
use std::io::{Cursor, Read, Seek, SeekFrom};
// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, Version, header::AUTHORIZATION,
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	client::Client,
	error::{ConfigError, RefreshError, TransportError},
	http::{ApiHttpClient, HttpRequest, HttpResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Request accepted by [`Client::dispatch`].
pub type ApiRequest = Request<RequestBody>;

/// Body of an [`ApiRequest`].
#[derive(Default)]
pub enum RequestBody {
	/// No body; nothing is buffered.
	#[default]
	Empty,
	/// Body already held in memory.
	Bytes(Vec<u8>),
	/// Body produced by a reader, drained once before the first send.
	///
	/// The reader is drained with blocking reads on the task that polls
	/// [`Client::dispatch`], so it should already hold its data in memory (a `Cursor`, a
	/// slice). Read files or sockets into [`RequestBody::Bytes`] first.
	Reader(Box<dyn Read + Send>),
}
impl RequestBody {
	/// Wraps a reader whose content becomes the request body.
	///
	/// See [`RequestBody::Reader`] for the blocking caveat.
	pub fn reader(reader: impl 'static + Read + Send) -> Self {
		Self::Reader(Box::new(reader))
	}
}
impl From<Vec<u8>> for RequestBody {
	fn from(bytes: Vec<u8>) -> Self {
		Self::Bytes(bytes)
	}
}
impl From<&'static [u8]> for RequestBody {
	fn from(bytes: &'static [u8]) -> Self {
		Self::Bytes(bytes.to_vec())
	}
}
impl From<String> for RequestBody {
	fn from(text: String) -> Self {
		Self::Bytes(text.into_bytes())
	}
}
impl From<&'static str> for RequestBody {
	fn from(text: &'static str) -> Self {
		Self::Bytes(text.as_bytes().to_vec())
	}
}
impl From<()> for RequestBody {
	fn from(_: ()) -> Self {
		Self::Empty
	}
}
impl Debug for RequestBody {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Empty => f.write_str("Empty"),
			Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
			Self::Reader(_) => f.write_str("Reader(..)"),
		}
	}
}

/// In-memory copy of a request body that can be replayed from the start.
#[derive(Clone, Debug)]
pub struct ReplayableBody(Cursor<Vec<u8>>);
impl ReplayableBody {
	/// Buffers `body`; returns `None` for [`RequestBody::Empty`] without touching anything.
	pub fn capture(body: RequestBody) -> std::io::Result<Option<Self>> {
		match body {
			RequestBody::Empty => Ok(None),
			RequestBody::Bytes(bytes) => Ok(Some(Self(Cursor::new(bytes)))),
			RequestBody::Reader(mut reader) => {
				let mut bytes = Vec::new();

				reader.read_to_end(&mut bytes)?;

				Ok(Some(Self(Cursor::new(bytes))))
			},
		}
	}

	/// Reads from the current position to the end.
	pub fn read_remaining(&mut self) -> std::io::Result<Vec<u8>> {
		let mut bytes = Vec::new();

		self.0.read_to_end(&mut bytes)?;

		Ok(bytes)
	}

	/// Moves the read position back to the start.
	pub fn rewind(&mut self) -> std::io::Result<()> {
		self.0.seek(SeekFrom::Start(0)).map(|_| ())
	}

	/// The full buffered content, independent of the read position.
	pub fn as_bytes(&self) -> &[u8] {
		self.0.get_ref()
	}
}

/// Per-call dispatch state, created when a dispatch starts and dropped when it returns.
#[derive(Debug)]
pub struct RequestAttempt {
	method: Method,
	uri: Uri,
	version: Version,
	headers: HeaderMap,
	body: Option<ReplayableBody>,
	refreshed: bool,
}
impl RequestAttempt {
	/// Splits `request` and buffers its body.
	pub fn capture(request: ApiRequest) -> Result<Self> {
		let (parts, body) = request.into_parts();
		let body = ReplayableBody::capture(body).map_err(|source| Error::BodyRead { source })?;

		Ok(Self {
			method: parts.method,
			uri: parts.uri,
			version: parts.version,
			headers: parts.headers,
			body,
			refreshed: false,
		})
	}

	/// Whether this call already spent its refresh.
	pub fn refreshed(&self) -> bool {
		self.refreshed
	}

	/// The buffered body, if the request had one.
	pub fn body(&self) -> Option<&ReplayableBody> {
		self.body.as_ref()
	}

	/// Builds the next physical request, replaying the body from its current position.
	///
	/// `bearer` overwrites any `Authorization` header; without a token the caller's
	/// headers are sent untouched.
	pub fn prepare(&mut self, bearer: Option<&TokenSecret>) -> Result<HttpRequest> {
		let body = match self.body.as_mut() {
			Some(body) => body.read_remaining().map_err(|source| Error::BodyRead { source })?,
			None => Vec::new(),
		};
		let mut request = HttpRequest::new(body);

		*request.method_mut() = self.method.clone();
		*request.uri_mut() = self.uri.clone();
		*request.version_mut() = self.version;
		*request.headers_mut() = self.headers.clone();

		if let Some(token) = bearer {
			let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
				.map_err(|source| ConfigError::InvalidBearerToken { source })?;

			value.set_sensitive(true);
			request.headers_mut().insert(AUTHORIZATION, value);
		}

		Ok(request)
	}

	fn mark_refreshed(&mut self) {
		self.refreshed = true;
	}

	fn rewind(&mut self) -> Result<(), RefreshError> {
		if let Some(body) = self.body.as_mut() {
			body.rewind().map_err(|source| RefreshError::BodyRewind { source })?;
		}

		Ok(())
	}
}

impl<C> Client<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Sends `request` with the current bearer token, refreshing and replaying it once on
	/// `401 Unauthorized`.
	///
	/// Any status, `401` included, is returned as a response: a `401` comes back unchanged
	/// when the client cannot refresh or when the replay is rejected as well. Errors are
	/// reserved for an unreadable body, transport failures, and failed refreshes; in the
	/// latter case the stale `401` is discarded.
	///
	/// A [`RequestBody::Reader`] body is read synchronously before the first send.
	pub async fn dispatch(&self, request: ApiRequest) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "dispatch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_with_refresh(request)).await;

		match &result {
			Ok(response) => {
				span.record_status(response.status().as_u16());
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send_with_refresh(&self, request: ApiRequest) -> Result<HttpResponse> {
		let mut attempt = RequestAttempt::capture(request)?;

		loop {
			let outgoing = attempt.prepare(self.credentials.bearer_token().as_ref())?;

			self.metrics.record_send();

			let response =
				self.http_client.execute(outgoing).await.map_err(TransportError::network)?;

			if response.status() != StatusCode::UNAUTHORIZED
				|| !self.credentials.can_refresh()
				|| attempt.refreshed()
			{
				return Ok(response);
			}

			drop(response);
			attempt.mark_refreshed();
			self.refresh_user_token().await?;
			attempt.rewind()?;
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::io::{Error as IoError, ErrorKind};
	// self
	use super::*;

	struct BrokenReader;
	impl Read for BrokenReader {
		fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
			Err(IoError::new(ErrorKind::ConnectionReset, "body stream reset"))
		}
	}

	fn request(body: RequestBody) -> ApiRequest {
		Request::builder()
			.method(Method::POST)
			.uri("https://api.kick.com/public/v1/chat")
			.header("content-type", "application/json")
			.body(body)
			.expect("Fixture request should build.")
	}

	#[test]
	fn empty_body_is_not_buffered() {
		let mut attempt =
			RequestAttempt::capture(request(RequestBody::Empty)).expect("Capture should succeed.");

		assert!(attempt.body().is_none());

		let outgoing = attempt.prepare(None).expect("Request should be prepared.");

		assert!(outgoing.body().is_empty());
	}

	#[test]
	fn reader_body_is_buffered_once_and_replayed_after_rewind() {
		let payload = b"{\"content\":\"hello\"}".to_vec();
		let mut attempt =
			RequestAttempt::capture(request(RequestBody::reader(Cursor::new(payload.clone()))))
				.expect("Capture should succeed.");
		let first = attempt.prepare(None).expect("First send should be prepared.");

		assert_eq!(first.body(), &payload);

		attempt.rewind().expect("Rewind should succeed.");

		let second = attempt.prepare(None).expect("Second send should be prepared.");

		assert_eq!(second.body(), first.body());
		assert_eq!(attempt.body().map(ReplayableBody::as_bytes), Some(payload.as_slice()));
	}

	#[test]
	fn unreadable_body_is_a_body_read_error() {
		let err = RequestAttempt::capture(request(RequestBody::reader(BrokenReader)))
			.expect_err("Broken readers should fail capture.");

		assert!(matches!(err, Error::BodyRead { .. }));
	}

	#[test]
	fn bearer_overwrites_existing_authorization() {
		let mut req = request(RequestBody::from("{}"));

		req.headers_mut().insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller"));

		let mut attempt = RequestAttempt::capture(req).expect("Capture should succeed.");
		let token = TokenSecret::new("user-token");
		let outgoing = attempt.prepare(Some(&token)).expect("Request should be prepared.");

		assert_eq!(
			outgoing.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Bearer user-token")
		);
		assert!(outgoing.headers().get(AUTHORIZATION).is_some_and(HeaderValue::is_sensitive));
		assert_eq!(outgoing.method(), &Method::POST);
		assert_eq!(outgoing.uri(), "https://api.kick.com/public/v1/chat");
		assert_eq!(
			outgoing.headers().get("content-type").and_then(|value| value.to_str().ok()),
			Some("application/json")
		);
	}

	#[test]
	fn missing_bearer_leaves_headers_untouched() {
		let mut attempt =
			RequestAttempt::capture(request(RequestBody::Empty)).expect("Capture should succeed.");
		let outgoing = attempt.prepare(None).expect("Request should be prepared.");

		assert!(outgoing.headers().get(AUTHORIZATION).is_none());
	}

	#[test]
	fn invalid_bearer_is_a_config_error() {
		let mut attempt =
			RequestAttempt::capture(request(RequestBody::Empty)).expect("Capture should succeed.");
		let token = TokenSecret::new("line\nbreak");
		let err = attempt.prepare(Some(&token)).expect_err("Control characters are invalid.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidBearerToken { .. })));
	}
}
