//! Client-level error types shared by the dispatcher, the refresher, and token exchangers.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used wherever a pluggable component surfaces its own failure type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// A `401 Unauthorized` response is never an error at this layer. It is returned to the
/// caller as a regular response when no refresh is possible or after the single refresh
/// cycle has already been spent.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while sending an API request.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The request body could not be buffered; nothing was sent.
	#[error("Failed to read request body.")]
	BodyRead {
		/// Underlying reader failure.
		#[source]
		source: std::io::Error,
	},
	/// The user token could not be refreshed; the stale `401` response was discarded.
	#[error("Failed to refresh token.")]
	Refresh(
		#[from]
		#[source]
		RefreshError,
	),
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A configured base URL cannot be parsed.
	#[error("The {which} base URL `{value}` is invalid.")]
	InvalidBaseUrl {
		/// Which base URL was rejected (`api` or `auth`).
		which: &'static str,
		/// Raw value supplied by the caller.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The token endpoint URL derived from the auth base URL is invalid.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// The selected bearer token cannot be carried in an HTTP header.
	#[error("Bearer token contains characters that are not valid in an HTTP header.")]
	InvalidBearerToken {
		/// Underlying header validation failure.
		#[source]
		source: oauth2::http::header::InvalidHeaderValue,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Failures of a single refresh cycle.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The token exchange call failed.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// No refresh token was available when the refresh started.
	#[error("No user refresh token is available.")]
	MissingRefreshToken,
	/// The buffered request body could not be rewound before the retry.
	#[error("Failed to reset request body.")]
	BodyRewind {
		/// Underlying seek failure.
		#[source]
		source: std::io::Error,
	},
}

/// Errors produced by a [`TokenExchanger`](crate::oauth::TokenExchanger).
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Provider rejected the refresh token.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Token endpoint returned an unexpected but possibly temporary response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Transport failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Failure reported by a custom exchanger.
	#[error("Token exchange failed.")]
	Other {
		/// Exchanger-specific failure.
		#[source]
		source: BoxError,
	},
}
impl ExchangeError {
	/// Wraps a custom exchanger failure.
	pub fn other(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Other { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;

	#[test]
	fn refresh_error_exposes_exchange_failure_as_source() {
		let err = Error::from(RefreshError::from(ExchangeError::InvalidGrant {
			reason: "refresh token expired".into(),
		}));

		assert_eq!(err.to_string(), "Failed to refresh token.");

		let source = err.source().expect("Refresh errors should expose their cause.");

		assert!(source.to_string().contains("refresh token expired"));
	}

	#[test]
	fn body_read_error_keeps_io_source() {
		let err = Error::BodyRead {
			source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream closed"),
		};
		let source = err.source().expect("Body read errors should expose the IO failure.");

		assert_eq!(source.to_string(), "stream closed");
	}
}
