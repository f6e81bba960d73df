//! User token refresh: one exchange, one atomic credential update, one observer hand-off.
//!
//! The refresh token is snapshotted and the store lock released before the exchange, so
//! other callers can keep reading and writing credentials while the provider is contacted.
//! Nothing is written when the exchange fails.

// self
use crate::{
	_prelude::*,
	client::Client,
	error::RefreshError,
	http::ApiHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C> Client<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Exchanges the stored user refresh token for a new token pair.
	///
	/// On success both tokens are replaced in one critical section and the registered
	/// observer, if any, is queued on the observer worker; this call does not wait for it.
	/// There is no internal retry. Dropping the returned future abandons the exchange.
	pub async fn refresh_user_token(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_user_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_refresh_attempt();

		let result = span.instrument(self.exchange_and_store()).await;

		match &result {
			Ok(_) => {
				self.metrics.record_refresh_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => {
				self.metrics.record_refresh_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn exchange_and_store(&self) -> Result<()> {
		let refresh_token =
			self.credentials.user_refresh_token().ok_or(RefreshError::MissingRefreshToken)?;
		let tokens = self
			.exchanger
			.refresh_user_token(refresh_token.expose())
			.await
			.map_err(RefreshError::from)?;

		if let Some(observer) = self.credentials.apply_refresh(&tokens) {
			self.notifier.notify(observer, tokens);
		}

		Ok(())
	}
}
