//! Mutex-guarded credential store shared by every clone of a client.
//!
//! Every read and write of a credential field or of the observer slot goes through the
//! same lock, so a reader never observes a half-applied refresh. The lock is never held
//! across an `.await`; callers take snapshots and release it before any network call.

// self
use crate::{
	_prelude::*,
	auth::{RefreshObserver, TokenSecret},
	oauth::TokenPair,
};

/// Credentials attached to outgoing requests and consumed by the refresh cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
	/// Token representing the application itself.
	pub app_access_token: Option<TokenSecret>,
	/// Short-lived token representing the end user.
	pub user_access_token: Option<TokenSecret>,
	/// Long-lived token used to mint new user access tokens.
	pub user_refresh_token: Option<TokenSecret>,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<TokenSecret>,
}
impl Credentials {
	/// Returns the token to send as `Authorization: Bearer`.
	///
	/// The user token wins whenever it is present; the application token is only used when
	/// no user token is set.
	pub fn bearer_token(&self) -> Option<&TokenSecret> {
		present(&self.user_access_token).or_else(|| present(&self.app_access_token))
	}

	/// Whether a `401` is worth a refresh: client id, client secret, and user refresh token
	/// must all be non-empty.
	pub fn can_refresh(&self) -> bool {
		self.client_id.as_deref().is_some_and(|id| !id.is_empty())
			&& present(&self.client_secret).is_some()
			&& present(&self.user_refresh_token).is_some()
	}
}

fn present(secret: &Option<TokenSecret>) -> Option<&TokenSecret> {
	secret.as_ref().filter(|value| !value.expose().is_empty())
}

#[derive(Default)]
struct StoreState {
	credentials: Credentials,
	observer: Option<RefreshObserver>,
}

/// Exclusive-access container for [`Credentials`] and the single refresh observer slot.
#[derive(Default)]
pub struct CredentialStore(Mutex<StoreState>);
impl CredentialStore {
	/// Creates a store seeded with `credentials` and no observer.
	pub fn new(credentials: Credentials) -> Self {
		Self(Mutex::new(StoreState { credentials, observer: None }))
	}

	/// Replaces the application token; an empty string clears it.
	pub fn set_app_access_token(&self, token: impl Into<String>) {
		self.0.lock().credentials.app_access_token = TokenSecret::non_empty(token);
	}

	/// Replaces the user access token; an empty string clears it.
	pub fn set_user_access_token(&self, token: impl Into<String>) {
		self.0.lock().credentials.user_access_token = TokenSecret::non_empty(token);
	}

	/// Replaces the user refresh token; an empty string clears it.
	pub fn set_user_refresh_token(&self, token: impl Into<String>) {
		self.0.lock().credentials.user_refresh_token = TokenSecret::non_empty(token);
	}

	/// Replaces the refresh observer. The previous observer, if any, is dropped.
	pub fn set_refresh_observer(&self, observer: RefreshObserver) {
		self.0.lock().observer = Some(observer);
	}

	/// Removes the refresh observer.
	pub fn clear_refresh_observer(&self) {
		self.0.lock().observer = None;
	}

	/// See [`Credentials::can_refresh`].
	pub fn can_refresh(&self) -> bool {
		self.0.lock().credentials.can_refresh()
	}

	/// See [`Credentials::bearer_token`].
	pub fn bearer_token(&self) -> Option<TokenSecret> {
		self.0.lock().credentials.bearer_token().cloned()
	}

	/// Returns the current user refresh token, if any.
	pub fn user_refresh_token(&self) -> Option<TokenSecret> {
		present(&self.0.lock().credentials.user_refresh_token).cloned()
	}

	/// Returns a consistent copy of every credential field.
	pub fn snapshot(&self) -> Credentials {
		self.0.lock().credentials.clone()
	}

	/// Stores a freshly exchanged token pair and returns the observer registered at that
	/// moment, both within one critical section.
	pub fn apply_refresh(&self, tokens: &TokenPair) -> Option<RefreshObserver> {
		let mut state = self.0.lock();

		state.credentials.user_access_token = TokenSecret::non_empty(tokens.access_token.expose());
		state.credentials.user_refresh_token =
			TokenSecret::non_empty(tokens.refresh_token.expose());

		state.observer.clone()
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.0.lock();

		f.debug_struct("CredentialStore")
			.field("credentials", &state.credentials)
			.field("observer_set", &state.observer.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::thread;
	// self
	use super::*;

	fn refreshable() -> Credentials {
		Credentials {
			user_refresh_token: TokenSecret::non_empty("refresh"),
			client_id: Some("client".into()),
			client_secret: TokenSecret::non_empty("secret"),
			..Default::default()
		}
	}

	#[test]
	fn user_token_takes_precedence_over_app_token() {
		let store = CredentialStore::default();

		assert!(store.bearer_token().is_none());

		store.set_app_access_token("app");

		assert_eq!(store.bearer_token().as_ref().map(TokenSecret::expose), Some("app"));

		store.set_user_access_token("user");

		assert_eq!(store.bearer_token().as_ref().map(TokenSecret::expose), Some("user"));

		store.set_user_access_token("");

		assert_eq!(store.bearer_token().as_ref().map(TokenSecret::expose), Some("app"));
	}

	#[test]
	fn empty_fields_written_directly_are_ignored() {
		let credentials = Credentials {
			app_access_token: Some(TokenSecret::new("app")),
			user_access_token: Some(TokenSecret::new("")),
			..refreshable()
		};

		assert_eq!(credentials.bearer_token().map(TokenSecret::expose), Some("app"));
		assert!(credentials.can_refresh());
		assert!(
			!Credentials { client_secret: Some(TokenSecret::new("")), ..refreshable() }
				.can_refresh()
		);
	}

	#[test]
	fn can_refresh_requires_client_identity_and_refresh_token() {
		assert!(CredentialStore::new(refreshable()).can_refresh());
		assert!(
			!CredentialStore::new(Credentials { client_id: None, ..refreshable() }).can_refresh()
		);
		assert!(
			!CredentialStore::new(Credentials { client_id: Some(String::new()), ..refreshable() })
				.can_refresh()
		);
		assert!(
			!CredentialStore::new(Credentials { client_secret: None, ..refreshable() }).can_refresh()
		);

		let store = CredentialStore::new(refreshable());

		store.set_user_refresh_token("");

		assert!(!store.can_refresh());
	}

	#[test]
	fn apply_refresh_returns_latest_observer() {
		let store = CredentialStore::new(refreshable());
		let tokens = TokenPair::new("access-1", "refresh-1");

		assert!(store.apply_refresh(&tokens).is_none());

		let first: RefreshObserver = Arc::new(|_: &str, _: &str| {});
		let second: RefreshObserver = Arc::new(|_: &str, _: &str| {});

		store.set_refresh_observer(first);
		store.set_refresh_observer(second.clone());

		let observer =
			store.apply_refresh(&tokens).expect("Registered observer should be returned.");

		assert!(Arc::ptr_eq(&observer, &second));

		let snapshot = store.snapshot();

		assert_eq!(snapshot.user_access_token.as_ref().map(TokenSecret::expose), Some("access-1"));
		assert_eq!(
			snapshot.user_refresh_token.as_ref().map(TokenSecret::expose),
			Some("refresh-1")
		);

		store.clear_refresh_observer();

		assert!(store.apply_refresh(&tokens).is_none());
	}

	#[test]
	fn readers_never_observe_half_applied_refresh() {
		let store = Arc::new(CredentialStore::new(refreshable()));

		store.apply_refresh(&TokenPair::new("access-0", "refresh-0"));

		let writer = {
			let store = store.clone();

			thread::spawn(move || {
				for i in 1..=2_000 {
					let tokens = TokenPair::new(format!("access-{i}"), format!("refresh-{i}"));

					store.apply_refresh(&tokens);
				}
			})
		};

		for _ in 0..2_000 {
			let snapshot = store.snapshot();
			let access = snapshot.user_access_token.expect("Access token should stay populated.");
			let refresh =
				snapshot.user_refresh_token.expect("Refresh token should stay populated.");

			assert_eq!(
				access.expose().trim_start_matches("access-"),
				refresh.expose().trim_start_matches("refresh-")
			);
		}

		writer.join().expect("Writer thread should not panic.");
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let store = CredentialStore::new(refreshable());

		store.set_user_access_token("very-secret-access");

		let rendered = format!("{store:?}");

		assert!(!rendered.contains("very-secret-access"));
		assert!(rendered.contains("observer_set: false"));
	}
}
