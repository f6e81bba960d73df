//! Credential model: redacted secrets, the shared credential store, and refresh observers.

pub mod credentials;
pub mod observer;
pub mod secret;

pub use credentials::*;
pub use observer::RefreshObserver;
pub use secret::*;
