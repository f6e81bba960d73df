//! Always-on counters for transport sends and refresh cycles.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for transport sends and refresh cycles.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
	sends: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_failures: AtomicU64,
}
impl DispatchMetrics {
	/// Returns the number of physical transport sends, retries included.
	pub fn sends(&self) -> u64 {
		self.sends.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh cycles started.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh cycles that stored new tokens.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh cycles.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_send(&self) {
		self.sends.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}
}
