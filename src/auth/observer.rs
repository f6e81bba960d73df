//! Refresh observer type and the worker that delivers notifications off the refresh path.

// std
use std::{
	panic::{self, AssertUnwindSafe},
	sync::mpsc::{self, Sender},
	thread,
};
// self
use crate::{_prelude::*, oauth::TokenPair};

/// Callback invoked with `(new_access_token, new_refresh_token)` after every successful
/// refresh.
pub type RefreshObserver = Arc<dyn Fn(&str, &str) + Send + Sync>;

struct Notification {
	observer: RefreshObserver,
	tokens: TokenPair,
}
impl Notification {
	fn deliver(self) {
		let Self { observer, tokens } = self;

		// A panicking observer must not take the worker down with it.
		let _ = panic::catch_unwind(AssertUnwindSafe(|| {
			observer(tokens.access_token.expose(), tokens.refresh_token.expose())
		}));
	}
}

/// Hands refresh notifications to a single dedicated worker thread.
///
/// The worker is spawned on the first notification and exits once the notifier (and with
/// it the last client clone) is dropped. Notifications are delivered in refresh order.
#[derive(Default)]
pub(crate) struct RefreshNotifier {
	queue: Mutex<Option<Sender<Notification>>>,
}
impl RefreshNotifier {
	const WORKER_NAME: &'static str = "kick-client-refresh-observer";

	/// Queues `observer` to be called with `tokens`; never blocks on the observer itself.
	pub(crate) fn notify(&self, observer: RefreshObserver, tokens: TokenPair) {
		let mut queue = self.queue.lock();

		if queue.is_none() {
			*queue = Self::spawn_worker();
		}

		let Some(sender) = queue.as_ref() else {
			return;
		};

		if let Err(mpsc::SendError(notification)) = sender.send(Notification { observer, tokens })
		{
			// The worker is gone; restart it once and retry.
			*queue = Self::spawn_worker();

			if let Some(sender) = queue.as_ref() {
				let _ = sender.send(notification);
			}
		}
	}

	fn spawn_worker() -> Option<Sender<Notification>> {
		let (sender, receiver) = mpsc::channel::<Notification>();

		thread::Builder::new()
			.name(Self::WORKER_NAME.into())
			.spawn(move || {
				for notification in receiver {
					notification.deliver();
				}
			})
			.ok()?;

		Some(sender)
	}
}
impl Debug for RefreshNotifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshNotifier").field("running", &self.queue.lock().is_some()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{sync::mpsc::Receiver, time::Duration as StdDuration};
	// self
	use super::*;

	const WAIT: StdDuration = StdDuration::from_secs(5);

	fn recording_observer() -> (RefreshObserver, Receiver<(String, String)>) {
		let (sender, receiver) = mpsc::channel();
		let sender = Mutex::new(sender);
		let observer: RefreshObserver = Arc::new(move |access: &str, refresh: &str| {
			let _ = sender.lock().send((access.to_owned(), refresh.to_owned()));
		});

		(observer, receiver)
	}

	#[test]
	fn delivers_tokens_in_order() {
		let notifier = RefreshNotifier::default();
		let (observer, received) = recording_observer();

		notifier.notify(observer.clone(), TokenPair::new("access-1", "refresh-1"));
		notifier.notify(observer, TokenPair::new("access-2", "refresh-2"));

		assert_eq!(
			received.recv_timeout(WAIT).expect("First notification should arrive."),
			("access-1".into(), "refresh-1".into())
		);
		assert_eq!(
			received.recv_timeout(WAIT).expect("Second notification should arrive."),
			("access-2".into(), "refresh-2".into())
		);
	}

	#[test]
	fn notify_does_not_wait_for_observer() {
		let notifier = RefreshNotifier::default();
		let (release, gate) = mpsc::channel::<()>();
		let gate = Mutex::new(gate);
		let (done_sender, done) = mpsc::channel::<()>();
		let done_sender = Mutex::new(done_sender);
		let observer: RefreshObserver = Arc::new(move |_: &str, _: &str| {
			let _ = gate.lock().recv_timeout(WAIT);
			let _ = done_sender.lock().send(());
		});

		notifier.notify(observer, TokenPair::new("access", "refresh"));

		// The observer is still blocked on the gate, yet `notify` has already returned.
		assert!(done.try_recv().is_err());

		release.send(()).expect("Observer gate should still be open.");
		done.recv_timeout(WAIT).expect("Observer should finish once released.");
	}

	#[test]
	fn panicking_observer_keeps_worker_alive() {
		let notifier = RefreshNotifier::default();
		let panicking: RefreshObserver = Arc::new(|_: &str, _: &str| panic!("observer failure"));
		let (observer, received) = recording_observer();

		notifier.notify(panicking, TokenPair::new("access-1", "refresh-1"));
		notifier.notify(observer, TokenPair::new("access-2", "refresh-2"));

		assert_eq!(
			received.recv_timeout(WAIT).expect("Notification after a panic should arrive."),
			("access-2".into(), "refresh-2".into())
		);
	}
}
