//! Result delivery to registered observers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::results::ResultEntry;
use crate::status::QueryStatus;

/// Observer of one query.
///
/// Callbacks run on whichever task produced the event: the scan worker,
/// an incremental task, or the thread that called `cancel`.
pub trait QueryListener: Send + Sync {
	/// An entry found by the initial scan.
	fn initial_result(&self, _entry: &Arc<ResultEntry>) {}

	/// An entry found after a provider appeared.
	fn result_received(&self, _entry: &Arc<ResultEntry>) {}

	/// A previously reported entry whose provider went away.
	fn result_removed(&self, _entry: &Arc<ResultEntry>) {}

	fn status_changed(&self, _status: QueryStatus) {}
}

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Whether an addition belongs to the initial bulk population or is a live
/// update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	Initial,
	Live,
}

impl Delivery {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Initial => "initial",
			Self::Live => "live",
		}
	}
}

/// Owned form of a listener callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
	Added { entry: Arc<ResultEntry>, initial: bool },
	Removed(Arc<ResultEntry>),
	StatusChanged(QueryStatus),
}

/// Sender for forwarded query events.
pub type QueryEventSender = mpsc::UnboundedSender<QueryEvent>;

/// Receiver for forwarded query events.
pub type QueryEventReceiver = mpsc::UnboundedReceiver<QueryEvent>;

/// Listener that turns callbacks into a [`QueryEvent`] stream.
#[derive(Debug, Clone)]
pub struct EventForwarder {
	tx: QueryEventSender,
}

impl EventForwarder {
	/// Creates a forwarder together with the receiving end of its stream.
	pub fn channel() -> (Arc<Self>, QueryEventReceiver) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Arc::new(Self { tx }), rx)
	}

	fn forward(&self, event: QueryEvent) {
		// A dropped receiver only means nobody is reading any more.
		let _ = self.tx.send(event);
	}
}

impl QueryListener for EventForwarder {
	fn initial_result(&self, entry: &Arc<ResultEntry>) {
		self.forward(QueryEvent::Added {
			entry: Arc::clone(entry),
			initial: true,
		});
	}

	fn result_received(&self, entry: &Arc<ResultEntry>) {
		self.forward(QueryEvent::Added {
			entry: Arc::clone(entry),
			initial: false,
		});
	}

	fn result_removed(&self, entry: &Arc<ResultEntry>) {
		self.forward(QueryEvent::Removed(Arc::clone(entry)));
	}

	fn status_changed(&self, status: QueryStatus) {
		self.forward(QueryEvent::StatusChanged(status));
	}
}

/// Registered listeners of one query, in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
	next_id: AtomicU64,
	listeners: Mutex<Vec<(ListenerId, Arc<dyn QueryListener>)>>,
}

impl ListenerSet {
	/// Registers a listener; returns its handle and the new count.
	pub fn add(&self, listener: Arc<dyn QueryListener>) -> (ListenerId, usize) {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let mut listeners = self.listeners.lock();
		listeners.push((id, listener));
		(id, listeners.len())
	}

	/// Unregisters a listener; returns the remaining count, or `None` for an
	/// unknown handle.
	pub fn remove(&self, id: ListenerId) -> Option<usize> {
		let mut listeners = self.listeners.lock();
		let index = listeners.iter().position(|(known, _)| *known == id)?;
		listeners.remove(index);
		Some(listeners.len())
	}

	pub fn len(&self) -> usize {
		self.listeners.lock().len()
	}

	pub fn added(&self, entry: &Arc<ResultEntry>, delivery: Delivery) {
		for listener in self.current() {
			match delivery {
				Delivery::Initial => listener.initial_result(entry),
				Delivery::Live => listener.result_received(entry),
			}
		}
	}

	pub fn removed(&self, entry: &Arc<ResultEntry>) {
		for listener in self.current() {
			listener.result_removed(entry);
		}
	}

	pub fn status_changed(&self, status: QueryStatus) {
		for listener in self.current() {
			listener.status_changed(status);
		}
	}

	/// Copies the listener list so callbacks run without the lock held.
	fn current(&self) -> Vec<Arc<dyn QueryListener>> {
		self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::QueryId;
	use crate::provider::{Candidate, Provider};

	fn entry(name: &str) -> Arc<ResultEntry> {
		Arc::new(ResultEntry::new(Candidate::named(name, Provider::new("p", "p")), QueryId(0)))
	}

	#[test]
	fn remove_unknown_is_none() {
		let set = ListenerSet::default();
		let (forwarder, _rx) = EventForwarder::channel();
		let (id, count) = set.add(forwarder);
		assert_eq!(count, 1);
		assert_eq!(set.remove(id), Some(0));
		assert_eq!(set.remove(id), None);
		assert_eq!(set.len(), 0);
	}

	#[test]
	fn handles_are_unique_per_registration() {
		let set = ListenerSet::default();
		let (forwarder, _rx) = EventForwarder::channel();
		let (a, _) = set.add(forwarder.clone());
		let (b, count) = set.add(forwarder);
		assert_ne!(a, b);
		assert_eq!(count, 2);
	}

	#[tokio::test]
	async fn forwarder_keeps_delivery_flag() {
		let set = ListenerSet::default();
		let (forwarder, mut rx) = EventForwarder::channel();
		set.add(forwarder);

		let a = entry("a");
		set.added(&a, Delivery::Initial);
		set.added(&entry("b"), Delivery::Live);
		set.removed(&a);
		set.status_changed(QueryStatus::Completed);

		assert!(matches!(rx.recv().await, Some(QueryEvent::Added { ref entry, initial: true }) if Arc::ptr_eq(entry, &a)));
		assert!(matches!(rx.recv().await, Some(QueryEvent::Added { ref entry, initial: false }) if entry.name == "b"));
		assert!(matches!(rx.recv().await, Some(QueryEvent::Removed(ref entry)) if Arc::ptr_eq(entry, &a)));
		assert_eq!(rx.recv().await, Some(QueryEvent::StatusChanged(QueryStatus::Completed)));
	}
}
