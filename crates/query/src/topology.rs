//! Reference-counted subscription to provider topology changes.
//!
//! A query only listens to the topology feed while somebody listens to the
//! query. The first holder subscribes, the last one to leave unsubscribes,
//! and everything in between leaves the subscription alone. Closing the
//! subscription (on cancel) unsubscribes regardless of holders and keeps it
//! down for good.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::provider::{SubscriptionId, TopologyNotifier, TopologyObserver};

#[derive(Debug, Default)]
struct SubscriptionState {
	holders: usize,
	active: Option<SubscriptionId>,
	closed: bool,
}

pub struct TopologySubscription {
	notifier: Arc<dyn TopologyNotifier>,
	observer: Weak<dyn TopologyObserver>,
	state: Mutex<SubscriptionState>,
}

impl TopologySubscription {
	pub fn new(notifier: Arc<dyn TopologyNotifier>, observer: Weak<dyn TopologyObserver>) -> Self {
		Self {
			notifier,
			observer,
			state: Mutex::new(SubscriptionState::default()),
		}
	}

	/// Adds a holder. Returns `true` when this call subscribed.
	pub fn acquire(&self) -> bool {
		let mut state = self.state.lock();
		state.holders += 1;
		if state.holders == 1 { self.activate_locked(&mut state) } else { false }
	}

	/// Drops a holder. Returns `true` when this call unsubscribed.
	pub fn release(&self) -> bool {
		let mut state = self.state.lock();
		if state.holders == 0 {
			warn!(closed = state.closed, "topology.release.underflow");
			return false;
		}
		state.holders -= 1;
		if state.holders == 0 { self.deactivate_locked(&mut state) } else { false }
	}

	/// Subscribes unless already subscribed or closed.
	pub fn activate(&self) -> bool {
		let mut state = self.state.lock();
		self.activate_locked(&mut state)
	}

	/// Unsubscribes if subscribed.
	pub fn deactivate(&self) -> bool {
		let mut state = self.state.lock();
		self.deactivate_locked(&mut state)
	}

	/// Unsubscribes and refuses every later activation. Returns `true` when
	/// this call unsubscribed.
	pub fn close(&self) -> bool {
		let mut state = self.state.lock();
		state.closed = true;
		self.deactivate_locked(&mut state)
	}

	pub fn is_active(&self) -> bool {
		self.state.lock().active.is_some()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	pub fn holders(&self) -> usize {
		self.state.lock().holders
	}

	fn activate_locked(&self, state: &mut SubscriptionState) -> bool {
		if state.closed || state.active.is_some() {
			return false;
		}
		let id = self.notifier.subscribe(self.observer.clone());
		debug!(subscription = id.0, holders = state.holders, "topology.subscribe");
		state.active = Some(id);
		true
	}

	fn deactivate_locked(&self, state: &mut SubscriptionState) -> bool {
		let Some(id) = state.active.take() else {
			return false;
		};
		self.notifier.unsubscribe(id);
		debug!(subscription = id.0, holders = state.holders, closed = state.closed, "topology.unsubscribe");
		true
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

	use super::*;
	use crate::provider::Provider;

	#[derive(Default)]
	struct CountingNotifier {
		next: AtomicU64,
		subscribes: AtomicUsize,
		unsubscribes: AtomicUsize,
	}

	impl TopologyNotifier for CountingNotifier {
		fn subscribe(&self, _observer: Weak<dyn TopologyObserver>) -> SubscriptionId {
			self.subscribes.fetch_add(1, Ordering::SeqCst);
			SubscriptionId(self.next.fetch_add(1, Ordering::SeqCst))
		}

		fn unsubscribe(&self, _id: SubscriptionId) {
			self.unsubscribes.fetch_add(1, Ordering::SeqCst);
		}
	}

	struct Inert;

	impl TopologyObserver for Inert {
		fn provider_added(&self, _provider: Provider) {}
		fn provider_removed(&self, _provider: Provider) {}
	}

	fn subscription() -> (Arc<CountingNotifier>, TopologySubscription) {
		let notifier = Arc::new(CountingNotifier::default());
		let observer: Weak<dyn TopologyObserver> = Weak::<Inert>::new();
		(notifier.clone(), TopologySubscription::new(notifier, observer))
	}

	#[test]
	fn only_edges_touch_the_notifier() {
		let (notifier, sub) = subscription();

		assert!(sub.acquire());
		assert!(!sub.acquire());
		assert!(!sub.acquire());
		assert!(!sub.release());
		assert!(!sub.acquire());
		assert!(!sub.release());
		assert!(!sub.release());
		assert_eq!(notifier.subscribes.load(Ordering::SeqCst), 1);
		assert_eq!(notifier.unsubscribes.load(Ordering::SeqCst), 0);
		assert!(sub.is_active());

		assert!(sub.release());
		assert!(!sub.is_active());
		assert_eq!(notifier.unsubscribes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn resubscribes_after_dropping_to_zero() {
		let (notifier, sub) = subscription();
		sub.acquire();
		sub.release();
		sub.acquire();
		assert_eq!(notifier.subscribes.load(Ordering::SeqCst), 2);
		assert_eq!(notifier.unsubscribes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn activate_and_deactivate_are_idempotent() {
		let (notifier, sub) = subscription();
		assert!(sub.activate());
		assert!(!sub.activate());
		assert!(sub.deactivate());
		assert!(!sub.deactivate());
		assert_eq!(notifier.subscribes.load(Ordering::SeqCst), 1);
		assert_eq!(notifier.unsubscribes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn underflow_is_ignored() {
		let (notifier, sub) = subscription();
		assert!(!sub.release());
		assert_eq!(sub.holders(), 0);
		assert!(sub.acquire());
		assert_eq!(notifier.subscribes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn close_forces_unsubscribe_once() {
		let (notifier, sub) = subscription();
		sub.acquire();
		sub.acquire();
		assert!(sub.close());
		assert!(!sub.close());
		assert!(sub.is_closed());
		assert_eq!(notifier.unsubscribes.load(Ordering::SeqCst), 1);

		sub.release();
		sub.release();
		sub.acquire();
		assert!(!sub.activate());
		assert_eq!(notifier.subscribes.load(Ordering::SeqCst), 1);
		assert_eq!(notifier.unsubscribes.load(Ordering::SeqCst), 1);
	}
}
