//! Provider removals as seen by enumerations still in flight.
//!
//! An enumeration takes an [`Enumeration`] ticket before its provider is
//! asked for candidates. A removal of that provider while the ticket is
//! alive makes it stale, and a stale ticket admits nothing. Providers are
//! only tracked while at least one ticket for them is alive.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::provider::ProviderId;

#[derive(Debug, Default)]
struct Tracked {
	epoch: u64,
	in_flight: usize,
}

type Tracking = Arc<Mutex<HashMap<ProviderId, Tracked>>>;

#[derive(Debug, Default)]
pub(crate) struct DepartureLog {
	tracked: Tracking,
}

impl DepartureLog {
	/// Starts tracking one enumeration of `provider`.
	pub fn begin(&self, provider: &ProviderId) -> Enumeration {
		let mut tracked = self.tracked.lock();
		let entry = tracked.entry(provider.clone()).or_default();
		entry.in_flight += 1;
		Enumeration {
			tracked: Arc::clone(&self.tracked),
			provider: provider.clone(),
			epoch: entry.epoch,
		}
	}

	/// Records that `provider` went away. Returns whether any enumeration of
	/// it was in flight.
	pub fn depart(&self, provider: &ProviderId) -> bool {
		match self.tracked.lock().get_mut(provider) {
			Some(entry) => {
				entry.epoch += 1;
				true
			}
			None => false,
		}
	}

	/// Number of providers with enumerations in flight.
	#[cfg(test)]
	pub fn tracked(&self) -> usize {
		self.tracked.lock().len()
	}
}

/// Ticket for one in-flight enumeration.
#[derive(Debug)]
pub(crate) struct Enumeration {
	tracked: Tracking,
	provider: ProviderId,
	epoch: u64,
}

impl Enumeration {
	pub fn provider(&self) -> &ProviderId {
		&self.provider
	}

	/// False once the provider was removed after this ticket was taken.
	pub fn is_current(&self) -> bool {
		self.tracked
			.lock()
			.get(&self.provider)
			.is_some_and(|entry| entry.epoch == self.epoch)
	}
}

impl Drop for Enumeration {
	fn drop(&mut self) {
		let mut tracked = self.tracked.lock();
		let Some(entry) = tracked.get_mut(&self.provider) else {
			return;
		};
		entry.in_flight -= 1;
		if entry.in_flight == 0 {
			tracked.remove(&self.provider);
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn id(name: &str) -> ProviderId {
		ProviderId::new(name)
	}

	#[test]
	fn removal_makes_live_tickets_stale() {
		let log = DepartureLog::default();
		let before = log.begin(&id("p1"));
		let other = log.begin(&id("p2"));
		assert!(log.depart(&id("p1")));

		let after = log.begin(&id("p1"));
		assert!(!before.is_current());
		assert!(after.is_current());
		assert!(other.is_current());
		assert_eq!(before.provider(), &id("p1"));
	}

	#[test]
	fn removal_without_enumerations_is_not_tracked() {
		let log = DepartureLog::default();
		assert!(!log.depart(&id("p1")));
		assert_eq!(log.tracked(), 0);
		assert!(log.begin(&id("p1")).is_current());
	}

	#[test]
	fn providers_are_forgotten_once_idle() {
		let log = DepartureLog::default();
		let first = log.begin(&id("p1"));
		let second = log.begin(&id("p1"));
		log.depart(&id("p1"));
		assert_eq!(log.tracked(), 1);

		drop(first);
		assert_eq!(log.tracked(), 1);
		assert!(!second.is_current());
		drop(second);
		assert_eq!(log.tracked(), 0);
	}
}
