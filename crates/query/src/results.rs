//! Thread-safe store of the entries a query currently reports.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::QueryId;
use crate::provider::{Candidate, Provider, ProviderId};

/// A candidate that passed the matching policy and is retained by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
	pub name: String,
	pub id: String,
	pub provider: Provider,
	pub query: QueryId,
}

impl ResultEntry {
	pub fn new(candidate: Candidate, query: QueryId) -> Self {
		Self {
			name: candidate.name,
			id: candidate.id,
			provider: candidate.provider,
			query,
		}
	}
}

#[derive(Debug, Default)]
struct ResultSetState {
	entries: Vec<Arc<ResultEntry>>,
	closed: bool,
}

/// Ordered, mutex-guarded result collection.
///
/// Every operation is one short critical section; nothing here calls out to
/// providers or listeners. Duplicate `(provider, id)` pairs are stored as
/// given.
#[derive(Debug, Default)]
pub struct ResultSet {
	state: Mutex<ResultSetState>,
}

impl ResultSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an entry. Returns `None` once the set has been closed.
	pub fn insert(&self, entry: ResultEntry) -> Option<Arc<ResultEntry>> {
		let mut state = self.state.lock();
		if state.closed {
			return None;
		}
		let entry = Arc::new(entry);
		state.entries.push(Arc::clone(&entry));
		Some(entry)
	}

	/// Removes and returns every entry bound to `provider`, in storage order.
	pub fn remove_all_for(&self, provider: &ProviderId) -> Vec<Arc<ResultEntry>> {
		let mut state = self.state.lock();
		let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.entries)
			.into_iter()
			.partition(|entry| entry.provider.id() == provider);
		state.entries = kept;
		removed
	}

	pub fn snapshot(&self) -> Vec<Arc<ResultEntry>> {
		self.state.lock().entries.clone()
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().entries.is_empty()
	}

	/// Drops every entry and refuses further inserts. Returns how many
	/// entries were dropped.
	pub fn close(&self) -> usize {
		let mut state = self.state.lock();
		state.closed = true;
		let dropped = state.entries.len();
		state.entries.clear();
		dropped
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}
}
