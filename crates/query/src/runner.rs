use std::sync::Arc;

use async_trait::async_trait;
use roomscout_worker::{CancelToken, TaskClass};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::QueryId;
use crate::listener::ListenerSet;
use crate::status::{QueryStatus, StatusCell};

/// The work a query performs once it starts.
#[async_trait]
pub trait ScanStrategy: Send + Sync + 'static {
	/// Runs the scan. Implementations poll `token` between units of work
	/// and return early once it trips.
	async fn scan(&self, token: &CancelToken);
}

struct RunnerShared {
	id: QueryId,
	status: StatusCell,
	token: CancelToken,
	listeners: ListenerSet,
}

/// Status, cancellation and listeners of one query, plus the single
/// execution of its scan.
#[derive(Clone)]
pub struct QueryRunner {
	shared: Arc<RunnerShared>,
}

impl QueryRunner {
	pub fn new(id: QueryId) -> Self {
		Self {
			shared: Arc::new(RunnerShared {
				id,
				status: StatusCell::default(),
				token: CancelToken::new(),
				listeners: ListenerSet::default(),
			}),
		}
	}

	pub fn id(&self) -> QueryId {
		self.shared.id
	}

	pub fn status(&self) -> QueryStatus {
		self.shared.status.get()
	}

	pub fn token(&self) -> &CancelToken {
		&self.shared.token
	}

	pub fn is_cancelled(&self) -> bool {
		self.shared.token.is_cancelled()
	}

	pub(crate) fn listeners(&self) -> &ListenerSet {
		&self.shared.listeners
	}

	/// Moves `Created -> InProgress` and runs `strategy` on its own task.
	///
	/// Returns `None` when the query was already started or canceled.
	pub fn start<S: ScanStrategy>(&self, strategy: Arc<S>) -> Option<JoinHandle<()>> {
		if !self.shared.status.begin() {
			debug!(query = %self.id(), status = %self.status(), "query.start.ignored");
			return None;
		}
		debug!(query = %self.id(), "query.start");
		self.shared.listeners.status_changed(QueryStatus::InProgress);

		let runner = self.clone();
		Some(roomscout_worker::spawn(TaskClass::Scan, async move {
			strategy.scan(&runner.shared.token).await;
			runner.finish();
		}))
	}

	/// Trips the token and, unless already terminal, moves to `Canceled`.
	///
	/// Returns `true` only for the first call.
	pub fn cancel(&self) -> bool {
		if !self.shared.token.cancel() {
			return false;
		}
		if self.shared.status.cancel() {
			debug!(query = %self.id(), "query.canceled");
			self.shared.listeners.status_changed(QueryStatus::Canceled);
		} else {
			debug!(query = %self.id(), status = %self.status(), "query.cancel.after_terminal");
		}
		true
	}

	fn finish(&self) {
		if self.shared.status.complete() {
			debug!(query = %self.id(), "query.completed");
			self.shared.listeners.status_changed(QueryStatus::Completed);
		} else {
			debug!(query = %self.id(), status = %self.status(), "query.scan.finished_late");
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use tokio::sync::Notify;

	use super::*;
	use crate::listener::{EventForwarder, QueryEvent};

	#[derive(Default)]
	struct Gate {
		runs: AtomicUsize,
		entered: Notify,
		release: Notify,
	}

	#[async_trait]
	impl ScanStrategy for Gate {
		async fn scan(&self, _token: &CancelToken) {
			self.runs.fetch_add(1, Ordering::SeqCst);
			self.entered.notify_one();
			self.release.notified().await;
		}
	}

	#[tokio::test]
	async fn runs_once_and_completes() {
		let runner = QueryRunner::new(QueryId(1));
		let (forwarder, mut rx) = EventForwarder::channel();
		runner.listeners().add(forwarder);
		let strategy = Arc::new(Gate::default());

		let handle = runner.start(strategy.clone()).unwrap();
		assert!(runner.start(strategy.clone()).is_none());
		strategy.entered.notified().await;
		strategy.release.notify_one();
		handle.await.unwrap();

		assert_eq!(strategy.runs.load(Ordering::SeqCst), 1);
		assert_eq!(runner.status(), QueryStatus::Completed);
		assert_eq!(rx.recv().await, Some(QueryEvent::StatusChanged(QueryStatus::InProgress)));
		assert_eq!(rx.recv().await, Some(QueryEvent::StatusChanged(QueryStatus::Completed)));
	}

	#[tokio::test]
	async fn cancel_mid_scan_is_not_overwritten() {
		let runner = QueryRunner::new(QueryId(2));
		let strategy = Arc::new(Gate::default());

		let handle = runner.start(strategy.clone()).unwrap();
		strategy.entered.notified().await;
		assert!(runner.cancel());
		assert!(!runner.cancel());
		strategy.release.notify_one();
		handle.await.unwrap();

		assert_eq!(runner.status(), QueryStatus::Canceled);
		assert!(runner.is_cancelled());
	}

	#[tokio::test]
	async fn cancel_before_start_prevents_scan() {
		let runner = QueryRunner::new(QueryId(3));
		let strategy = Arc::new(Gate::default());
		assert!(runner.cancel());
		assert!(runner.start(strategy.clone()).is_none());
		assert_eq!(strategy.runs.load(Ordering::SeqCst), 0);
		assert_eq!(runner.status(), QueryStatus::Canceled);
	}
}
