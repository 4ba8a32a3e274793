use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Cancellation shared between a query and its workers.
///
/// Workers either poll [`is_cancelled`](Self::is_cancelled) between units of
/// work or race [`cancelled`](Self::cancelled) against a pending call. Only
/// the first [`cancel`](Self::cancel) call reports `true`, so callers can
/// run teardown exactly once.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
	claimed: Arc<AtomicBool>,
	cancel: CancellationToken,
}

impl CancelToken {
	/// Creates an untripped token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Trips the token. Returns `true` only for the call that tripped it.
	pub fn cancel(&self) -> bool {
		if self.claimed.swap(true, Ordering::AcqRel) {
			return false;
		}
		self.cancel.cancel();
		true
	}

	/// Returns true once cancellation has been requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_cancel_wins() {
		let token = CancelToken::new();
		let clone = token.clone();
		assert!(!clone.is_cancelled());
		assert!(token.cancel());
		assert!(!clone.cancel());
		assert!(!token.cancel());
		assert!(clone.is_cancelled());
	}

	#[tokio::test]
	async fn cancelled_future_resolves() {
		let token = CancelToken::new();
		let waiter = token.clone();
		let handle = tokio::spawn(async move { waiter.cancelled().await });
		token.cancel();
		handle.await.unwrap();
	}
}
