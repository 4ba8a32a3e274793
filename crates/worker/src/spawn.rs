use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

use crate::TaskClass;

/// Returns the ambient runtime handle, or a shared fallback runtime when the
/// caller is a plain thread.
///
/// Topology notifications arrive on whatever thread the host's protocol
/// stack uses, and the incremental scan they trigger has to run somewhere.
/// The fallback runtime is built on first use and lives for the process.
fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("roomscout-worker")
			.build()
			.expect("failed to build roomscout-worker fallback tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task labelled with `class`.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn spawns_on_ambient_runtime() {
		let handle = spawn(TaskClass::Scan, async { 7 });
		assert_eq!(handle.await.unwrap(), 7);
	}

	#[test]
	fn spawns_from_plain_thread() {
		let (tx, rx) = std::sync::mpsc::channel();
		std::thread::spawn(move || {
			let _ = spawn(TaskClass::Incremental, async move {
				let _ = tx.send("ran");
			});
		})
		.join()
		.unwrap();
		assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap(), "ran");
	}
}
