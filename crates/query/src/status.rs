use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a query.
///
/// `Completed` and `Canceled` are terminal. `Canceled` can only be reached
/// from `Created` or `InProgress`, so a finished scan never overwrites it and
/// a late cancel never rewrites `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QueryStatus {
	Created = 0,
	InProgress = 1,
	Completed = 2,
	Canceled = 3,
}

impl QueryStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::InProgress => "in_progress",
			Self::Completed => "completed",
			Self::Canceled => "canceled",
		}
	}

	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Canceled)
	}

	const fn from_u8(raw: u8) -> Self {
		match raw {
			0 => Self::Created,
			1 => Self::InProgress,
			2 => Self::Completed,
			_ => Self::Canceled,
		}
	}
}

impl fmt::Display for QueryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Atomic holder for [`QueryStatus`] that only performs legal transitions.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl Default for StatusCell {
	fn default() -> Self {
		Self(AtomicU8::new(QueryStatus::Created as u8))
	}
}

impl StatusCell {
	pub fn get(&self) -> QueryStatus {
		QueryStatus::from_u8(self.0.load(Ordering::Acquire))
	}

	/// `Created -> InProgress`.
	pub fn begin(&self) -> bool {
		self.transition(QueryStatus::Created, QueryStatus::InProgress)
	}

	/// `InProgress -> Completed`.
	pub fn complete(&self) -> bool {
		self.transition(QueryStatus::InProgress, QueryStatus::Completed)
	}

	/// `Created | InProgress -> Canceled`.
	pub fn cancel(&self) -> bool {
		let mut current = self.0.load(Ordering::Acquire);
		loop {
			if QueryStatus::from_u8(current).is_terminal() {
				return false;
			}
			match self
				.0
				.compare_exchange(current, QueryStatus::Canceled as u8, Ordering::AcqRel, Ordering::Acquire)
			{
				Ok(_) => return true,
				Err(observed) => current = observed,
			}
		}
	}

	fn transition(&self, from: QueryStatus, to: QueryStatus) -> bool {
		self.0
			.compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}
}
