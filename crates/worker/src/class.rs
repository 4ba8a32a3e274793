/// Execution classes used to label spawned query work in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// The one-shot initial scan across every known provider.
	Scan,
	/// Work triggered by a topology change after the query started.
	Incremental,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Scan => "scan",
			Self::Incremental => "incremental",
		}
	}
}
