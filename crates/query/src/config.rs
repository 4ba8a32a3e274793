use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables shared by every query created from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
	/// Upper bound for one provider's room listing, in milliseconds. `0`
	/// waits indefinitely.
	#[serde(default = "default_enumeration_timeout")]
	pub enumeration_timeout_ms: u64,
}

/// Returns the default enumeration timeout in milliseconds.
fn default_enumeration_timeout() -> u64 {
	30_000
}

impl Default for QueryConfig {
	fn default() -> Self {
		Self {
			enumeration_timeout_ms: default_enumeration_timeout(),
		}
	}
}

impl QueryConfig {
	pub fn enumeration_timeout(&self) -> Option<Duration> {
		(self.enumeration_timeout_ms > 0).then(|| Duration::from_millis(self.enumeration_timeout_ms))
	}
}
