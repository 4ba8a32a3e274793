//! Federated discovery of chat rooms across live providers.
//!
//! A [`QueryEngine`] asks every connected provider for the rooms it hosts,
//! keeps the ones that match the query string and are not already saved by
//! the user, and keeps that result set current while providers come and go.
//!
//! - [`MatchingPolicy`]: case-folded substring match plus exclusion check.
//! - [`ResultSet`]: mutex-guarded entries keyed by provider.
//! - [`TopologySubscription`]: subscribes to provider changes only while the
//!   query has listeners.
//! - [`QueryRunner`]: status machine and one-shot execution of a
//!   [`ScanStrategy`].
//!
//! Providers, the saved-room registry and the topology feed are supplied by
//! the host through the traits in [`provider`]; [`QuerySource`] bundles them
//! for creating queries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub mod config;
mod departures;
pub mod engine;
pub mod listener;
pub mod policy;
pub mod provider;
pub mod results;
pub mod runner;
pub mod source;
mod status;
pub mod topology;

pub use config::QueryConfig;
pub use engine::{QueryDeps, QueryEngine};
pub use listener::{
	Delivery, EventForwarder, ListenerId, QueryEvent, QueryEventReceiver, QueryEventSender, QueryListener,
};
pub use policy::MatchingPolicy;
pub use provider::{
	Candidate, ExclusionRegistry, NoExclusions, Provider, ProviderDirectory, ProviderId, SubscriptionId,
	TopologyNotifier, TopologyObserver,
};
pub use results::{ResultEntry, ResultSet};
pub use roomscout_worker::CancelToken;
pub use runner::{QueryRunner, ScanStrategy};
pub use source::QuerySource;
pub use status::QueryStatus;
pub use topology::TopologySubscription;

/// Process-unique query identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u64);

impl QueryId {
	/// Allocates the next identity.
	pub fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for QueryId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "q{}", self.0)
	}
}

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of a single provider enumeration.
///
/// These never fail a query; the engine logs them and moves on to the next
/// provider.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The provider could not list its rooms.
	#[error("provider {provider} failed to list rooms: {message}")]
	Enumeration { provider: ProviderId, message: String },
	/// The provider did not answer within the configured limit.
	#[error("provider {provider} did not list rooms within {after:?}")]
	EnumerationTimeout { provider: ProviderId, after: Duration },
}
