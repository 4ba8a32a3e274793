//! Providers and the capabilities a query consumes from its host.
//!
//! A query never talks to a backend directly. The host injects a
//! [`ProviderDirectory`] to enumerate candidates, an [`ExclusionRegistry`] to
//! suppress rooms the user already knows about, and a [`TopologyNotifier`]
//! that pushes provider arrivals and departures.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::Result;

/// Stable identity of a provider (one connected account/session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(Arc<str>);

impl ProviderId {
	pub fn new(id: impl Into<Arc<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ProviderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Non-owning handle to a provider.
///
/// Equality and hashing use [`ProviderId`] only; the display name is
/// presentation data.
#[derive(Debug, Clone)]
pub struct Provider {
	id: ProviderId,
	display_name: Arc<str>,
}

impl Provider {
	pub fn new(id: impl Into<Arc<str>>, display_name: impl Into<Arc<str>>) -> Self {
		Self {
			id: ProviderId::new(id),
			display_name: display_name.into(),
		}
	}

	pub fn id(&self) -> &ProviderId {
		&self.id
	}

	pub fn display_name(&self) -> &str {
		&self.display_name
	}
}

impl PartialEq for Provider {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Provider {}

impl Hash for Provider {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Display for Provider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.display_name, self.id)
	}
}

/// A room reported by a provider, before matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	pub name: String,
	pub id: String,
	pub provider: Provider,
}

impl Candidate {
	pub fn new(name: impl Into<String>, id: impl Into<String>, provider: Provider) -> Self {
		Self {
			name: name.into(),
			id: id.into(),
			provider,
		}
	}

	/// Candidate whose id doubles as its display name, which is how most
	/// servers list rooms.
	pub fn named(name: impl Into<String>, provider: Provider) -> Self {
		let name = name.into();
		Self {
			id: name.clone(),
			name,
			provider,
		}
	}
}

/// Enumerates providers and the rooms they expose.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
	/// Providers known right now, in enumeration order.
	fn providers(&self) -> Vec<Provider>;

	/// Fetches the rooms a provider exposes.
	///
	/// `Ok(None)` means the provider has no listing and is not an error.
	async fn candidates(&self, provider: &Provider) -> Result<Option<Vec<Candidate>>>;
}

/// Knows which rooms the user has already saved.
pub trait ExclusionRegistry: Send + Sync {
	fn is_already_known(&self, resource_id: &str, provider: &Provider) -> bool;
}

/// Registry that excludes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl ExclusionRegistry for NoExclusions {
	fn is_already_known(&self, _resource_id: &str, _provider: &Provider) -> bool {
		false
	}
}

/// Handle returned by [`TopologyNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receives provider arrivals and departures.
///
/// Calls may come from any thread, concurrently with each other.
pub trait TopologyObserver: Send + Sync {
	fn provider_added(&self, provider: Provider);
	fn provider_removed(&self, provider: Provider);
}

/// Push feed of topology changes.
///
/// Notifiers hold observers weakly; a dropped observer is simply skipped.
pub trait TopologyNotifier: Send + Sync {
	fn subscribe(&self, observer: Weak<dyn TopologyObserver>) -> SubscriptionId;
	fn unsubscribe(&self, id: SubscriptionId);
}
