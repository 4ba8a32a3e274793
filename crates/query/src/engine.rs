//! Federated room query over every live provider.
//!
//! [`QueryEngine::start`] scans the providers known at that moment (or the
//! one pinned provider) on a worker task and reports matches as initial
//! results. While at least one listener is registered the engine also
//! follows the topology feed: a provider that appears is scanned and its
//! matches are reported as live results, a provider that disappears has its
//! entries purged and reported as removed.
//!
//! Additions, removals and cancellation are announced under one delivery
//! gate, so a listener never sees a removal for an entry it was not told
//! about, nor an addition after the query was canceled. The gate is
//! reentrant: listener callbacks run under it and may call back into the
//! engine. Lock order is gate, then result set, listener set or departure
//! log; those are never held together and no provider call happens under
//! any of them.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::ReentrantMutex;
use roomscout_worker::{CancelToken, TaskClass};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::departures::{DepartureLog, Enumeration};
use crate::listener::{Delivery, ListenerId, QueryListener};
use crate::policy::MatchingPolicy;
use crate::provider::{
	Candidate, ExclusionRegistry, Provider, ProviderDirectory, TopologyNotifier, TopologyObserver,
};
use crate::results::{ResultEntry, ResultSet};
use crate::runner::{QueryRunner, ScanStrategy};
use crate::status::QueryStatus;
use crate::topology::TopologySubscription;
use crate::{Error, QueryId, Result};

/// Collaborators a query is built from.
#[derive(Clone)]
pub struct QueryDeps {
	pub directory: Arc<dyn ProviderDirectory>,
	pub exclusions: Arc<dyn ExclusionRegistry>,
	pub notifier: Arc<dyn TopologyNotifier>,
}

/// Handle to one federated query. Clones share the same query.
#[derive(Clone)]
pub struct QueryEngine {
	inner: Arc<EngineInner>,
}

struct EngineInner {
	this: Weak<EngineInner>,
	query_string: Option<String>,
	policy: MatchingPolicy,
	pinned: Option<Provider>,
	directory: Arc<dyn ProviderDirectory>,
	exclusions: Arc<dyn ExclusionRegistry>,
	config: QueryConfig,
	runner: QueryRunner,
	results: ResultSet,
	topology: TopologySubscription,
	delivery: ReentrantMutex<()>,
	departures: DepartureLog,
}

impl QueryEngine {
	/// Creates a query. `query_string` of `None` or `""` matches every room;
	/// `pinned` restricts the initial scan to one provider.
	pub fn new(deps: QueryDeps, config: QueryConfig, query_string: Option<&str>, pinned: Option<Provider>) -> Self {
		let id = QueryId::next();
		let inner = Arc::new_cyclic(|this: &Weak<EngineInner>| {
			let observer: Weak<dyn TopologyObserver> = this.clone();
			EngineInner {
				this: this.clone(),
				query_string: query_string.map(str::to_owned),
				policy: MatchingPolicy::new(query_string),
				pinned,
				directory: deps.directory,
				exclusions: deps.exclusions,
				config,
				runner: QueryRunner::new(id),
				results: ResultSet::new(),
				topology: TopologySubscription::new(deps.notifier, observer),
				delivery: ReentrantMutex::new(()),
				departures: DepartureLog::default(),
			}
		});
		debug!(query = %id, query_string = ?query_string, pinned = ?inner.pinned.as_ref().map(Provider::id), "query.created");
		Self { inner }
	}

	/// Starts the initial scan. Returns `None` if the query already started
	/// or was canceled.
	pub fn start(&self) -> Option<JoinHandle<()>> {
		self.inner.runner.start(Arc::clone(&self.inner))
	}

	/// Cancels the query and tears it down.
	///
	/// The first call unsubscribes from the topology feed for good and drops
	/// retained results; later calls return `false` and do nothing.
	pub fn cancel(&self) -> bool {
		let dropped = {
			let _gate = self.inner.delivery.lock();
			if !self.inner.runner.cancel() {
				return false;
			}
			self.inner.results.close()
		};
		self.inner.topology.close();
		debug!(query = %self.id(), dropped, "query.teardown");
		true
	}

	/// Registers a listener. The first registration subscribes to the
	/// topology feed.
	pub fn register_listener(&self, listener: Arc<dyn QueryListener>) -> ListenerId {
		let (id, count) = self.inner.runner.listeners().add(listener);
		let subscribed = self.inner.topology.acquire();
		debug!(query = %self.id(), listener = ?id, count, subscribed, "query.listener.register");
		id
	}

	/// Unregisters a listener. Removing the last one unsubscribes from the
	/// topology feed. Unknown handles are ignored and return `false`.
	pub fn unregister_listener(&self, id: ListenerId) -> bool {
		let Some(count) = self.inner.runner.listeners().remove(id) else {
			warn!(query = %self.id(), listener = ?id, "query.listener.unknown");
			return false;
		};
		let unsubscribed = self.inner.topology.release();
		debug!(query = %self.id(), listener = ?id, count, unsubscribed, "query.listener.unregister");
		true
	}

	/// Scans a newly available provider and reports its matches as live
	/// results. Returns the number of entries added; always `0` once
	/// canceled.
	pub async fn provider_added(&self, provider: Provider) -> usize {
		let enumeration = self.inner.departures.begin(provider.id());
		self.inner.enumerate(&provider, Delivery::Live, enumeration).await
	}

	/// Purges every entry of a departed provider, reporting one removal per
	/// entry in storage order. Returns the number of entries removed.
	pub fn provider_removed(&self, provider: &Provider) -> usize {
		self.inner.remove_provider(provider)
	}

	pub fn id(&self) -> QueryId {
		self.inner.runner.id()
	}

	pub fn query_string(&self) -> Option<&str> {
		self.inner.query_string.as_deref()
	}

	pub fn pinned_provider(&self) -> Option<&Provider> {
		self.inner.pinned.as_ref()
	}

	pub fn status(&self) -> QueryStatus {
		self.inner.runner.status()
	}

	/// Point-in-time copy of the current results.
	pub fn results(&self) -> Vec<Arc<ResultEntry>> {
		self.inner.results.snapshot()
	}

	pub fn result_count(&self) -> usize {
		self.inner.results.len()
	}

	pub fn listener_count(&self) -> usize {
		self.inner.runner.listeners().len()
	}

	/// Whether the query currently follows the topology feed.
	pub fn is_subscribed(&self) -> bool {
		self.inner.topology.is_active()
	}
}

impl EngineInner {
	fn id(&self) -> QueryId {
		self.runner.id()
	}

	/// Enumerates `provider` and admits its matches. `enumeration` must be
	/// taken before the call is scheduled so that a removal delivered in
	/// between is not missed.
	async fn enumerate(&self, provider: &Provider, delivery: Delivery, enumeration: Enumeration) -> usize {
		let token = self.runner.token();
		if token.is_cancelled() {
			debug!(query = %self.id(), provider = %provider.id(), "query.provider.ignored_after_cancel");
			return 0;
		}

		let listing = tokio::select! {
			biased;
			() = token.cancelled() => {
				debug!(query = %self.id(), provider = %provider.id(), "query.provider.abandoned");
				return 0;
			}
			listing = self.fetch(provider) => listing,
		};
		let candidates = match listing {
			Ok(Some(candidates)) => candidates,
			Ok(None) => {
				debug!(query = %self.id(), provider = %provider.id(), "query.provider.no_listing");
				return 0;
			}
			Err(error) => {
				warn!(query = %self.id(), provider = %provider.id(), %error, "query.provider.enumeration_failed");
				return 0;
			}
		};

		let total = candidates.len();
		let mut admitted = 0;
		for candidate in candidates {
			if !self.policy.matches(&candidate, &*self.exclusions) {
				continue;
			}
			if !self.admit(&enumeration, candidate, delivery) {
				break;
			}
			admitted += 1;
		}
		debug!(
			query = %self.id(),
			provider = %provider.id(),
			delivery = delivery.as_str(),
			total,
			admitted,
			"query.provider.scanned"
		);
		admitted
	}

	async fn fetch(&self, provider: &Provider) -> Result<Option<Vec<Candidate>>> {
		let listing = self.directory.candidates(provider);
		let Some(limit) = self.config.enumeration_timeout() else {
			return listing.await;
		};
		tokio::time::timeout(limit, listing).await.map_err(|_| Error::EnumerationTimeout {
			provider: provider.id().clone(),
			after: limit,
		})?
	}

	/// Stores one match and announces it. Returns `false` when nothing more
	/// should be admitted from this enumeration.
	fn admit(&self, enumeration: &Enumeration, candidate: Candidate, delivery: Delivery) -> bool {
		let _gate = self.delivery.lock();
		if !enumeration.is_current() {
			debug!(query = %self.id(), provider = %enumeration.provider(), "query.provider.departed_mid_scan");
			return false;
		}
		let Some(entry) = self.results.insert(ResultEntry::new(candidate, self.id())) else {
			return false;
		};
		self.runner.listeners().added(&entry, delivery);
		true
	}

	fn remove_provider(&self, provider: &Provider) -> usize {
		let _gate = self.delivery.lock();
		self.departures.depart(provider.id());
		let removed = self.results.remove_all_for(provider.id());
		for entry in &removed {
			self.runner.listeners().removed(entry);
		}
		debug!(query = %self.id(), provider = %provider.id(), removed = removed.len(), "query.provider.removed");
		removed.len()
	}
}

#[async_trait]
impl ScanStrategy for EngineInner {
	async fn scan(&self, token: &CancelToken) {
		let providers = match &self.pinned {
			Some(pinned) => vec![pinned.clone()],
			None => self.directory.providers(),
		};
		debug!(query = %self.id(), providers = providers.len(), pinned = self.pinned.is_some(), "query.scan.begin");

		for provider in providers {
			if token.is_cancelled() {
				debug!(query = %self.id(), provider = %provider.id(), "query.scan.canceled");
				return;
			}
			let enumeration = self.departures.begin(provider.id());
			self.enumerate(&provider, Delivery::Initial, enumeration).await;
		}
	}
}

impl TopologyObserver for EngineInner {
	fn provider_added(&self, provider: Provider) {
		if self.runner.is_cancelled() {
			return;
		}
		let Some(this) = self.this.upgrade() else {
			return;
		};
		let enumeration = self.departures.begin(provider.id());
		let _ = roomscout_worker::spawn(TaskClass::Incremental, async move {
			this.enumerate(&provider, Delivery::Live, enumeration).await;
		});
	}

	fn provider_removed(&self, provider: Provider) {
		self.remove_provider(&provider);
	}
}

impl Drop for EngineInner {
	fn drop(&mut self) {
		self.topology.close();
	}
}
