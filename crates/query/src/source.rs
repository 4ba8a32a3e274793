use crate::config::QueryConfig;
use crate::engine::{QueryDeps, QueryEngine};
use crate::provider::Provider;

/// Factory for room queries sharing one set of collaborators.
#[derive(Clone)]
pub struct QuerySource {
	deps: QueryDeps,
	config: QueryConfig,
}

impl QuerySource {
	pub fn new(deps: QueryDeps, config: QueryConfig) -> Self {
		Self { deps, config }
	}

	pub fn config(&self) -> &QueryConfig {
		&self.config
	}

	/// Creates a query over every provider, or only `pinned` when given.
	///
	/// The query is not started; register listeners first if the initial
	/// results should be observed.
	pub fn create_query(&self, query_string: Option<&str>, pinned: Option<Provider>) -> QueryEngine {
		QueryEngine::new(self.deps.clone(), self.config.clone(), query_string, pinned)
	}
}
