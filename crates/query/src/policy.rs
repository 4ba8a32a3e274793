//! Candidate eligibility.
//!
//! A candidate is eligible when its name or id contains the query string as
//! a case-folded literal substring, and the exclusion check does not already
//! know the room. Queries therefore surface rooms that exist on a server but
//! are not yet saved by the user, not every room that matches.

use crate::provider::{Candidate, ExclusionRegistry};

/// Precompiled matcher for one query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingPolicy {
	/// Case-folded needle; `None` matches every name.
	needle: Option<String>,
}

impl MatchingPolicy {
	/// A `None` or empty query string matches everything.
	pub fn new(query: Option<&str>) -> Self {
		Self {
			needle: query.filter(|q| !q.is_empty()).map(fold),
		}
	}

	pub fn is_match_all(&self) -> bool {
		self.needle.is_none()
	}

	/// Name/id half of the predicate, without the exclusion check.
	pub fn matches_text(&self, candidate: &Candidate) -> bool {
		let Some(needle) = self.needle.as_deref() else {
			return true;
		};
		fold(&candidate.name).contains(needle) || fold(&candidate.id).contains(needle)
	}

	pub fn matches(&self, candidate: &Candidate, exclusions: &dyn ExclusionRegistry) -> bool {
		self.matches_text(candidate) && !exclusions.is_already_known(&candidate.id, &candidate.provider)
	}
}

/// Stateless form of [`MatchingPolicy::matches`].
///
/// `is_known` reports rooms that must be suppressed.
pub fn matches(candidate: &Candidate, query: Option<&str>, is_known: impl Fn(&Candidate) -> bool) -> bool {
	MatchingPolicy::new(query).matches_text(candidate) && !is_known(candidate)
}

fn fold(text: &str) -> String {
	text.to_lowercase()
}
