//! Ticket lookup
//!
//! Tickets are found either by exact key or by a correlation token: any
//! text the caller embedded in the description, matched as a
//! case-sensitive substring.

use crate::store::TicketStore;
use crate::{Error, ProjectCounter, Result, Ticket};
use std::sync::Arc;

/// Read-only access to stored tickets
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn TicketStore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Exact key match; `None` when no ticket has this key
    pub fn resolve_by_key(&self, key: &str) -> Result<Option<Ticket>> {
        self.store.find_by_key(key)
    }

    /// Every ticket whose description contains `token`, most recent first
    ///
    /// An empty result is a valid answer. An empty token is rejected
    /// before the store is queried.
    pub fn resolve_by_token(&self, token: &str) -> Result<Vec<Ticket>> {
        if token.is_empty() {
            return Err(Error::InvalidInput("search token must not be empty".into()));
        }
        let tickets = self.store.find_by_description(token)?;
        tracing::debug!(token, matches = tickets.len(), "searched descriptions");
        Ok(tickets)
    }

    /// All tickets, most recent first
    pub fn recent(&self) -> Result<Vec<Ticket>> {
        self.store.list()
    }

    pub fn counter(&self, project_id: &str) -> Result<Option<ProjectCounter>> {
        self.store.counter(project_id)
    }

    pub fn counters(&self) -> Result<Vec<ProjectCounter>> {
        self.store.counters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Allocator, MemoryStore, NewTicket, SqliteStore};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Store that fails every call, standing in for an unreachable database
    struct BrokenStore;

    impl TicketStore for BrokenStore {
        fn create_next(&self, _: &NewTicket) -> Result<Ticket> {
            Err(Error::Storage("unavailable".into()))
        }
        fn find_by_key(&self, _: &str) -> Result<Option<Ticket>> {
            Err(Error::Storage("unavailable".into()))
        }
        fn find_by_description(&self, _: &str) -> Result<Vec<Ticket>> {
            Err(Error::Storage("unavailable".into()))
        }
        fn list(&self) -> Result<Vec<Ticket>> {
            Err(Error::Storage("unavailable".into()))
        }
        fn counter(&self, _: &str) -> Result<Option<ProjectCounter>> {
            Err(Error::Storage("unavailable".into()))
        }
        fn counters(&self) -> Result<Vec<ProjectCounter>> {
            Err(Error::Storage("unavailable".into()))
        }
    }

    fn sqlite_pair() -> (TempDir, Allocator, Resolver) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TicketStore> = Arc::new(
            SqliteStore::open(&dir.path().join("jmock.db"), Duration::from_secs(5)).unwrap(),
        );
        (dir, Allocator::new(store.clone()), Resolver::new(store))
    }

    fn memory_pair() -> (Allocator, Resolver) {
        let store: Arc<dyn TicketStore> = Arc::new(MemoryStore::new());
        (Allocator::new(store.clone()), Resolver::new(store))
    }

    fn scenario(allocator: &Allocator, resolver: &Resolver) {
        let key = allocator
            .create("dd", "Deploy failed", "see details http://x/abc123")
            .unwrap();
        assert_eq!(key, "dd-1");

        let found = resolver.resolve_by_token("abc123").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "dd-1");
        assert!(resolver.resolve_by_token("zz").unwrap().is_empty());

        let ticket = resolver.resolve_by_key("dd-1").unwrap().unwrap();
        assert_eq!(ticket.summary, "Deploy failed");
        assert_eq!(ticket.description, "see details http://x/abc123");
        assert_eq!(ticket.correlation_token(), Some("http://x/abc123"));

        assert_eq!(resolver.resolve_by_key("dd-2").unwrap(), None);
        assert_eq!(resolver.resolve_by_key("ops-1").unwrap(), None);
    }

    #[test]
    fn test_scenario_sqlite() {
        let (_dir, allocator, resolver) = sqlite_pair();
        scenario(&allocator, &resolver);
    }

    #[test]
    fn test_scenario_memory() {
        let (allocator, resolver) = memory_pair();
        scenario(&allocator, &resolver);
    }

    fn token_matches_exactly_and_newest_first(allocator: &Allocator, resolver: &Resolver) {
        allocator.create("dd", "one", "run http://ci/build-77").unwrap();
        allocator.create("ops", "two", "unrelated http://ci/other").unwrap();
        allocator.create("dd", "three", "rerun http://ci/build-77").unwrap();
        allocator.create("qa", "four", "flaky build-777").unwrap();

        let keys: Vec<_> = resolver
            .resolve_by_token("build-77")
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect();
        assert_eq!(keys, vec!["qa-1", "dd-2", "dd-1"]);

        assert!(resolver.resolve_by_token("BUILD-77").unwrap().is_empty());
    }

    #[test]
    fn test_token_search_sqlite() {
        let (_dir, allocator, resolver) = sqlite_pair();
        token_matches_exactly_and_newest_first(&allocator, &resolver);
    }

    #[test]
    fn test_token_search_memory() {
        let (allocator, resolver) = memory_pair();
        token_matches_exactly_and_newest_first(&allocator, &resolver);
    }

    #[test]
    fn test_empty_token_rejected_before_store() {
        let resolver = Resolver::new(Arc::new(BrokenStore));
        assert!(matches!(
            resolver.resolve_by_token(""),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_storage_errors_are_distinct_from_not_found() {
        let resolver = Resolver::new(Arc::new(BrokenStore));
        assert!(resolver.resolve_by_key("dd-1").unwrap_err().is_storage());
        assert!(resolver.resolve_by_token("abc").unwrap_err().is_storage());
        assert!(resolver.recent().unwrap_err().is_storage());
    }

    #[test]
    fn test_recent_lists_everything_newest_first() {
        let (allocator, resolver) = memory_pair();
        allocator.create("dd", "s", "a").unwrap();
        allocator.create("ops", "s", "b").unwrap();
        allocator.create("dd", "s", "c").unwrap();

        let keys: Vec<_> = resolver.recent().unwrap().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["dd-2", "ops-1", "dd-1"]);
        assert_eq!(resolver.counter("dd").unwrap().unwrap().count, 2);
        assert_eq!(resolver.counters().unwrap().len(), 2);
    }
}
