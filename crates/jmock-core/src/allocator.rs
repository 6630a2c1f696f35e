//! Ticket key allocation
//!
//! Keys are `<project>-<n>` where `n` counts the project's tickets from 1.
//! The store performs the counter bump and the ticket insert as one unit,
//! serialized per project, so concurrent creates never share a key.

use crate::store::TicketStore;
use crate::{NewTicket, Result, Ticket};
use std::sync::Arc;

/// Creates tickets under fresh project-scoped keys
#[derive(Clone)]
pub struct Allocator {
    store: Arc<dyn TicketStore>,
}

impl Allocator {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Validate, allocate the next key for the ticket's project and persist it
    pub fn allocate(&self, ticket: &NewTicket) -> Result<Ticket> {
        ticket.validate()?;
        let created = self.store.create_next(ticket)?;
        tracing::info!(key = %created.key, id = created.id, "created ticket");
        Ok(created)
    }

    /// Shorthand for callers holding raw fields; returns only the key
    pub fn create(&self, project_id: &str, summary: &str, description: &str) -> Result<String> {
        let ticket = NewTicket::new(project_id, summary, description)?;
        Ok(self.allocate(&ticket)?.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, MemoryStore, SqliteStore};
    use std::collections::HashSet;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sqlite_allocator() -> (TempDir, Allocator) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("jmock.db"), Duration::from_secs(10))
            .unwrap();
        (dir, Allocator::new(Arc::new(store)))
    }

    fn memory_allocator() -> Allocator {
        Allocator::new(Arc::new(MemoryStore::new()))
    }

    fn sequential_keys(allocator: &Allocator) {
        assert_eq!(allocator.create("dd", "s", "d").unwrap(), "dd-1");
        assert_eq!(allocator.create("dd", "s", "d").unwrap(), "dd-2");
        assert_eq!(allocator.create("ops", "s", "d").unwrap(), "ops-1");
        assert_eq!(allocator.create("dd", "s", "d").unwrap(), "dd-3");
        assert_eq!(allocator.create("ops", "s", "d").unwrap(), "ops-2");
    }

    #[test]
    fn test_sequential_keys_sqlite() {
        let (_dir, allocator) = sqlite_allocator();
        sequential_keys(&allocator);
    }

    #[test]
    fn test_sequential_keys_memory() {
        sequential_keys(&memory_allocator());
    }

    #[test]
    fn test_project_id_taken_verbatim() {
        let allocator = memory_allocator();
        assert_eq!(allocator.create("Web UI", "s", "d").unwrap(), "Web UI-1");
        assert_eq!(allocator.create("web ui", "s", "d").unwrap(), "web ui-1");
    }

    #[test]
    fn test_invalid_input_never_reaches_store() {
        let allocator = memory_allocator();
        let blank = NewTicket {
            project_id: " ".to_string(),
            summary: "s".to_string(),
            description: "d".to_string(),
        };
        assert!(matches!(
            allocator.allocate(&blank),
            Err(Error::InvalidInput(_))
        ));
        assert!(allocator.store.counters().unwrap().is_empty());
        assert!(allocator.store.list().unwrap().is_empty());
    }

    fn concurrent_keys(allocator: &Allocator) {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 10;

        let keys: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        (0..PER_THREAD)
                            .map(|_| allocator.create("dd", "s", "d").unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let total = THREADS * PER_THREAD;
        let unique: HashSet<_> = keys.iter().cloned().collect();
        assert_eq!(unique.len(), total);
        let expected: HashSet<_> = (1..=total).map(|n| format!("dd-{}", n)).collect();
        assert_eq!(unique, expected);
        assert_eq!(
            allocator.store.counter("dd").unwrap().unwrap().count,
            total as u64
        );
    }

    #[test]
    fn test_concurrent_allocation_sqlite() {
        let (_dir, allocator) = sqlite_allocator();
        concurrent_keys(&allocator);
    }

    #[test]
    fn test_concurrent_allocation_memory() {
        concurrent_keys(&memory_allocator());
    }

    fn concurrent_projects(allocator: &Allocator) {
        const PROJECTS: [&str; 3] = ["dd", "ops", "qa"];
        const PER_PROJECT: usize = 20;

        let issued: Vec<(&str, Vec<String>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = PROJECTS
                .into_iter()
                .map(|project| {
                    scope.spawn(move || {
                        let keys = (0..PER_PROJECT)
                            .map(|_| allocator.create(project, "s", "d").unwrap())
                            .collect::<Vec<_>>();
                        (project, keys)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (project, keys) in issued {
            // One thread per project, so its keys come back in order
            let expected: Vec<_> = (1..=PER_PROJECT)
                .map(|n| format!("{}-{}", project, n))
                .collect();
            assert_eq!(keys, expected);

            let stored: HashSet<_> = allocator
                .store
                .list()
                .unwrap()
                .into_iter()
                .filter(|t| t.project_id() == Some(project))
                .map(|t| t.key)
                .collect();
            assert_eq!(stored, expected.into_iter().collect::<HashSet<_>>());
            assert_eq!(
                allocator.store.counter(project).unwrap().unwrap().count,
                PER_PROJECT as u64
            );
        }
        assert_eq!(
            allocator.store.list().unwrap().len(),
            PROJECTS.len() * PER_PROJECT
        );
    }

    #[test]
    fn test_concurrent_projects_sqlite() {
        let (_dir, allocator) = sqlite_allocator();
        concurrent_projects(&allocator);
    }

    #[test]
    fn test_concurrent_projects_memory() {
        concurrent_projects(&memory_allocator());
    }
}
