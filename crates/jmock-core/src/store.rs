//! Ticket storage
//!
//! Two tables: tickets keyed by ticket key, and per-project counters.
//! Backends implement [`TicketStore`]; callers reach them through
//! [`crate::Allocator`] and [`crate::Resolver`].

use crate::config::{StorageBackend, StorageConfig};
use crate::{MemoryStore, NewTicket, ProjectCounter, Result, SqliteStore, Ticket};
use std::path::Path;
use std::sync::Arc;

/// Storage operations for tickets and project counters
pub trait TicketStore: Send + Sync {
    /// Advance the project's counter and insert the ticket as one unit
    ///
    /// Calls for the same project are serialized; the returned ticket
    /// carries the key `<project>-<count>`. If either write fails nothing
    /// is persisted.
    fn create_next(&self, ticket: &NewTicket) -> Result<Ticket>;

    /// Exact lookup by key
    fn find_by_key(&self, key: &str) -> Result<Option<Ticket>>;

    /// Tickets whose description contains `needle`, most recent first
    fn find_by_description(&self, needle: &str) -> Result<Vec<Ticket>>;

    /// All tickets, most recent first
    fn list(&self) -> Result<Vec<Ticket>>;

    /// Counter for one project
    fn counter(&self, project_id: &str) -> Result<Option<ProjectCounter>>;

    /// All counters, ordered by project id
    fn counters(&self) -> Result<Vec<ProjectCounter>>;
}

/// Open the store selected by `config`
///
/// `database` is ignored for the in-memory backend.
pub fn open_store(config: &StorageConfig, database: &Path) -> Result<Arc<dyn TicketStore>> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(
            database,
            config.busy_timeout(),
        )?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
