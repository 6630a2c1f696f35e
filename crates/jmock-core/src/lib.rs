//! jmock-core: Core library for the jmock issue tracker
//!
//! Allocates project-scoped ticket keys (`dd-1`, `dd-2`, ...) and resolves
//! tickets by key or by a token embedded in their description.

pub mod allocator;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod resolver;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod ticket;
pub mod workspace;

pub use allocator::Allocator;
pub use config::{ApiConfig, Config, StorageBackend, StorageConfig};
pub use error::Error;
pub use key::TicketKey;
pub use memory::MemoryStore;
pub use resolver::Resolver;
pub use sqlite::SqliteStore;
pub use store::{TicketStore, open_store};
pub use ticket::{NewTicket, ProjectCounter, Ticket};
pub use workspace::Workspace;

/// Result type for jmock operations
pub type Result<T> = std::result::Result<T, Error>;
