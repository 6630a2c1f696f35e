//! Error types for jmock

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ticket key already taken: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Workspace not initialized. Run 'jmock init' first.")]
    NotInitialized,

    #[error("Workspace already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the underlying store (as opposed to caller mistakes)
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Error::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => Error::Storage(err.to_string()),
        }
    }
}
