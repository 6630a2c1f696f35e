//! Workspace discovery
//!
//! A workspace is any directory containing `.jmock/`.

use crate::store::{self, TicketStore};
use crate::{Config, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const JMOCK_DIR: &str = ".jmock";
const CONFIG_FILE: &str = "config.toml";

/// An initialized jmock directory and its configuration
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Find and open the workspace containing `start`
    pub fn open(start: &Path) -> Result<Self> {
        let root = Self::find_root(start)?;
        let config = Config::load(&root.join(JMOCK_DIR).join(CONFIG_FILE))?;
        Ok(Self { root, config })
    }

    /// Find and open the workspace for the current directory
    pub fn open_current() -> Result<Self> {
        Self::open(&std::env::current_dir()?)
    }

    /// Initialize a new workspace in `root`
    pub fn init(root: &Path) -> Result<Self> {
        let jmock_dir = root.join(JMOCK_DIR);

        if jmock_dir.exists() {
            return Err(Error::AlreadyInitialized(jmock_dir.display().to_string()));
        }

        fs::create_dir_all(&jmock_dir)?;
        fs::write(jmock_dir.join(CONFIG_FILE), Config::default_with_comments())?;

        let workspace = Self {
            root: root.to_path_buf(),
            config: Config::default(),
        };
        // Creates the database and applies the schema up front
        workspace.store()?;
        Ok(workspace)
    }

    /// Find the directory containing .jmock
    fn find_root(start: &Path) -> Result<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(JMOCK_DIR).is_dir() {
                return Ok(current);
            }
            if !current.pop() {
                return Err(Error::NotInitialized);
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the .jmock directory
    pub fn jmock_dir(&self) -> PathBuf {
        self.root.join(JMOCK_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.jmock_dir().join(CONFIG_FILE)
    }

    /// Path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.jmock_dir().join(&self.config.storage.database)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the ticket store configured for this workspace
    pub fn store(&self) -> Result<Arc<dyn TicketStore>> {
        store::open_store(&self.config.storage, &self.database_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_open_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();
        assert!(ws.config_path().exists());
        assert!(ws.database_path().exists());

        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let opened = Workspace::open(&nested).unwrap();
        assert_eq!(opened.root(), dir.path());
        assert_eq!(opened.config(), &Config::default());
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        Workspace::init(dir.path()).unwrap();
        assert!(matches!(
            Workspace::init(dir.path()),
            Err(Error::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_open_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Workspace::open(dir.path()),
            Err(Error::NotInitialized)
        ));
    }
}
