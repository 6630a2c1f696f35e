//! Ticket keys
//!
//! Keys are project-scoped and sequential.
//! Format: <project>-<n> (e.g. dd-3)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Human-readable ticket key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketKey(String);

impl TicketKey {
    /// Compose the key for the `seq`-th ticket of a project
    ///
    /// The project id is taken verbatim.
    pub fn compose(project_id: &str, seq: u64) -> Self {
        Self(format!("{}-{}", project_id, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TicketKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split a key into project id and sequence number
///
/// Splits at the last dash so project ids may contain dashes themselves.
pub fn parse_key(key: &str) -> Option<(&str, u64)> {
    let (project, seq) = key.rsplit_once('-')?;
    if project.is_empty() {
        return None;
    }
    let seq = seq.parse::<u64>().ok().filter(|n| *n > 0)?;
    Some((project, seq))
}
