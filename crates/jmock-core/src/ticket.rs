//! Ticket data model for jmock

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, key};

/// A stored ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Internal sequence number assigned by the store
    pub id: i64,

    /// Project-scoped key (dd-3)
    pub key: String,

    pub summary: String,

    /// Free text, conventionally ending in a correlation URL
    pub description: String,

    /// When the ticket was created
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Project part of the key
    pub fn project_id(&self) -> Option<&str> {
        key::parse_key(&self.key).map(|(project, _)| project)
    }

    /// Last whitespace-separated word of the description
    pub fn correlation_token(&self) -> Option<&str> {
        self.description.split_whitespace().next_back()
    }

    /// Description with the correlation token removed
    pub fn description_text(&self) -> String {
        match self.correlation_token() {
            Some(token) => self.description.replace(token, "").trim().to_string(),
            None => self.description.trim().to_string(),
        }
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.key, self.summary)
    }
}

/// Per-project sequence state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCounter {
    pub project_id: String,

    /// Number of tickets issued for the project; also the last sequence number
    pub count: u64,
}

/// Validated input for ticket creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub project_id: String,
    pub summary: String,
    pub description: String,
}

impl NewTicket {
    /// Build a creation request, rejecting missing or blank fields
    pub fn new(
        project_id: impl Into<String>,
        summary: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let ticket = Self {
            project_id: project_id.into(),
            summary: summary.into(),
            description: description.into(),
        };
        ticket.validate()?;
        Ok(ticket)
    }

    /// Build from optional request parameters
    pub fn from_parts(
        project_id: Option<String>,
        summary: Option<String>,
        description: Option<String>,
    ) -> Result<Self> {
        Self::new(
            required("project id", project_id)?,
            required("summary", summary)?,
            required("description", description)?,
        )
    }

    pub fn validate(&self) -> Result<()> {
        non_blank("project id", &self.project_id)?;
        non_blank("summary", &self.summary)?;
        non_blank("description", &self.description)?;
        Ok(())
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::InvalidInput(format!("{} is required", field)))
}

fn non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
