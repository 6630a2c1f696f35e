//! SQLite ticket store
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never wait on the writer
//! - `busy_timeout` bounds every wait on a locked database; expiry is a storage error
//! - one connection per operation, so the store itself is `Sync`
//!
//! Allocation runs in a `BEGIN IMMEDIATE` transaction: the counter bump and
//! the ticket insert either both commit or both roll back, and concurrent
//! allocations queue on SQLite's write lock.

use crate::key::TicketKey;
use crate::schema;
use crate::store::TicketStore;
use crate::{Error, NewTicket, ProjectCounter, Result, Ticket};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TICKET_COLUMNS: &str = "id, key, summary, description, created_at_us";

/// Durable ticket store backed by a SQLite file
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Open (or create) the database and bring its schema up to date
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };

        let mut conn = store.connect()?;
        let _journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        let version = schema::migrate(&mut conn)?;
        tracing::debug!(path = %store.path.display(), version, "opened ticket store");

        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }
}

impl TicketStore for SqliteStore {
    fn create_next(&self, ticket: &NewTicket) -> Result<Ticket> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count: i64 = tx.query_row(
            "INSERT INTO ticket_counts (project_id, count) VALUES (?1, 1)
             ON CONFLICT(project_id) DO UPDATE SET count = count + 1
             RETURNING count",
            params![ticket.project_id],
            |row| row.get(0),
        )?;
        let seq = u64::try_from(count)
            .map_err(|_| Error::Storage(format!("corrupt counter for {}", ticket.project_id)))?;
        let key = TicketKey::compose(&ticket.project_id, seq);

        let created_at_us = Utc::now().timestamp_micros();
        tx.execute(
            "INSERT INTO tickets (key, summary, description, created_at_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.as_str(), ticket.summary, ticket.description, created_at_us],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Ticket {
            id,
            key: key.into_string(),
            summary: ticket.summary.clone(),
            description: ticket.description.clone(),
            created_at: timestamp(created_at_us)?,
        })
    }

    fn find_by_key(&self, key: &str) -> Result<Option<Ticket>> {
        let conn = self.connect()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE key = ?1"),
                params![key],
                ticket_from_row,
            )
            .optional()?;
        Ok(ticket)
    }

    fn find_by_description(&self, needle: &str) -> Result<Vec<Ticket>> {
        let conn = self.connect()?;
        // instr() is case-sensitive and has no wildcard characters, unlike LIKE
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets
             WHERE instr(description, ?1) > 0
             ORDER BY id DESC"
        ))?;
        let tickets = stmt
            .query_map(params![needle], ticket_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    fn list(&self) -> Result<Vec<Ticket>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY id DESC"
        ))?;
        let tickets = stmt
            .query_map([], ticket_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    fn counter(&self, project_id: &str) -> Result<Option<ProjectCounter>> {
        let conn = self.connect()?;
        let counter = conn
            .query_row(
                "SELECT project_id, count FROM ticket_counts WHERE project_id = ?1",
                params![project_id],
                counter_from_row,
            )
            .optional()?;
        Ok(counter)
    }

    fn counters(&self) -> Result<Vec<ProjectCounter>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT project_id, count FROM ticket_counts ORDER BY project_id")?;
        let counters = stmt
            .query_map([], counter_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counters)
    }
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let created_at_us: i64 = row.get(4)?;
    let created_at = DateTime::from_timestamp_micros(created_at_us)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, created_at_us))?;
    Ok(Ticket {
        id: row.get(0)?,
        key: row.get(1)?,
        summary: row.get(2)?,
        description: row.get(3)?,
        created_at,
    })
}

fn counter_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectCounter> {
    let count: i64 = row.get(1)?;
    Ok(ProjectCounter {
        project_id: row.get(0)?,
        count: u64::try_from(count)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, count))?,
    })
}

fn timestamp(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Storage(format!("timestamp out of range: {}", micros)))
}
