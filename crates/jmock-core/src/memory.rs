//! In-memory ticket store
//!
//! Process-local and lost on exit. Allocation takes a lock per project, so
//! tickets for different projects are created in parallel while tickets for
//! one project are strictly sequential.

use crate::key::TicketKey;
use crate::store::TicketStore;
use crate::{Error, NewTicket, ProjectCounter, Result, Ticket};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

#[derive(Default)]
struct Tickets {
    /// Ordered by id, which is also creation order
    rows: Vec<Ticket>,
    by_key: HashMap<String, usize>,
}

/// Ephemeral ticket store
#[derive(Default)]
pub struct MemoryStore {
    tickets: RwLock<Tickets>,
    counters: Mutex<BTreeMap<String, Arc<Mutex<u64>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn project_lock(&self, project_id: &str) -> Result<Arc<Mutex<u64>>> {
        let mut counters = lock(&self.counters)?;
        Ok(counters.entry(project_id.to_string()).or_default().clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Storage("store lock poisoned".to_string()))
}

fn poisoned<T>(_: T) -> Error {
    Error::Storage("store lock poisoned".to_string())
}

impl TicketStore for MemoryStore {
    fn create_next(&self, ticket: &NewTicket) -> Result<Ticket> {
        let project = self.project_lock(&ticket.project_id)?;
        let mut count = lock(&project)?;

        let next = *count + 1;
        let key = TicketKey::compose(&ticket.project_id, next);

        let mut tickets = self.tickets.write().map_err(poisoned)?;
        if tickets.by_key.contains_key(key.as_str()) {
            return Err(Error::Conflict(key.into_string()));
        }

        let index = tickets.rows.len();
        let created = Ticket {
            id: i64::try_from(index + 1)
                .map_err(|_| Error::Storage("ticket id overflow".to_string()))?,
            key: key.into_string(),
            summary: ticket.summary.clone(),
            description: ticket.description.clone(),
            created_at: Utc::now(),
        };
        tickets.by_key.insert(created.key.clone(), index);
        tickets.rows.push(created.clone());

        // Only advance once the ticket is in place
        *count = next;
        Ok(created)
    }

    fn find_by_key(&self, key: &str) -> Result<Option<Ticket>> {
        let tickets = self.tickets.read().map_err(poisoned)?;
        Ok(tickets
            .by_key
            .get(key)
            .and_then(|index| tickets.rows.get(*index))
            .cloned())
    }

    fn find_by_description(&self, needle: &str) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().map_err(poisoned)?;
        Ok(tickets
            .rows
            .iter()
            .rev()
            .filter(|t| t.description.contains(needle))
            .cloned()
            .collect())
    }

    fn list(&self) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().map_err(poisoned)?;
        Ok(tickets.rows.iter().rev().cloned().collect())
    }

    fn counter(&self, project_id: &str) -> Result<Option<ProjectCounter>> {
        let project = match lock(&self.counters)?.get(project_id) {
            Some(project) => project.clone(),
            None => return Ok(None),
        };
        let count = *lock(&project)?;
        Ok((count > 0).then(|| ProjectCounter {
            project_id: project_id.to_string(),
            count,
        }))
    }

    fn counters(&self) -> Result<Vec<ProjectCounter>> {
        let projects: Vec<_> = lock(&self.counters)?
            .iter()
            .map(|(id, project)| (id.clone(), project.clone()))
            .collect();

        let mut counters = Vec::with_capacity(projects.len());
        for (project_id, project) in projects {
            let count = *lock(&project)?;
            if count > 0 {
                counters.push(ProjectCounter { project_id, count });
            }
        }
        Ok(counters)
    }
}
