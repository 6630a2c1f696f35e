//! CLI command implementations

use anyhow::{Context, Result, bail};
use colored::Colorize;
use jmock_core::{
    Allocator, Error, NewTicket, Resolver, StorageBackend, Ticket, TicketStore, Workspace,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};

fn start_dir(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir().context("read current directory"),
    }
}

fn open_workspace(dir: Option<&Path>) -> Result<Workspace> {
    Ok(Workspace::open(&start_dir(dir)?)?)
}

/// Open the workspace's store; each CLI call is its own process, so only
/// durable backends make sense here
fn open_store(dir: Option<&Path>) -> Result<Arc<dyn TicketStore>> {
    let workspace = open_workspace(dir)?;
    if workspace.config().storage.backend == StorageBackend::Memory {
        bail!(
            "storage backend \"memory\" does not persist between jmock commands; \
             set backend = \"sqlite\" in {}",
            workspace.config_path().display()
        );
    }
    Ok(workspace.store()?)
}

fn resolver(dir: Option<&Path>) -> Result<Resolver> {
    Ok(Resolver::new(open_store(dir)?))
}

fn print_ticket_line(ticket: &Ticket) {
    println!(
        "{} {} - {}",
        ticket.key.cyan(),
        ticket.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        ticket.summary
    );
}

fn print_tickets(tickets: &[Ticket], empty: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(tickets)?);
    } else if tickets.is_empty() {
        println!("{}", empty);
    } else {
        for ticket in tickets {
            print_ticket_line(ticket);
        }
    }
    Ok(())
}

pub fn init(dir: Option<&Path>) -> Result<()> {
    let workspace = Workspace::init(&start_dir(dir)?)?;
    println!(
        "{} Initialized jmock in {}",
        "✓".green(),
        workspace.jmock_dir().display()
    );
    println!("  Database: {}", workspace.database_path().display());
    Ok(())
}

pub fn create(
    dir: Option<&Path>,
    project: &str,
    summary: &str,
    description: &str,
    json: bool,
) -> Result<()> {
    let allocator = Allocator::new(open_store(dir)?);
    let ticket = allocator.allocate(&NewTicket::new(project, summary, description)?)?;

    if json {
        println!("{}", serde_json::to_string(&ticket)?);
    } else {
        println!("{} Created ticket: {}", "✓".green(), ticket.key);
        println!("  Summary: {}", ticket.summary);
    }

    Ok(())
}

pub fn show(dir: Option<&Path>, key: &str, json: bool) -> Result<()> {
    let ticket = resolver(dir)?
        .resolve_by_key(key)?
        .ok_or_else(|| Error::NotFound(key.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
    } else {
        println!("{} {}", ticket.key.cyan().bold(), ticket.summary.bold());
        println!();
        if let Some(project) = ticket.project_id() {
            println!("Project:  {}", project);
        }
        println!("Created:  {}", ticket.created_at.format("%Y-%m-%d %H:%M"));
        if let Some(url) = ticket.correlation_token() {
            println!("URL:      {}", url);
        }

        let text = ticket.description_text();
        if !text.is_empty() {
            println!();
            println!("{}", "Description:".bold());
            println!("{}", text);
        }
    }

    Ok(())
}

pub fn search(dir: Option<&Path>, token: &str, json: bool) -> Result<()> {
    let tickets = resolver(dir)?.resolve_by_token(token)?;
    print_tickets(&tickets, &format!("No ticket mentions {}", token), json)
}

pub fn list(dir: Option<&Path>, json: bool) -> Result<()> {
    let tickets = resolver(dir)?.recent()?;
    print_tickets(&tickets, "No tickets yet", json)
}

#[derive(Tabled)]
struct CounterRow {
    #[tabled(rename = "PROJECT")]
    project: String,
    #[tabled(rename = "TICKETS")]
    count: u64,
    #[tabled(rename = "LAST KEY")]
    last_key: String,
}

pub fn projects(dir: Option<&Path>, json: bool) -> Result<()> {
    let counters = resolver(dir)?.counters()?;

    if json {
        println!("{}", serde_json::to_string(&counters)?);
    } else if counters.is_empty() {
        println!("No projects yet");
    } else {
        let rows: Vec<_> = counters
            .into_iter()
            .map(|c| CounterRow {
                last_key: jmock_core::TicketKey::compose(&c.project_id, c.count).into_string(),
                project: c.project_id,
                count: c.count,
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    Ok(())
}

pub fn config_show(dir: Option<&Path>, json: bool) -> Result<()> {
    let workspace = open_workspace(dir)?;
    let config = workspace.config();

    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", "Current configuration:".bold());
        println!();
        println!("[storage]");
        println!("backend = \"{}\"", config.storage.backend);
        println!("database = \"{}\"", config.storage.database);
        println!("busy_timeout_ms = {}", config.storage.busy_timeout_ms);
        println!();
        println!("[api]");
        println!("host = \"{}\"", config.api.host);
        println!("port = {}", config.api.port);
    }

    Ok(())
}

pub fn config_path(dir: Option<&Path>) -> Result<()> {
    println!("{}", open_workspace(dir)?.config_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_against_fresh_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Some(dir.path());

        init(dir).unwrap();
        create(dir, "dd", "Deploy failed", "see http://x/abc123", false).unwrap();
        create(dir, "dd", "Deploy failed again", "see http://x/abc124", true).unwrap();
        show(dir, "dd-2", false).unwrap();
        search(dir, "abc123", true).unwrap();
        list(dir, false).unwrap();
        projects(dir, false).unwrap();
        config_show(dir, false).unwrap();

        let tickets = resolver(dir).unwrap().resolve_by_token("http://x/abc12").unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].key, "dd-2");
    }

    #[test]
    fn test_show_unknown_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Some(dir.path());
        init(dir).unwrap();

        let err = show(dir, "dd-1", false).unwrap_err();
        assert_eq!(err.to_string(), "Ticket not found: dd-1");
    }

    #[test]
    fn test_create_rejects_blank_summary() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Some(dir.path());
        init(dir).unwrap();

        let err = create(dir, "dd", " ", "d", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_memory_backend_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Some(dir.path());
        init(dir).unwrap();

        let workspace = open_workspace(dir).unwrap();
        std::fs::write(
            workspace.config_path(),
            "[storage]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let err = create(dir, "dd", "s", "d", false).unwrap_err();
        assert!(err.to_string().contains("does not persist"), "{err}");
        assert!(list(dir, false).is_err());
    }
}
