//! jmock - mock issue tracker
//!
//! Tickets live in .jmock/ next to the project using them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "jmock")]
#[command(about = "Mock issue tracker with project-scoped ticket keys")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Directory to start the workspace search from
    #[arg(long, global = true, env = "JMOCK_DIR")]
    dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new jmock workspace
    Init,

    /// Create a ticket under the next key of a project
    Create {
        /// Project id (keys become <project>-<n>)
        project: String,

        /// Ticket summary
        summary: String,

        /// Description; end it with the correlation URL
        description: String,
    },

    /// Show a ticket by key
    Show {
        /// Ticket key (e.g. dd-1)
        key: String,
    },

    /// Find tickets whose description contains a token
    Search {
        /// Case-sensitive substring
        token: String,
    },

    /// List all tickets, newest first
    List,

    /// Show per-project ticket counters
    Projects,

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file path
    Path,
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let dir = cli.dir.as_deref();

    match cli.command {
        Commands::Init => commands::init(dir),
        Commands::Create {
            project,
            summary,
            description,
        } => commands::create(dir, &project, &summary, &description, cli.json),
        Commands::Show { key } => commands::show(dir, &key, cli.json),
        Commands::Search { token } => commands::search(dir, &token, cli.json),
        Commands::List => commands::list(dir, cli.json),
        Commands::Projects => commands::projects(dir, cli.json),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config_show(dir, cli.json),
            Some(ConfigCommands::Path) => commands::config_path(dir),
        },
    }
}
