//! # sane CLI
//!
//! The `sane` binary normalizes YouTube channel records and keeps them in a
//! local SQLite store.
//!
//! ## Usage
//!
//! ```bash
//! sane --config ./config/sane.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sane init` | Create the SQLite database and the channel table |
//! | `sane ingest <file>` | Ingest records from a JSON file (`--format json\|list\|map`) |
//! | `sane sync` | Ingest every subscription from SaneAPI |
//! | `sane channel --id <id>` | Fetch, store, and print one channel from SaneAPI |
//! | `sane list` | List stored channels |
//! | `sane get <id>` | Show one stored channel |
//! | `sane query "<sql>"` | Run SQL against the store, tab-separated output |
//!
//! Diagnostics go to stderr; set `RUST_LOG=debug` to see store activity.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use sane_ingest::config::{self, Config};
use sane_ingest::ingest::{self, SourceFormat};
use sane_ingest::remote::ChannelQuery;
use sane_ingest::{channels, logging, migrate, query};

const DEFAULT_CONFIG: &str = "./config/sane.toml";
const DEFAULT_DB: &str = "./data/sane.sqlite";

/// sane: ingest YouTube channel records into a local SQLite store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, `./config/sane.toml` is used if it exists, otherwise
/// the store lives at `./data/sane.sqlite`.
#[derive(Parser)]
#[command(
    name = "sane",
    about = "Normalize YouTube channel records and keep them in a local SQLite store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest records from a JSON file.
    ///
    /// Aborted records are reported and skipped; everything else is stored,
    /// replacing rows with the same channel id.
    Ingest {
        /// Input file.
        file: PathBuf,

        /// Shape of the records in the file.
        #[arg(long, value_enum, default_value_t = SourceFormat::Json)]
        format: SourceFormat,
    },

    /// Ingest every subscription from SaneAPI.
    Sync,

    /// Fetch a single channel from SaneAPI, store it, and print it as JSON.
    Channel {
        #[arg(long, conflicts_with = "username", required_unless_present = "username")]
        id: Option<String>,

        #[arg(long)]
        username: Option<String>,
    },

    /// List stored channels.
    List,

    /// Show one stored channel.
    Get {
        /// Channel id (`UC...`).
        id: String,
    },

    /// Run SQL against the store and print the rows.
    Query {
        sql: String,
    },
}

fn resolve_config(path: &Path) -> anyhow::Result<Config> {
    // Use config if available, otherwise a minimal default
    if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        return Ok(Config::minimal(DEFAULT_DB));
    }
    config::load_config(path)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = resolve_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg)?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, format } => {
            ingest::run_ingest(&cfg, &file, format)?;
        }
        Commands::Sync => {
            ingest::run_sync(&cfg)?;
        }
        Commands::Channel { id, username } => {
            let query = match (id, username) {
                (Some(id), _) => ChannelQuery::Id(id),
                (None, Some(username)) => ChannelQuery::Username(username),
                (None, None) => bail!("either --id or --username is required"),
            };
            ingest::run_channel(&cfg, &query)?;
        }
        Commands::List => {
            channels::run_list(&cfg)?;
        }
        Commands::Get { id } => {
            channels::run_get(&cfg, &id)?;
        }
        Commands::Query { sql } => {
            query::run_query(&cfg, &sql)?;
        }
    }

    Ok(())
}
