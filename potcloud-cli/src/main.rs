mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "potcloud")]
#[command(about = "POT CLOUD - shared pot ledger for two synchronized displays")]
#[command(version)]
struct Cli {
    /// Data directory for the room database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Table config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a table as host or remote
    Play {
        /// Room name; asked for when omitted
        #[arg(short, long)]
        room: Option<String>,
        /// Host the room (authoritative ledger)
        #[arg(long, conflicts_with = "join")]
        host: bool,
        /// Join the room as a remote
        #[arg(long)]
        join: bool,
        /// Where room data lives
        #[arg(short, long, value_enum, default_value_t = commands::BackendKind::Sqlite)]
        backend: commands::BackendKind,
        /// Room database file (defaults to <data-dir>/potcloud.db)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show a room's published state and queued commands
    Inspect {
        /// Room name
        #[arg(short, long)]
        room: String,
        /// Room database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete everything stored under a room
    Clear {
        /// Room name
        #[arg(short, long)]
        room: String,
        /// Room database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging, kept off stdout so it does not tear the table
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "potcloud={},potcloud_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut cli_config = CliConfig::default();
    if let Some(data_dir) = cli.data_dir {
        cli_config.data_dir = data_dir;
    }

    // Ensure data directory exists
    tokio::fs::create_dir_all(&cli_config.data_dir).await?;

    let table_config = cli_config.table_config(cli.config.as_deref())?;

    // Execute command
    let result = match cli.command {
        Commands::Play {
            room,
            host,
            join,
            backend,
            db,
        } => {
            let role = match (host, join) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let db_path = db.unwrap_or_else(|| cli_config.db_path());
            commands::play(table_config, backend, &db_path, room, role).await
        }
        Commands::Inspect { room, db } => {
            let db_path = db.unwrap_or_else(|| cli_config.db_path());
            commands::inspect_room(&db_path, &room).await
        }
        Commands::Clear { room, db, yes } => {
            let db_path = db.unwrap_or_else(|| cli_config.db_path());
            commands::clear_room(&db_path, &room, yes).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
