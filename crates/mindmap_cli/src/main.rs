//! Operator entry point for the map store.
//!
//! # Responsibility
//! - Wire configuration, logging and the SQLite store together.
//! - Expose externally scheduled operations (retention sweep) and a few
//!   inspection helpers.

use clap::{Parser, Subcommand};
use log::{error, info};
use mindmap_core::db::open_db;
use mindmap_core::{
    init_logging, CoreConfig, MapService, NodeContent, RootNodeSpec, SqliteMapRepository,
    SqliteNodeRepository,
};
use std::error::Error;
use std::path::PathBuf;
use std::process;

const DEFAULT_DB_FILE_NAME: &str = "mindmap.sqlite3";

/// Mind map store maintenance
#[derive(Parser)]
#[command(name = "mindmap", version = mindmap_core::core_version())]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML); environment `MINDMAP__*` still applies
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides `database_path` from config)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Delete maps idle for longer than the retention window
    Sweep {
        /// Retention window in days (defaults to `delete_after_days`)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Print one map in client JSON form
    Export {
        /// Map UUID
        uuid: String,
    },
    /// Create an empty map and print its id
    Create {
        /// Name of the root node; without it the map starts empty
        #[arg(long)]
        root_name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match CoreConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };
    if let Err(err) = init_logging(&config.logging) {
        eprintln!("failed to initialize logging: {err}");
        process::exit(2);
    }

    match run(&cli, config) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli, config: CoreConfig) -> Result<String, Box<dyn Error>> {
    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME));
    let conn = open_db(&db_path)?;
    let service = MapService::new(
        SqliteMapRepository::try_new(&conn)?,
        SqliteNodeRepository::try_new(&conn)?,
        config,
    );

    match &cli.command {
        Command::Sweep { days } => {
            let days = days.unwrap_or_else(|| service.delete_after_days());
            let deleted = service.delete_outdated_maps(days)?;
            info!("event=cli_command module=cli status=ok command=sweep deleted={deleted}");
            Ok(format!("deleted {deleted} outdated map(s)"))
        }
        Command::Export { uuid } => {
            let client_map = service.export_map_to_client(uuid)?;
            Ok(serde_json::to_string_pretty(&client_map)?)
        }
        Command::Create { root_name } => {
            let root = root_name.as_ref().map(|name| RootNodeSpec {
                id: None,
                content: NodeContent {
                    name: Some(name.clone()),
                    ..NodeContent::default()
                },
            });
            let map = service.create_empty_map(root)?;
            Ok(map.id.to_string())
        }
    }
}
