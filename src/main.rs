use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use etl_stage::database::connection::{get_database_url, open_staging_store};
use etl_stage::database::entities::EntityKind;
use etl_stage::payload::load_rows_from_file;
use etl_stage::remote::HttpMappingServer;
use etl_stage::services::{CommitOutcome, MoveDirection};
use etl_stage::{StageConfig, StagingEngine};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// TOML file overlaid on the ETL_STAGE_* environment settings
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    #[clap(short, long, global = true)]
    database: Option<String>,
    #[clap(long, global = true)]
    server_url: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    /// Replace the local tree with a row file or the server's current rows
    Hydrate {
        #[clap(long, conflicts_with = "remote", required_unless_present = "remote")]
        rows: Option<PathBuf>,
        #[clap(long)]
        remote: bool,
    },
    Status,
    Validate,
    /// Print the pending change-set as JSON
    Diff,
    Delete {
        #[clap(long)]
        kind: String,
        #[clap(long)]
        id: i32,
    },
    MoveField {
        #[clap(long)]
        id: i32,
        #[clap(long, value_enum)]
        direction: Direction,
    },
    Commit,
    /// Discard every pending edit and reload from the server
    Revert {
        #[clap(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for MoveDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => MoveDirection::Up,
            Direction::Down => MoveDirection::Down,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = StageConfig::from_env();
    if let Some(path) = &args.config {
        config = config.with_file(path)?;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(server_url) = args.server_url {
        config.server_url = server_url;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }
    setup_logging(&config.log_level);

    let database_url = get_database_url(Some(&config.database_path));
    let db = open_staging_store(&database_url).await?;
    let engine = StagingEngine::new(db);
    let server = || HttpMappingServer::new(&config.server_url, config.request_timeout);

    match args.command {
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("Staging store ready at {}", config.database_path);
            }
        },
        Commands::Hydrate { rows, remote } => {
            let report = match rows {
                Some(path) if !remote => {
                    info!("Hydrating from {}", path.display());
                    let rows = load_rows_from_file(&path)?;
                    engine.hydrate(&rows).await?
                }
                _ => {
                    info!("Hydrating from {}", config.server_url);
                    engine.hydrate_from(&server()?).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Status => {
            let counts = engine.counts().await?;
            let pending = engine.pending_summary().await?;
            println!(
                "{} services, {} databases, {} tables, {} fields",
                counts.services, counts.databases, counts.tables, counts.fields
            );
            println!(
                "pending: {} deleted, {} updated, {} added",
                pending.deleted, pending.updated, pending.added
            );
        }
        Commands::Validate => {
            let violations = engine.validate().await?;
            if violations.is_empty() {
                println!("No problems found");
            } else {
                for violation in &violations {
                    println!("{}", violation);
                }
                bail!("{} validation problems", violations.len());
            }
        }
        Commands::Diff => {
            let changes = engine.collect_changes().await?;
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }
        Commands::Delete { kind, id } => {
            let mutations = engine.mutations();
            let outcome = match kind.parse::<EntityKind>()? {
                EntityKind::Service => mutations.delete_service(id).await?,
                EntityKind::Database => mutations.delete_database(id).await?,
                EntityKind::Table => mutations.delete_table(id).await?,
                EntityKind::Field => mutations.delete_field(id).await?,
            };
            println!(
                "{} purged, {} tombstoned",
                outcome.purged, outcome.tombstoned
            );
        }
        Commands::MoveField { id, direction } => {
            if !engine.mutations().move_field(id, direction.into()).await? {
                println!("Field {} is already at the edge", id);
            }
        }
        Commands::Commit => match engine.commit(&server()?).await? {
            CommitOutcome::NoChanges => println!("Nothing to commit"),
            CommitOutcome::Committed { summary, .. } => println!(
                "Committed {} deleted, {} updated, {} added",
                summary.deleted, summary.updated, summary.added
            ),
        },
        Commands::Revert { yes } => {
            let report = engine.revert(&server()?, yes).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn setup_logging(log_level: &str) {
    let log_level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
