use std::path::PathBuf;

use clap::{Parser, Subcommand};
use noesis_db::{MigrationError, Migrator};
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "noesis-migrate",
    version,
    about = "Runs PostgreSQL schema migrations for the adaptive assessment kernel."
)]
struct Cli {
    /// PostgreSQL connection string. May also be supplied via DATABASE_URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Migrations directory (default: this crate's `migrations/`).
    #[arg(long)]
    migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Applies every pending migration.
    Up,

    /// Rolls back applied migrations (default: 1 step).
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Prints applied/pending status for every migration.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), MigrationError> {
    init_tracing();
    let cli = Cli::parse();
    let pool = connect_pool(&cli.database_url).await?;
    let migrator = match cli.migrations_dir {
        Some(dir) => Migrator::with_directory(pool, dir),
        None => Migrator::new(pool),
    };

    match cli.command {
        Command::Up => {
            info!("applying pending migrations");
            migrator.run_migrations().await?;
        }
        Command::Down { steps } => {
            info!(steps, "rolling back migrations");
            for _ in 0..steps {
                if migrator.rollback_last().await?.is_none() {
                    break;
                }
            }
        }
        Command::Status => {
            let status = migrator.status().await?;
            for entry in status {
                println!("{entry}");
            }
        }
    }

    Ok(())
}

async fn connect_pool(database_url: &str) -> Result<PgPool, MigrationError> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
