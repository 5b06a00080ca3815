//! sqlite-declare CLI
//!
//! Applies a declarative schema file to a SQLite database.

use std::path::PathBuf;

use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use sqlite_declare::prelude::*;

/// Migrate a SQLite database to match a declared schema.
#[derive(Parser)]
#[command(name = "sqlite-declare")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Path to the target schema SQL file.
    schema: PathBuf,

    /// Permit dropping tables and columns the schema no longer declares.
    #[arg(long)]
    allow_deletions: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let schema = std::fs::read_to_string(&cli.schema)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&cli.database)
        .await?;

    let changed = Migrator::new(pool.clone())
        .allow_deletions(cli.allow_deletions)
        .migrate(&schema)
        .await?;

    if changed {
        info!("database migrated");
    } else {
        info!("database already up to date");
    }

    pool.close().await;
    Ok(())
}
