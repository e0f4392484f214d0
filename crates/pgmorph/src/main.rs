//! pgmorph CLI
//!
//! Command-line tool for dependency-ordered schema dumps and reversible
//! operation batches.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pgmorph::prelude::*;
use pgmorph::snippet;

/// Reversible PostgreSQL schema operations.
#[derive(Parser)]
#[command(name = "pgmorph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string.
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/postgres"
    )]
    database: String,

    /// Target server version for offline SQL generation.
    #[arg(short, long, default_value = "16")]
    target: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the live schema as dependency-ordered canonical snippets.
    Dump {
        /// Emit the operation batch as JSON instead of snippet text.
        #[arg(long)]
        json: bool,
    },

    /// Print forward SQL for a snippet file without executing.
    Sql {
        /// Snippet file to render.
        file: PathBuf,
    },

    /// Print rollback SQL for a snippet file without executing.
    RollbackSql {
        /// Snippet file to invert.
        file: PathBuf,
    },

    /// Parse and validate a snippet file, reporting every rule violation.
    Check {
        /// Snippet file to check.
        file: PathBuf,
    },

    /// Apply a snippet file's operations to the database, in order.
    Apply {
        /// Snippet file to apply.
        file: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll back a snippet file's operations, in reverse order.
    Rollback {
        /// Snippet file to roll back.
        file: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },
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

    let target = ServerVersion::parse(&cli.target)
        .ok_or_else(|| anyhow::anyhow!("unrecognized target version '{}'", cli.target))?;

    match cli.command {
        Commands::Dump { json } => {
            let pool = connect(&cli.database).await?;
            if json {
                let ops = pgmorph::dump::database_operations(&pool).await?;
                println!("{}", serde_json::to_string_pretty(&ops)?);
            } else {
                print!("{}", dump_database(&pool).await?);
            }
        }

        Commands::Sql { file } => {
            for sql in forward_sql(&load(&file)?, target)? {
                println!("{sql};");
            }
        }

        Commands::RollbackSql { file } => {
            for sql in rollback_sql(&load(&file)?, target)? {
                println!("{sql};");
            }
        }

        Commands::Check { file } => {
            let ops = load(&file)?;
            let mut failures = 0;
            for op in &ops {
                for error in op.validate() {
                    failures += 1;
                    println!("{}: {error}", op.label());
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} rule violation(s) in {}", file.display());
            }
            info!(operations = ops.len(), "All operations are well formed");
        }

        Commands::Apply { file, dry_run } => {
            let mut ops = load(&file)?;
            let pool = connect(&cli.database).await?;
            Engine::new(pool).dry_run(dry_run).apply(&mut ops).await?;
        }

        Commands::Rollback { file, dry_run } => {
            let ops = load(&file)?;
            let pool = connect(&cli.database).await?;
            Engine::new(pool).dry_run(dry_run).rollback(&ops).await?;
        }
    }

    Ok(())
}

async fn connect(database: &str) -> anyhow::Result<PgPool> {
    Ok(PgPoolOptions::new()
        .max_connections(5)
        .connect(database)
        .await?)
}

fn load(file: &Path) -> anyhow::Result<Vec<Operation>> {
    let text = std::fs::read_to_string(file)?;
    Ok(snippet::parse(&text)?)
}
