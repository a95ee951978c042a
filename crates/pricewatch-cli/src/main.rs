mod harvest;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch")]
#[command(about = "Kroger price harvesting pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one harvest pass over the active stores.
    Harvest {
        /// Harvest date (YYYY-MM-DD); defaults to today in UTC.
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        /// Override the date-derived shard; wrapped modulo the bucket count.
        #[arg(long)]
        shard_index: Option<u32>,
        /// Fetch and normalize, but skip every database write.
        #[arg(long)]
        dry_run: bool,
    },
    /// Database utilities.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Credential utilities.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Verify database connectivity.
    Ping,
    /// Apply pending migrations.
    Migrate,
}

#[derive(Debug, Subcommand)]
enum AuthCommands {
    /// Exchange client credentials for a token and report its lifetime.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("no command given; run with --help to see commands");
        return Ok(());
    };

    let config = pricewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Harvest {
            date,
            shard_index,
            dry_run,
        } => {
            harvest::run_harvest(
                &config,
                harvest::HarvestOptions {
                    date,
                    shard_index,
                    dry_run,
                },
            )
            .await?;
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let pool = pricewatch_db::connect_pool_from_config(&config).await?;
            pricewatch_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let pool = pricewatch_db::connect_pool_from_config(&config).await?;
            let applied = pricewatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Auth {
            command: AuthCommands::Check,
        } => {
            let tokens = harvest::build_token_manager(&config)?;
            tokens.current().await?;
            if let Some(status) = tokens.status().await {
                println!(
                    "credentials ok: {} token, ~{}s until refresh is due",
                    status.token_type, status.expires_in_secs
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
