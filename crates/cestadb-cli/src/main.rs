mod categories;
mod db;
mod scrape;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::categories::CategoriesCommands;
use crate::db::DbCommands;
use crate::scrape::ScrapeArgs;

#[derive(Debug, Parser)]
#[command(name = "cestadb")]
#[command(about = "Supermarket catalog scraper and category mapper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one market's catalog and deliver the normalized products
    Scrape(ScrapeArgs),
    /// Review and edit retailer category mappings
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

impl Commands {
    fn verbose(&self) -> bool {
        matches!(self, Commands::Scrape(args) if args.verbose)
    }
}

/// `RUST_LOG` wins over the configured level; `verbose` forces `debug`.
fn init_tracing(log_level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cestadb_core::load_app_config()?;

    let verbose = cli.command.as_ref().is_some_and(Commands::verbose);
    init_tracing(&config.log_level, verbose);

    match cli.command {
        Some(Commands::Scrape(args)) => scrape::run_scrape(&config, &args).await?,
        Some(Commands::Categories { command }) => categories::run(&config, command)?,
        Some(Commands::Db { command }) => db::run(&config, command).await?,
        None => println!("cestadb: pass --help to list commands"),
    }

    Ok(())
}
