//! Database maintenance commands.

use clap::Subcommand;

use cestadb_categories::Taxonomy;
use cestadb_core::AppConfig;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending schema migrations
    Migrate,
    /// Upsert the canonical taxonomy into `master_categories`
    SeedTaxonomy,
}

pub(crate) async fn run(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = cestadb_db::connect_pool_from_config(config).await?;

    match command {
        DbCommands::Ping => {
            cestadb_db::ping(&pool).await?;
            println!("database connection ok");
        }
        DbCommands::Migrate => {
            let applied = cestadb_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::SeedTaxonomy => {
            let taxonomy = Taxonomy::load(&config.taxonomy_path)?;
            let seeded = cestadb_db::seed_master_categories(&pool, &taxonomy).await?;
            println!("seeded {seeded} master categories");
        }
    }

    pool.close().await;
    Ok(())
}
