//! Category-mapping review commands.
//!
//! Every command opens the market's mapping file through a
//! [`CategoryMapper`]; commands that edit a record save it before returning.

use std::sync::Arc;

use clap::Subcommand;

use cestadb_categories::{CategoryMapper, CategoryMapping, MappingStats, Taxonomy};
use cestadb_core::{AppConfig, Market};

const MAX_SUGGESTIONS: usize = 3;
const MAX_LEAVES_LISTED: usize = 10;

#[derive(Debug, Subcommand)]
pub enum CategoriesCommands {
    /// List retailer categories waiting for review
    Pending { market: Market },
    /// Show mapping counts by status
    Stats { market: Market },
    /// Confirm a retailer category as mapping to a master category
    Map {
        market: Market,
        source_id: String,
        master_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark a retailer category as having no master category
    Reject {
        market: Market,
        source_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Print the top two levels of the master taxonomy
    Taxonomy,
    /// Search master categories by name or keyword
    Search {
        query: String,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

pub(crate) fn run(config: &AppConfig, command: CategoriesCommands) -> anyhow::Result<()> {
    let taxonomy = Arc::new(Taxonomy::load(&config.taxonomy_path)?);
    let open = |market: Market| {
        CategoryMapper::open(market, Arc::clone(&taxonomy), &config.mappings_dir)
    };

    match command {
        CategoriesCommands::Pending { market } => {
            let mapper = open(market);
            let pending = mapper.get_pending();
            if pending.is_empty() {
                println!("no pending mappings for {market}");
            } else {
                print!("{}", render_pending(&taxonomy, &pending));
            }
        }
        CategoriesCommands::Stats { market } => {
            let mapper = open(market);
            print!("{}", render_stats(market, &mapper.stats()));
        }
        CategoriesCommands::Map {
            market,
            source_id,
            master_id,
            notes,
        } => {
            if taxonomy.get(&master_id).is_none() {
                eprintln!("error: master category '{master_id}' not found");
                eprint!("{}", render_leaves(&taxonomy, MAX_LEAVES_LISTED));
                anyhow::bail!("unknown master category '{master_id}'");
            }
            let mut mapper = open(market);
            mapper.confirm(&source_id, &master_id, notes)?;
            mapper.save()?;
            println!(
                "mapped {source_id} -> {master_id} ({})",
                taxonomy.path(&master_id)
            );
        }
        CategoriesCommands::Reject {
            market,
            source_id,
            notes,
        } => {
            let mut mapper = open(market);
            mapper.reject(&source_id, notes)?;
            mapper.save()?;
            println!("rejected {source_id}");
        }
        CategoriesCommands::Taxonomy => print!("{}", render_taxonomy(&taxonomy)),
        CategoriesCommands::Search { query, limit } => {
            let results = taxonomy.search(&query, limit);
            if results.is_empty() {
                println!("no master categories match '{query}'");
            }
            for category in results {
                println!("{:<8} {}", category.id, taxonomy.path(&category.id));
            }
        }
    }

    Ok(())
}

fn render_pending(taxonomy: &Taxonomy, pending: &[&CategoryMapping]) -> String {
    let mut lines = Vec::new();
    for record in pending {
        lines.push(format!("{}  {}", record.source_id, record.source_path));
        lines.extend(
            record
                .suggestions
                .iter()
                .take(MAX_SUGGESTIONS)
                .map(|id| format!("    -> {id:<8} {}", taxonomy.path(id))),
        );
    }
    lines.push(format!("{} pending", pending.len()));
    to_block(&lines)
}

fn render_stats(market: Market, stats: &MappingStats) -> String {
    to_block(&[
        market.to_string(),
        format!("  confirmed: {}", stats.confirmed),
        format!("  auto:      {}", stats.auto),
        format!("  pending:   {}", stats.pending),
        format!("  rejected:  {}", stats.rejected),
        format!("  total:     {}", stats.total()),
    ])
}

fn render_leaves(taxonomy: &Taxonomy, limit: usize) -> String {
    let mut lines = vec!["available leaf categories:".to_string()];
    lines.extend(
        taxonomy
            .leaves()
            .into_iter()
            .take(limit)
            .map(|leaf| format!("  {:<8} {}", leaf.id, taxonomy.path(&leaf.id))),
    );
    to_block(&lines)
}

fn render_taxonomy(taxonomy: &Taxonomy) -> String {
    let mut lines = Vec::new();
    for root in taxonomy.roots() {
        lines.push(format!("{} {}", root.id, root.name));
        lines.extend(
            taxonomy
                .children(&root.id)
                .into_iter()
                .map(|child| format!("  {} {}", child.id, child.name)),
        );
    }
    to_block(&lines)
}

/// Newline-terminated block, empty when there are no lines.
fn to_block(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}
