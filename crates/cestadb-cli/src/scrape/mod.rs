//! The `scrape` command: collect one market's catalog, map its categories,
//! and hand the normalized products to a sink.
//!
//! Categories are processed one at a time with the configured inter-request
//! delay between them. A category that fails to fetch is logged and counted;
//! the run only fails outright when every category failed.

mod sink;

use std::sync::Arc;
use std::time::Instant;

use clap::{Args, ValueEnum};

use cestadb_categories::{CategoryMapper, Taxonomy};
use cestadb_core::{AppConfig, Market, NormalizedProduct, RetailerCategory};
use cestadb_scraper::sources::{default_base_url, MarketSource};
use cestadb_scraper::{normalize_product, validate_products, CatalogSource, HttpClient};

const TEST_CATEGORY_LIMIT: usize = 5;
const TEST_PRODUCT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// POST batches to `CESTADB_INGEST_URL`
    Ingest,
    /// Upsert into Postgres at `DATABASE_URL`
    Db,
}

#[derive(Debug, Args)]
pub struct ScrapeArgs {
    /// Market to scrape (mercadona, dia, consum)
    pub market: Market,

    /// Small smoke run: 5 categories with 3 products each unless overridden
    #[arg(long)]
    pub test: bool,

    /// Maximum number of categories to process
    #[arg(long)]
    pub categories: Option<usize>,

    /// Maximum number of products kept per category
    #[arg(long)]
    pub products: Option<usize>,

    /// Scrape and map without delivering products
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum, default_value_t = SinkKind::Ingest)]
    pub sink: SinkKind,

    /// Force debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ScrapeArgs {
    /// `(category_limit, product_limit)`; explicit flags win over `--test`.
    fn limits(&self) -> (Option<usize>, Option<usize>) {
        let test_default = |limit| self.test.then_some(limit);
        (
            self.categories.or_else(|| test_default(TEST_CATEGORY_LIMIT)),
            self.products.or_else(|| test_default(TEST_PRODUCT_LIMIT)),
        )
    }
}

/// Products scraped from one retailer category, with its resolved master id.
pub(crate) struct CategoryBatch {
    pub category: RetailerCategory,
    pub master_id: Option<String>,
    pub products: Vec<NormalizedProduct>,
}

/// Resolve the API origin for `market`, rejecting markets disabled in the
/// markets file.
fn market_base_url(config: &AppConfig, market: Market) -> anyhow::Result<String> {
    let markets = cestadb_core::load_markets(&config.markets_path)?;
    match markets.get(market) {
        Some(entry) if !entry.enabled => {
            anyhow::bail!(
                "market '{market}' is disabled in {}",
                config.markets_path.display()
            )
        }
        Some(entry) => Ok(entry.origin().to_string()),
        None => {
            tracing::warn!(
                market = %market,
                "market not listed in markets file; using default base url"
            );
            Ok(default_base_url(market).to_string())
        }
    }
}

pub(crate) async fn run_scrape(config: &AppConfig, args: &ScrapeArgs) -> anyhow::Result<()> {
    let started = Instant::now();
    let market = args.market;
    let (category_limit, product_limit) = args.limits();

    let base_url = market_base_url(config, market)?;
    let taxonomy = Arc::new(Taxonomy::load(&config.taxonomy_path)?);
    let mut mapper = CategoryMapper::open(market, taxonomy, &config.mappings_dir);

    let client = HttpClient::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
    let source = MarketSource::new(market, client.clone(), &base_url);

    let mut categories = source.fetch_categories().await?;
    if categories.is_empty() {
        anyhow::bail!("no categories returned for {market}");
    }
    if let Some(limit) = category_limit {
        categories.truncate(limit);
    }
    tracing::info!(market = %market, categories = categories.len(), "scraping categories");

    let mut batches: Vec<CategoryBatch> = Vec::with_capacity(categories.len());
    let mut failed_categories: usize = 0;

    for (idx, category) in categories.into_iter().enumerate() {
        if idx > 0 {
            client.pause().await;
        }

        let raw_products = match source.fetch_category_products(&category).await {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(
                    market = %market,
                    source_id = %category.id,
                    category = %category,
                    error = %e,
                    "category fetch failed"
                );
                failed_categories += 1;
                continue;
            }
        };

        let master_id = mapper.get_master_category(&category, true);
        let products: Vec<NormalizedProduct> = raw_products
            .into_iter()
            .take(product_limit.unwrap_or(usize::MAX))
            .filter_map(|raw| normalize_product(raw, &category, market, &mut mapper))
            .collect();

        tracing::debug!(
            market = %market,
            source_id = %category.id,
            master_id = master_id.as_deref().unwrap_or("-"),
            products = products.len(),
            "category processed"
        );
        batches.push(CategoryBatch {
            category,
            master_id,
            products,
        });
    }

    if let Err(e) = mapper.save() {
        tracing::error!(market = %market, error = %e, "failed to save mappings");
    }

    if batches.is_empty() {
        anyhow::bail!("all {failed_categories} categories failed for {market}");
    }

    let total: usize = batches.iter().map(|b| b.products.len()).sum();
    for batch in &mut batches {
        batch.products = validate_products(std::mem::take(&mut batch.products), &base_url);
    }
    let valid: usize = batches.iter().map(|b| b.products.len()).sum();

    let stats = mapper.stats();
    tracing::info!(
        market = %market,
        processed = batches.len(),
        failed = failed_categories,
        total,
        valid,
        duration_secs = started.elapsed().as_secs_f64(),
        mapped_auto = stats.auto,
        mapped_confirmed = stats.confirmed,
        pending = stats.pending,
        rejected = stats.rejected,
        "scrape complete"
    );

    if args.dry_run {
        println!(
            "dry-run: {valid} valid products from {} categories of {market}; nothing delivered",
            batches.len()
        );
        return Ok(());
    }

    let report = match args.sink {
        SinkKind::Ingest => sink::deliver_ingest(config, client, &batches).await?,
        SinkKind::Db => sink::deliver_db(config, market, &batches).await?,
    };
    println!(
        "{market}: {} sent, {} new, {} updated, {} unchanged, {} failed",
        report.count, report.new, report.updated, report.unchanged, report.failed
    );

    Ok(())
}

#[cfg(test)]
#[path = "scrape_test.rs"]
mod tests;
