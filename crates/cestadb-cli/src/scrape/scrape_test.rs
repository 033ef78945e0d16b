use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cestadb_categories::MappingStatus;
use cestadb_core::Environment;

use super::*;
use crate::{Cli, Commands};

const TAXONOMY: &str = r#"{
    "categories": [
        {"id": "1", "name": "Despensa", "children": [
            {"id": "1.1", "name": "Aceite", "keywords": ["aceite de oliva", "aceite"]}
        ]}
    ]
}"#;

fn scrape_args(argv: &[&str]) -> ScrapeArgs {
    let argv = ["cestadb", "scrape"].iter().chain(argv).copied();
    match Cli::try_parse_from(argv).unwrap().command {
        Some(Commands::Scrape(args)) => args,
        other => panic!("expected scrape command, got {other:?}"),
    }
}

fn app_config(dir: &Path, base_url: &str, ingest_url: Option<String>) -> AppConfig {
    let markets_path = dir.join("markets.yaml");
    std::fs::write(
        &markets_path,
        format!(
            "markets:\n  - name: mercadona\n    base_url: {base_url}\n    enabled: true\n  \
             - name: dia\n    base_url: https://www.dia.es\n    enabled: false\n"
        ),
    )
    .unwrap();
    let taxonomy_path = dir.join("taxonomy.json");
    std::fs::write(&taxonomy_path, TAXONOMY).unwrap();

    AppConfig {
        env: Environment::Test,
        log_level: "info".to_string(),
        taxonomy_path,
        markets_path,
        mappings_dir: dir.join("mappings"),
        database_url: None,
        ingest_url,
        ingest_batch_size: 2,
        db_max_connections: 1,
        db_min_connections: 0,
        db_acquire_timeout_secs: 1,
        scraper_request_timeout_secs: 5,
        scraper_user_agent: "cestadb-test/0.1".to_string(),
        scraper_max_retries: 0,
        scraper_retry_backoff_base_secs: 0,
        scraper_inter_request_delay_ms: 0,
    }
}

async fn mount_mercadona(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "name": "Aceite, especias y salsas",
                "categories": [
                    {"id": 112, "name": "Aceite, vinagre y sal"},
                    {"id": 118, "name": "Especias"}
                ]
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories/112/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 112,
            "categories": [{
                "id": 420,
                "products": [
                    {"id": "4740", "display_name": "Aceite de oliva virgen extra",
                     "share_url": "/product/4740",
                     "price_instructions": {"unit_price": "8.95", "reference_format": "L"}},
                    {"id": "4741", "display_name": "Aceite de girasol",
                     "price_instructions": {"unit_price": "1.95"}},
                    {"id": "4742", "display_name": "Vinagre de vino",
                     "price_instructions": {"unit_price": "0.65"}}
                ]
            }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories/118/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

#[test]
fn test_flag_sets_default_limits() {
    assert_eq!(scrape_args(&["dia", "--test"]).limits(), (Some(5), Some(3)));
}

#[test]
fn explicit_limits_override_test_defaults() {
    let args = scrape_args(&["dia", "--test", "--categories", "2", "--products", "10"]);
    assert_eq!(args.limits(), (Some(2), Some(10)));
}

#[test]
fn no_limits_without_flags() {
    assert_eq!(scrape_args(&["consum"]).limits(), (None, None));
}

#[test]
fn disabled_market_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path(), "https://tienda.mercadona.es", None);

    let err = market_base_url(&config, Market::Dia).unwrap_err();
    assert!(err.to_string().contains("disabled"), "{err}");
}

#[test]
fn unlisted_market_falls_back_to_default_origin() {
    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path(), "https://tienda.mercadona.es/", None);

    assert_eq!(
        market_base_url(&config, Market::Mercadona).unwrap(),
        "https://tienda.mercadona.es"
    );
    assert_eq!(
        market_base_url(&config, Market::Consum).unwrap(),
        "https://tienda.consum.es"
    );
}

#[tokio::test]
async fn dry_run_maps_categories_and_saves_without_delivering() {
    let server = MockServer::start().await;
    mount_mercadona(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(
        dir.path(),
        &server.uri(),
        Some(format!("{}/ingest", server.uri())),
    );

    run_scrape(&config, &scrape_args(&["mercadona", "--dry-run"]))
        .await
        .unwrap();

    let taxonomy = Arc::new(Taxonomy::load(&config.taxonomy_path).unwrap());
    let mapper = CategoryMapper::open(Market::Mercadona, taxonomy, &config.mappings_dir);
    let record = mapper.get("112").unwrap();
    assert_eq!(record.status, MappingStatus::Auto);
    assert_eq!(record.master_id.as_deref(), Some("1.1"));
    // 118 failed to fetch, so it was never seen.
    assert!(mapper.get("118").is_none());
}

#[tokio::test]
async fn ingest_sink_receives_validated_products_in_batches() {
    let server = MockServer::start().await;
    mount_mercadona(&server).await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1, "new": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(
        dir.path(),
        &server.uri(),
        Some(format!("{}/ingest", server.uri())),
    );

    run_scrape(&config, &scrape_args(&["mercadona", "--products", "3"]))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let posted: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(posted[0]["products"].as_array().unwrap().len(), 2);
    assert_eq!(posted[1]["products"].as_array().unwrap().len(), 1);
    assert_eq!(
        posted[0]["products"][0]["url"],
        format!("{}/product/4740", server.uri())
    );
    assert_eq!(posted[0]["products"][0]["master_category_id"], "1.1");
}

#[tokio::test]
async fn ingest_sink_without_url_is_an_error() {
    let server = MockServer::start().await;
    mount_mercadona(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = app_config(dir.path(), &server.uri(), None);

    let err = run_scrape(&config, &scrape_args(&["mercadona"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("CESTADB_INGEST_URL"), "{err}");
    assert!(PathBuf::from(&config.mappings_dir).join("mercadona.json").exists());
}
