//! End-to-end: seeded SQLite store → service → calculator.

use chrono::Utc;
use customs_db::demo::seed_demo;
use customs_db::{Database, DbConfig};
use customs_service::{CustomsCalculator, CustomsService, ErrorCategory, ServiceConfig};
use tempfile::TempDir;

async fn seeded_config() -> (TempDir, ServiceConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customs.db");

    let db = Database::new(DbConfig::new(path.clone())).await.unwrap();
    seed_demo(&db, Utc::now().date_naive()).await.unwrap();
    db.close().await;

    let mut config = ServiceConfig::default();
    config.database.path = path;
    (dir, config)
}

const LAPTOP: &str = r#"{
    "classification_code": "8471.30.00",
    "transaction_type": "commercial-cargo",
    "package_type": "general",
    "product_price": "1000.00",
    "product_currency": "USD",
    "freight_charges": "100.00",
    "freight_currency": "USD",
    "mode_of_transportation": "air"
}"#;

#[tokio::test]
async fn calculates_against_seeded_store() {
    let (_dir, config) = seeded_config().await;
    let service = CustomsService::open(&config).await.unwrap();

    let raw = CustomsCalculator::parse_request(LAPTOP).unwrap();
    let response = service.calculator().calculate(&raw).await.unwrap();

    // CIF 1111 USD at 156.25 = 173 593.75 JMD
    assert_eq!(response.cif_details.cif.local, "173593.75");
    // Duty-free: ID-01 runs at 0% and is left out of the charge maps.
    assert!(!response.charges.contains_key("ID-01"));
    assert!(!response.tax_rates.contains_key("ID-01"));
    assert!(response.line_items.iter().any(|item| item.name == "ID-01"));
    assert_eq!(response.charges["SCF90"], "520.78");
    assert_eq!(response.charges["ENVL20"], "867.97");
    assert_eq!(response.charges["CAF"], "10000.00");
    // 15% of 184 982.50
    assert_eq!(response.charges["GCT"], "27747.38");
    assert_eq!(response.total_custom_charges, "39136.13");
    assert_eq!(response.tax_rates["CAF"], None);

    let summary = service.summary().await.unwrap();
    assert_eq!(response.snapshot_id, summary.id.to_string());
    assert_eq!(summary.local_currency, "JMD");

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn cif_only_skips_charge_fields() {
    let (_dir, config) = seeded_config().await;
    let service = CustomsService::open(&config).await.unwrap();

    let raw = CustomsCalculator::parse_request(
        r#"{"product_price": 500, "product_currency": "GBP",
            "freight_charges": 0, "freight_currency": "GBP",
            "mode_of_transportation": "ocean"}"#,
    )
    .unwrap();
    let cif = service.calculator().calculate_cif(&raw).await.unwrap();

    assert_eq!(cif.product_currency, "GBP");
    assert_eq!(cif.insurance.original, "7.50");
    assert_eq!(cif.cif.original, "507.50");

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn empty_store_starts_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.database.path = dir.path().join("empty.db");

    let service = CustomsService::open(&config).await.unwrap();
    assert!(!service.store().is_loaded().await);

    let raw = CustomsCalculator::parse_request(LAPTOP).unwrap();
    let err = service.calculator().calculate(&raw).await.unwrap_err();
    assert_eq!(err.code, ErrorCategory::ServiceUnavailable);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn background_refresh_stops_cleanly() {
    let (_dir, config) = seeded_config().await;
    let mut service = CustomsService::open(&config).await.unwrap();
    service.start_refresh();

    let raw = CustomsCalculator::parse_request(LAPTOP).unwrap();
    assert!(service.calculator().calculate(&raw).await.is_ok());

    service.shutdown().await.unwrap();
}
