use std::env;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use moka::future::Cache;
use sales_intel_api::config::Config;
use sales_intel_api::db::Database;
use sales_intel_api::enrichment::Providers;
use sales_intel_api::handlers::{self, AppState};
use sales_intel_api::models::SmartSearchRequest;
use sales_intel_api::storage::IntelStorage;
use uuid::Uuid;

/// Integration smoke test for the company upsert path.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn company_upsert_is_idempotent_per_cnpj() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = IntelStorage::new(db.pool.clone());

    // Unique CNPJ-shaped value to avoid conflicts on repeated runs.
    let cnpj = format!("99{:012}", Uuid::new_v4().as_u128() % 1_000_000_000_000);

    let first = storage
        .upsert_company_by_cnpj(&cnpj, Some("https://acme.com.br"), Some("acme.com.br"))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let second = storage
        .upsert_company_by_cnpj(&cnpj, None, None)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Two calls for one CNPJ must resolve to the same row
    assert_eq!(first.id, second.id);
    assert_eq!(second.cnpj, cnpj);
    // The second call must not blank out fields the first call set
    assert_eq!(second.website.as_deref(), Some("https://acme.com.br"));

    Ok(())
}

/// Builds an AppState over a lazy pool: nothing connects until a query
/// runs, so validation-rejection paths can be exercised without a database.
fn lazy_state() -> AppState {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgresql://localhost/unused")
        .unwrap();
    let config = Config::for_tests("http://127.0.0.1:1".to_string());

    AppState {
        pool,
        providers: Arc::new(Providers::new(&config)),
        config: Arc::new(config),
        http: reqwest::Client::new(),
        receita_cache: Cache::builder().build(),
        scan_cache: Cache::builder().build(),
    }
}

#[tokio::test]
async fn smart_search_rejects_malformed_cnpj_with_422() {
    let err = handlers::smart_search(
        State(lazy_state()),
        Json(SmartSearchRequest {
            cnpj: Some("12.345.678/0001-00".to_string()),
            website: None,
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "INVALID_INPUT");
    assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn smart_search_requires_cnpj_or_website() {
    let err = handlers::smart_search(
        State(lazy_state()),
        Json(SmartSearchRequest {
            cnpj: None,
            website: None,
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "BAD_REQUEST");
}

#[tokio::test]
async fn maturity_score_for_unknown_company_is_404_shaped() {
    // The lazy pool refuses to connect, which surfaces as a database
    // error rather than a silent success for a nonexistent company.
    let result = handlers::maturity_score(
        State(lazy_state()),
        Path(Uuid::new_v4()),
        Json(Default::default()),
    )
    .await;

    assert!(result.is_err());
}
