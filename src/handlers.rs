use crate::cache::ValidatedCacheEntry;
use crate::config::Config;
use crate::enrichment::{enrich_company, validate_br_phone, Providers};
use crate::errors::{AppError, ResultExt};
use crate::models::{
    Company, EnrichRequest, MaturityRequest, OutreachRequest, ReceitaCompany, SmartSearchRequest,
};
use crate::scorer::ScoringPolicy;
use crate::services::fetch_website_html;
use crate::storage::{log_provider_call, IntelStorage};
use crate::tech_detector::{detect_technologies, PageContent};
use crate::validation::{domain_of, is_valid_cnpj, normalize_cnpj, normalize_website};
use axum::{
    extract::{Path, State},
    Json,
};
use moka::future::Cache;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use uuid::Uuid;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub providers: Arc<Providers>,
    pub http: reqwest::Client,
    /// ReceitaWS responses by CNPJ, 24h TTL, checksum-validated entries.
    pub receita_cache: Cache<String, String>,
    /// Detected-tech payloads by domain, 1h TTL.
    pub scan_cache: Cache<String, String>,
}

impl AppState {
    fn storage(&self) -> IntelStorage {
        IntelStorage::new(self.pool.clone())
    }
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sales-intel-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/companies/smart-search
///
/// Finds or creates a company record from a CNPJ and/or website.
///
/// # Workflow
///
/// 1. Validate input: a well-formed CNPJ, or a website to discover one from.
/// 2. Return the existing record when the CNPJ is already on file.
/// 3. Otherwise fetch the registry record (cached 24h) and upsert.
///
/// # Returns
/// `{ok: true, company, created}` with the CNPJ stored digits-only.
pub async fn smart_search(
    State(state): State<AppState>,
    Json(payload): Json<SmartSearchRequest>,
) -> Result<Json<Value>, AppError> {
    let website = payload
        .website
        .as_deref()
        .and_then(normalize_website);
    let domain = website.as_deref().and_then(domain_of);

    // Step 1: resolve the CNPJ, discovering it from the website if needed
    let cnpj = match payload.cnpj.as_deref() {
        Some(raw) => {
            let digits = normalize_cnpj(raw);
            if !is_valid_cnpj(&digits) {
                return Err(AppError::InvalidInput(format!("Invalid CNPJ: {}", raw)));
            }
            digits
        }
        None => {
            let domain = domain.as_deref().ok_or_else(|| {
                AppError::BadRequest("Provide a cnpj or a valid website".to_string())
            })?;
            discover_cnpj_by_domain(&state, domain).await?
        }
    };

    // Step 2: short-circuit on an existing record
    let storage = state.storage();
    if let Some(company) = storage
        .find_company_by_cnpj(&cnpj)
        .await
        .context("looking up company by CNPJ")?
    {
        tracing::info!("Smart-search hit existing company {} for {}", company.id, cnpj);
        return Ok(Json(json!({ "ok": true, "company": company, "created": false })));
    }

    // Step 3: registry lookup, then create
    let record = lookup_receita_cached(&state, &cnpj).await?;

    let company = storage
        .upsert_company_by_cnpj(&cnpj, website.as_deref(), domain.as_deref())
        .await
        .context("creating company")?;
    storage
        .apply_registry_data(company.id, &record)
        .await
        .context("applying registry data")?;

    let company = storage
        .get_company(company.id)
        .await?
        .ok_or_else(|| AppError::InternalError("Company vanished after upsert".to_string()))?;

    tracing::info!("✓ Smart-search created company {} for CNPJ {}", company.id, cnpj);
    Ok(Json(json!({ "ok": true, "company": company, "created": true })))
}

/// ReceitaWS lookup with a validated 24h cache in front.
async fn lookup_receita_cached(
    state: &AppState,
    cnpj: &str,
) -> Result<ReceitaCompany, AppError> {
    if let Some(serialized) = state.receita_cache.get(cnpj).await {
        if let Some(data) = ValidatedCacheEntry::deserialize_and_validate(&serialized) {
            if let Ok(record) = serde_json::from_str::<ReceitaCompany>(&data) {
                tracing::debug!("ReceitaWS cache hit for {}", cnpj);
                return Ok(record);
            }
        }
        // Corrupted entry reads as a miss
        state.receita_cache.invalidate(cnpj).await;
    }

    let start = Instant::now();
    let result = state.providers.receita.lookup_cnpj(cnpj).await;
    let elapsed = start.elapsed().as_millis() as u64;

    match &result {
        Ok(record) => {
            log_provider_call(&state.pool, None, "receitaws", "lookup_cnpj", "ok", elapsed);
            if let Ok(data) = serde_json::to_string(record) {
                let entry = ValidatedCacheEntry::new(data);
                state
                    .receita_cache
                    .insert(cnpj.to_string(), entry.serialize())
                    .await;
            }
        }
        Err(_) => {
            log_provider_call(&state.pool, None, "receitaws", "lookup_cnpj", "error", elapsed);
        }
    }

    result
}

/// Discovers a CNPJ for a domain via web search.
///
/// Brazilian companies are required to publish their CNPJ on their
/// sites, so a scoped search usually surfaces it in the snippets.
async fn discover_cnpj_by_domain(state: &AppState, domain: &str) -> Result<String, AppError> {
    static CNPJ_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}").unwrap()
    });

    let query = format!("cnpj site:{}", domain);
    let start = Instant::now();
    let hits = state.providers.serper.search(&query).await;
    let elapsed = start.elapsed().as_millis() as u64;

    let hits = match hits {
        Ok(hits) => {
            log_provider_call(&state.pool, None, "serper", "discover_cnpj", "ok", elapsed);
            hits
        }
        Err(e) => {
            log_provider_call(&state.pool, None, "serper", "discover_cnpj", "error", elapsed);
            return Err(e);
        }
    };

    for hit in &hits {
        let text = format!(
            "{} {}",
            hit.title.as_deref().unwrap_or(""),
            hit.snippet.as_deref().unwrap_or("")
        );
        for m in CNPJ_PATTERN.find_iter(&text) {
            let digits = normalize_cnpj(m.as_str());
            if is_valid_cnpj(&digits) {
                tracing::info!("✓ Discovered CNPJ {} for domain {}", digits, domain);
                return Ok(digits);
            }
        }
    }

    Err(AppError::NotFound(format!(
        "Could not discover a CNPJ for domain {}",
        domain
    )))
}

/// GET /api/v1/companies/:id
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let company = load_company(&state, id).await?;
    let storage = state.storage();
    let tech_signals = storage.list_tech_signals(id).await?;
    let maturity = storage.latest_maturity_rows(id).await?;
    let provider_activity = storage.recent_provider_logs(id, 20).await?;

    Ok(Json(json!({
        "ok": true,
        "company": company,
        "tech_signals": tech_signals,
        "latest_maturity_run": maturity,
        "provider_activity": provider_activity,
    })))
}

/// POST /api/v1/companies/:id/scan-website
///
/// Fetches the company's website and runs the heuristic tech detector
/// over it. Detected technologies are appended as signals.
pub async fn scan_website(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let company = load_company(&state, id).await?;

    let website = company
        .website
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Company has no website on record".to_string()))?;
    let domain = company
        .domain
        .clone()
        .or_else(|| domain_of(website))
        .unwrap_or_else(|| website.to_string());

    // Recently scanned domains reuse the detection result
    let (techs, elapsed_ms) = match state.scan_cache.get(&domain).await {
        Some(cached) => {
            let techs = serde_json::from_str(&cached)
                .map_err(|e| AppError::InternalError(format!("Corrupted scan cache: {}", e)))?;
            tracing::debug!("Scan cache hit for {}", domain);
            (techs, 0u64)
        }
        None => {
            let start = Instant::now();
            let fetched = fetch_website_html(&state.http, website).await;
            let elapsed = start.elapsed().as_millis() as u64;

            let (html, fetch_ms) = match fetched {
                Ok(ok) => {
                    log_provider_call(&state.pool, Some(id), "website", "fetch", "ok", elapsed);
                    ok
                }
                Err(e) => {
                    log_provider_call(&state.pool, Some(id), "website", "fetch", "error", elapsed);
                    return Err(e);
                }
            };

            let content = PageContent::from_html(&html);
            let techs = detect_technologies(&content);

            if let Ok(serialized) = serde_json::to_string(&techs) {
                state.scan_cache.insert(domain.clone(), serialized).await;
            }
            (techs, fetch_ms)
        }
    };

    let added = state
        .storage()
        .insert_tech_signals(id, &techs, "heuristic")
        .await
        .context("persisting tech signals")?;

    tracing::info!(
        "✓ Website scan for company {}: {} technologies, {} new signals",
        id,
        techs.len(),
        added
    );

    Ok(Json(json!({
        "ok": true,
        "company_id": id,
        "technologies": techs,
        "tech_signals_added": added,
        "fetch_elapsed_ms": elapsed_ms,
    })))
}

/// POST /api/v1/companies/:id/enrich
///
/// Runs the orchestrated enrichment workflow: context gate, concurrent
/// provider fan-out, settled persistence.
pub async fn enrich(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EnrichRequest>,
) -> Result<Json<Value>, AppError> {
    let company = load_company(&state, id).await?;
    let storage = state.storage();

    let summary = enrich_company(
        &state.pool,
        &storage,
        &state.providers,
        &company,
        &payload.context,
    )
    .await?;

    Ok(Json(json!({ "ok": true, "summary": summary })))
}

/// POST /api/v1/companies/:id/maturity-score
///
/// Scores the company against the current policy and persists the run.
pub async fn maturity_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MaturityRequest>,
) -> Result<Json<Value>, AppError> {
    let company = load_company(&state, id).await?;
    let storage = state.storage();

    let bundle = storage
        .load_signal_bundle(&company, payload.leads, payload.messages)
        .await
        .context("loading signal bundle")?;

    let report = ScoringPolicy::default_policy().score(&bundle);

    storage
        .insert_maturity_run(id, &report)
        .await
        .context("persisting maturity run")?;

    tracing::info!(
        "✓ Maturity run {} for company {}: {} ({:?})",
        report.run_id,
        id,
        report.overall_score,
        report.classification
    );

    Ok(Json(json!({ "ok": true, "report": report })))
}

/// POST /api/v1/outreach/message
///
/// Dispatches one outreach message over email or WhatsApp.
pub async fn outreach_message(
    State(state): State<AppState>,
    Json(payload): Json<OutreachRequest>,
) -> Result<Json<Value>, AppError> {
    if payload.body.trim().is_empty() {
        return Err(AppError::InvalidInput("Message body cannot be empty".to_string()));
    }

    let start = Instant::now();
    let (provider, result) = match payload.channel.as_str() {
        "email" => {
            let subject = payload
                .subject
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    AppError::InvalidInput("Email messages require a subject".to_string())
                })?;
            (
                "email",
                state
                    .providers
                    .outreach
                    .send_email(&payload.to, subject, &payload.body)
                    .await,
            )
        }
        "whatsapp" => {
            // Normalize before spending the provider call
            let to = validate_br_phone(&payload.to)?;
            (
                "whatsapp",
                state
                    .providers
                    .outreach
                    .send_whatsapp(&to, &payload.body)
                    .await,
            )
        }
        other => {
            return Err(AppError::InvalidInput(format!(
                "Unknown channel: {} (expected email or whatsapp)",
                other
            )));
        }
    };
    let elapsed = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            log_provider_call(&state.pool, None, provider, "send_message", "ok", elapsed);
            Ok(Json(json!({
                "ok": true,
                "lead_id": payload.lead_id,
                "channel": payload.channel,
            })))
        }
        Err(e) => {
            log_provider_call(&state.pool, None, provider, "send_message", "error", elapsed);
            Err(e)
        }
    }
}

async fn load_company(state: &AppState, id: Uuid) -> Result<Company, AppError> {
    state
        .storage()
        .get_company(id)
        .await
        .context("loading company")?
        .ok_or_else(|| AppError::NotFound(format!("Company {} not found", id)))
}
