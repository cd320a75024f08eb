use crate::config::Config;
use crate::context::{check_enrichment_allowed, ContextHints};
use crate::errors::AppError;
use crate::models::{Company, EnrichmentSummary};
use crate::services::{
    ApolloService, BuiltWithService, OutreachService, ReceitaWsService, SerperService,
};
use crate::storage::{log_provider_call, IntelStorage};
use sqlx::PgPool;
use std::time::Instant;

/// All outbound provider clients, built once at startup and shared.
pub struct Providers {
    pub receita: ReceitaWsService,
    pub apollo: ApolloService,
    pub serper: SerperService,
    pub builtwith: BuiltWithService,
    pub outreach: OutreachService,
}

impl Providers {
    pub fn new(config: &Config) -> Self {
        Self {
            receita: ReceitaWsService::new(config),
            apollo: ApolloService::new(config),
            serper: SerperService::new(config),
            builtwith: BuiltWithService::new(config),
            outreach: OutreachService::new(config),
        }
    }
}

/// Validates and normalizes a Brazilian phone number to E.164.
///
/// # Arguments
/// * `phone` - Raw phone string, with or without country code
///
/// # Returns
/// The E.164 form (e.g. "+5511999998888"), or InvalidInput.
pub fn validate_br_phone(phone: &str) -> Result<String, AppError> {
    let parsed = phonenumber::parse(Some(phonenumber::country::Id::BR), phone)
        .map_err(|_| AppError::InvalidInput(format!("Invalid phone number: {}", phone)))?;

    if !phonenumber::is_valid(&parsed) {
        return Err(AppError::InvalidInput(format!(
            "Phone number is not a valid Brazilian number: {}",
            phone
        )));
    }

    Ok(parsed
        .format()
        .mode(phonenumber::Mode::E164)
        .to_string())
}

/// Runs the full enrichment workflow for a company.
///
/// # Workflow
///
/// 1. Context gate - classify the caller's context and deny unknowns.
/// 2. Fan out to all configured providers concurrently.
/// 3. Settle every branch: a failed provider is recorded, never fatal.
/// 4. Persist what succeeded and mark the company enriched.
///
/// The call fails as a whole only when the context is denied or the
/// database itself rejects the writes.
pub async fn enrich_company(
    pool: &PgPool,
    storage: &IntelStorage,
    providers: &Providers,
    company: &Company,
    hints: &ContextHints,
) -> Result<EnrichmentSummary, AppError> {
    // Step 1: context gate
    let validation = check_enrichment_allowed(hints);
    if !validation.allowed {
        tracing::warn!(
            "❌ Enrichment denied for company {} (context {:?}): {}",
            company.id,
            validation.context,
            validation.reason.as_deref().unwrap_or("no reason")
        );
        return Err(AppError::ContextDenied(
            validation
                .reason
                .unwrap_or_else(|| "Enrichment not allowed in this context".to_string()),
        ));
    }

    tracing::info!(
        "Starting enrichment for company {} (context {:?})",
        company.id,
        validation.context
    );

    let domain = company.domain.as_deref();
    let search_name = company
        .trade_name
        .as_deref()
        .or(company.legal_name.as_deref());

    // Step 2: fan out to providers concurrently
    let receita_fut = async {
        let start = Instant::now();
        let result = providers.receita.lookup_cnpj(&company.cnpj).await;
        (result, start.elapsed().as_millis() as u64)
    };
    let apollo_fut = async {
        let start = Instant::now();
        let result = match domain {
            Some(d) => {
                let org = providers.apollo.enrich_organization(d).await;
                match org {
                    Ok(org) => {
                        // People search piggybacks on a successful org hit
                        let people = providers.apollo.search_people(d).await.unwrap_or_default();
                        Ok((org, people))
                    }
                    Err(e) => Err(e),
                }
            }
            None => Err(AppError::BadRequest("No domain on record".to_string())),
        };
        (result, start.elapsed().as_millis() as u64)
    };
    let serper_fut = async {
        let start = Instant::now();
        let result = match search_name {
            Some(name) => providers.serper.search(&format!("\"{}\" empresa", name)).await,
            None => match domain {
                Some(d) => providers.serper.search(&format!("site:{}", d)).await,
                None => Err(AppError::BadRequest("Nothing to search for".to_string())),
            },
        };
        (result, start.elapsed().as_millis() as u64)
    };
    let builtwith_fut = async {
        let start = Instant::now();
        let result = match (providers.builtwith.is_configured(), domain) {
            (true, Some(d)) => providers.builtwith.lookup_domain(d).await,
            (false, _) => Err(AppError::ProviderDown(
                "BuiltWith not configured".to_string(),
            )),
            (_, None) => Err(AppError::BadRequest("No domain on record".to_string())),
        };
        (result, start.elapsed().as_millis() as u64)
    };

    let ((receita, receita_ms), (apollo, apollo_ms), (serper, serper_ms), (builtwith, builtwith_ms)) =
        tokio::join!(receita_fut, apollo_fut, serper_fut, builtwith_fut);

    // Step 3: settle each branch independently
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut tech_signals_added = 0usize;

    match receita {
        Ok(record) => {
            storage.apply_registry_data(company.id, &record).await?;
            log_provider_call(pool, Some(company.id), "receitaws", "lookup_cnpj", "ok", receita_ms);
            succeeded.push("receitaws".to_string());
            tracing::info!("✓ ReceitaWS enrichment applied for {}", company.cnpj);
        }
        Err(e) => {
            log_provider_call(pool, Some(company.id), "receitaws", "lookup_cnpj", "error", receita_ms);
            failed.push("receitaws".to_string());
            tracing::warn!("ReceitaWS failed for company {}: {}", company.id, e);
        }
    }

    match apollo {
        Ok((org, people)) => {
            storage.apply_apollo_data(company.id, &org, people.len()).await?;
            log_provider_call(pool, Some(company.id), "apollo", "enrich_organization", "ok", apollo_ms);
            succeeded.push("apollo".to_string());
            tracing::info!("✓ Apollo enrichment applied ({} people)", people.len());
        }
        Err(e) => {
            log_provider_call(pool, Some(company.id), "apollo", "enrich_organization", "error", apollo_ms);
            failed.push("apollo".to_string());
            tracing::warn!("Apollo failed for company {}: {}", company.id, e);
        }
    }

    match serper {
        Ok(hits) => {
            let value = serde_json::to_value(&hits).unwrap_or_default();
            storage.apply_digital_signals(company.id, &value).await?;
            log_provider_call(pool, Some(company.id), "serper", "search", "ok", serper_ms);
            succeeded.push("serper".to_string());
            tracing::info!("✓ Serper returned {} digital signals", hits.len());
        }
        Err(e) => {
            log_provider_call(pool, Some(company.id), "serper", "search", "error", serper_ms);
            failed.push("serper".to_string());
            tracing::warn!("Serper failed for company {}: {}", company.id, e);
        }
    }

    match builtwith {
        Ok(techs) => {
            tech_signals_added = storage
                .insert_tech_signals(company.id, &techs, "builtwith")
                .await?;
            log_provider_call(pool, Some(company.id), "builtwith", "lookup_domain", "ok", builtwith_ms);
            succeeded.push("builtwith".to_string());
            tracing::info!("✓ BuiltWith added {} tech signals", tech_signals_added);
        }
        Err(e) => {
            log_provider_call(pool, Some(company.id), "builtwith", "lookup_domain", "error", builtwith_ms);
            failed.push("builtwith".to_string());
            tracing::debug!("BuiltWith skipped/failed for company {}: {}", company.id, e);
        }
    }

    // Step 4: mark enriched when at least one source landed
    if !succeeded.is_empty() {
        storage.mark_enriched(company.id).await?;
    }

    tracing::info!(
        "Enrichment finished for company {}: {} ok, {} failed",
        company.id,
        succeeded.len(),
        failed.len()
    );

    Ok(EnrichmentSummary {
        company_id: company.id,
        context: validation.context,
        sources_succeeded: succeeded,
        sources_failed: failed,
        tech_signals_added,
    })
}
