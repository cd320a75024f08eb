use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::context::ContextHints;

// ============ Database Models ============

/// A company being prospected.
///
/// Created on smart-search or import, mutated by each enrichment call.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Company {
    /// Unique identifier.
    pub id: Uuid,
    /// CNPJ, digits only (14 chars).
    pub cnpj: String,
    /// Legal name from the registry.
    pub legal_name: Option<String>,
    /// Trade name (fantasy name).
    pub trade_name: Option<String>,
    /// Normalized website URL.
    pub website: Option<String>,
    /// Bare domain, for provider queries.
    pub domain: Option<String>,
    /// Industry sector.
    pub industry: Option<String>,
    /// LinkedIn company page.
    pub linkedin_url: Option<String>,
    /// Employee count, when known.
    pub employees: Option<i64>,
    /// Headquarters state (UF).
    pub headquarters_state: Option<String>,
    /// Headquarters city.
    pub headquarters_city: Option<String>,
    /// Latest overall maturity score (0-100).
    pub maturity_score: Option<i32>,
    /// Whether the company has been through full enrichment.
    pub enriched: bool,
    /// Raw provider payloads, keyed by provider name.
    pub raw_data: Option<serde_json::Value>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: Option<DateTime<Utc>>,
}

/// One detected technology for a company. Append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TechSignal {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tech_name: String,
    pub category: String,
    /// Detection confidence, 0.0-1.0.
    pub confidence: f64,
    /// Where the signal came from ("heuristic", "builtwith").
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// One pillar score row from a maturity run. Append-only, one row per
/// (company, run, pillar) plus an "overall" row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MaturityScoreRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub run_id: Uuid,
    pub pillar: String,
    pub score: i32,
    pub policy_version: String,
    /// Recommendations for this run, stored on the overall row.
    pub evidence: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Observability row for a provider call. Fire-and-forget.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProviderLog {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub provider: String,
    pub operation: String,
    pub status: String,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Request body for POST /api/companies/smart-search.
#[derive(Debug, Clone, Deserialize)]
pub struct SmartSearchRequest {
    pub cnpj: Option<String>,
    pub website: Option<String>,
}

/// Request body for enrichment endpoints; context hints gate the call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichRequest {
    #[serde(default)]
    pub context: ContextHints,
}

/// Summary returned by the orchestrated enrichment workflow.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentSummary {
    pub company_id: Uuid,
    pub context: crate::context::EnrichmentContext,
    pub sources_succeeded: Vec<String>,
    pub sources_failed: Vec<String>,
    pub tech_signals_added: usize,
}

/// Request body for POST /api/v1/companies/:id/maturity-score.
///
/// Lead/message counts are owned by the CRM and passed in; everything
/// else is read from our own tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaturityRequest {
    #[serde(default)]
    pub leads: u32,
    #[serde(default)]
    pub messages: u32,
}

/// Request body for POST /api/v1/outreach/message.
#[derive(Debug, Clone, Deserialize)]
pub struct OutreachRequest {
    pub lead_id: String,
    /// "email" or "whatsapp".
    pub channel: String,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// ReceitaWS company record, as consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceitaCompany {
    pub status: Option<String>,
    pub nome: Option<String>,
    pub fantasia: Option<String>,
    pub uf: Option<String>,
    pub municipio: Option<String>,
    pub porte: Option<String>,
    #[serde(default)]
    pub atividade_principal: Vec<ReceitaActivity>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceitaActivity {
    pub code: Option<String>,
    pub text: Option<String>,
}

/// A decision maker returned by Apollo people search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApolloPerson {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
}

/// A search hit from Serper, kept as a digital-presence signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
}
