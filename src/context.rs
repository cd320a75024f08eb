//! Enrichment context gate.
//!
//! Every enrichment request carries hints about where in the product it
//! originated (route, table, entity type). Those hints classify into a
//! fixed context, and the allow rule decides whether enrichment may
//! spend provider credits from there. Pure classification: the same
//! hints always produce the same answer.

use serde::{Deserialize, Serialize};

/// Where in the product an enrichment request originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichmentContext {
    /// Imported prospect lists, pre-qualification.
    Lista,
    /// The raw company database.
    BaseEmpresas,
    /// Commercial pool of claimed accounts.
    PoolComercial,
    /// Approved leads ready for outbound.
    SalesTarget,
    /// Deals already in the sales pipeline.
    PipelineVendas,
    /// Could not be classified.
    Unknown,
}

/// Hints available at the call site. All optional; classification works
/// off whatever is present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextHints {
    pub route_path: Option<String>,
    pub table_name: Option<String>,
    pub entity_type: Option<String>,
}

/// Outcome of the allow rule.
#[derive(Debug, Clone)]
pub struct ContextValidation {
    pub context: EnrichmentContext,
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Classifies hints into a context via an ordered priority list.
///
/// Entity type wins over table name, which wins over route, mirroring
/// how specific the hint is. First match ends the search.
pub fn classify(hints: &ContextHints) -> EnrichmentContext {
    let entity = hints.entity_type.as_deref().unwrap_or("").to_lowercase();
    let table = hints.table_name.as_deref().unwrap_or("").to_lowercase();
    let route = hints.route_path.as_deref().unwrap_or("").to_lowercase();

    if entity == "deal" || table == "deals" || route.contains("/pipeline") {
        return EnrichmentContext::PipelineVendas;
    }
    if entity == "lead" || table == "approved_leads" || route.contains("/sales-target") {
        return EnrichmentContext::SalesTarget;
    }
    if table == "pool_comercial" || route.contains("/pool") {
        return EnrichmentContext::PoolComercial;
    }
    if entity == "prospect" || table == "prospect_lists" || route.contains("/listas") {
        return EnrichmentContext::Lista;
    }
    if entity == "company" || table == "companies" || route.contains("/empresas") {
        return EnrichmentContext::BaseEmpresas;
    }

    EnrichmentContext::Unknown
}

/// Applies the allow rule on top of classification.
///
/// The rule is currently permissive: every classified context may
/// enrich. Only `Unknown` is denied, so callers that pass no usable
/// hints are forced to say where the request came from.
pub fn check_enrichment_allowed(hints: &ContextHints) -> ContextValidation {
    let context = classify(hints);

    match context {
        EnrichmentContext::Unknown => ContextValidation {
            context,
            allowed: false,
            reason: Some(
                "Could not determine enrichment context; pass entity_type, table_name or route_path"
                    .to_string(),
            ),
        },
        _ => ContextValidation {
            context,
            allowed: true,
            reason: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(route: Option<&str>, table: Option<&str>, entity: Option<&str>) -> ContextHints {
        ContextHints {
            route_path: route.map(String::from),
            table_name: table.map(String::from),
            entity_type: entity.map(String::from),
        }
    }

    #[test]
    fn classifies_by_entity_type_first() {
        // Entity "deal" outranks a companies table hint
        let h = hints(None, Some("companies"), Some("deal"));
        assert_eq!(classify(&h), EnrichmentContext::PipelineVendas);
    }

    #[test]
    fn classifies_each_context() {
        assert_eq!(
            classify(&hints(Some("/crm/pipeline"), None, None)),
            EnrichmentContext::PipelineVendas
        );
        assert_eq!(
            classify(&hints(None, None, Some("lead"))),
            EnrichmentContext::SalesTarget
        );
        assert_eq!(
            classify(&hints(None, Some("pool_comercial"), None)),
            EnrichmentContext::PoolComercial
        );
        assert_eq!(
            classify(&hints(Some("/listas/42"), None, None)),
            EnrichmentContext::Lista
        );
        assert_eq!(
            classify(&hints(None, Some("companies"), None)),
            EnrichmentContext::BaseEmpresas
        );
        assert_eq!(classify(&ContextHints::default()), EnrichmentContext::Unknown);
    }

    #[test]
    fn classification_is_deterministic() {
        let h = hints(Some("/empresas"), Some("companies"), Some("company"));
        assert_eq!(classify(&h), classify(&h));
    }

    #[test]
    fn unknown_context_is_denied() {
        let v = check_enrichment_allowed(&ContextHints::default());
        assert_eq!(v.context, EnrichmentContext::Unknown);
        assert!(!v.allowed);
        assert!(v.reason.is_some());
    }

    #[test]
    fn known_contexts_are_allowed() {
        for entity in ["company", "prospect", "lead", "deal"] {
            let v = check_enrichment_allowed(&hints(None, None, Some(entity)));
            assert!(v.allowed, "entity {} should be allowed", entity);
        }
    }
}
