/// End-to-end scoring scenarios over realistic signal bundles,
/// plus the context gate rules the enrichment workflow enforces.
use sales_intel_api::context::{check_enrichment_allowed, ContextHints, EnrichmentContext};
use sales_intel_api::scorer::{
    MaturityLevel, Pillar, RecoPriority, ScoringPolicy, SignalBundle, TechSignalView,
    POLICY_VERSION,
};

fn tech(name: &str, category: &str) -> TechSignalView {
    TechSignalView {
        name: name.to_string(),
        category: category.to_string(),
    }
}

fn pillar_score(report: &sales_intel_api::scorer::MaturityReport, pillar: Pillar) -> u32 {
    report
        .pillar_scores
        .iter()
        .find(|p| p.pillar == pillar)
        .map(|p| p.score)
        .unwrap()
}

#[test]
fn small_wordpress_shop_scores_basic_at_best() {
    // A typical small business: WordPress over https, nothing else
    let bundle = SignalBundle {
        tech_signals: vec![tech("WordPress", "cms"), tech("jQuery", "frontend")],
        website: Some("https://padaria-acme.com.br".to_string()),
        employees: Some(8),
        ..Default::default()
    };

    let report = ScoringPolicy::default_policy().score(&bundle);

    assert!(
        matches!(
            report.classification,
            MaturityLevel::Initial | MaturityLevel::Basic
        ),
        "got {:?} at {}",
        report.classification,
        report.overall_score
    );
    // No corporate systems on record
    assert!(pillar_score(&report, Pillar::Systems) < 100);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.pillar == Pillar::Systems));
}

#[test]
fn enterprise_stack_scores_advanced() {
    let bundle = SignalBundle {
        tech_signals: vec![
            tech("SAP ERP", "erp"),
            tech("Salesforce", "crm"),
            tech("AWS", "cloud"),
            tech("React", "frontend"),
            tech("Cloudflare", "infrastructure"),
            tech("Google Analytics", "analytics"),
            tech("Next.js", "frontend"),
        ],
        digital_signals: (0..8)
            .map(|_| sales_intel_api::scorer::DigitalSignalView {
                kind: "news".to_string(),
            })
            .collect(),
        people: 6,
        leads: 5,
        messages: 40,
        website: Some("https://acme-industrial.com.br".to_string()),
        linkedin_url: Some("https://linkedin.com/company/acme-industrial".to_string()),
        industry: Some("Manufatura".to_string()),
        employees: Some(1200),
    };

    let report = ScoringPolicy::default_policy().score(&bundle);

    assert_eq!(report.classification, MaturityLevel::Advanced);
    assert!(report.recommendations.is_empty());
    assert_eq!(pillar_score(&report, Pillar::Systems), 100);
}

#[test]
fn missing_security_signals_yield_critical_recommendation() {
    let bundle = SignalBundle {
        // Plain-http site, no security tooling
        website: Some("http://acme.com.br".to_string()),
        tech_signals: vec![tech("PHP", "backend")],
        ..Default::default()
    };

    let report = ScoringPolicy::default_policy().score(&bundle);

    let security_reco = report
        .recommendations
        .iter()
        .find(|r| r.pillar == Pillar::Security)
        .expect("security gap should be flagged");
    assert_eq!(security_reco.priority, RecoPriority::Critical);
}

#[test]
fn report_carries_policy_version_and_run_id() {
    let policy = ScoringPolicy::default_policy();
    let a = policy.score(&SignalBundle::default());
    let b = policy.score(&SignalBundle::default());

    assert_eq!(a.policy_version, POLICY_VERSION);
    assert_eq!(b.policy_version, POLICY_VERSION);
    // Every run gets its own id even for identical inputs
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn cloud_adoption_lifts_infrastructure() {
    let policy = ScoringPolicy::default_policy();

    let without = SignalBundle {
        website: Some("https://acme.com.br".to_string()),
        ..Default::default()
    };
    let with = SignalBundle {
        website: Some("https://acme.com.br".to_string()),
        tech_signals: vec![tech("AWS CloudFront", "cloud")],
        ..Default::default()
    };

    let s_without = pillar_score(&policy.score(&without), Pillar::Infrastructure);
    let s_with = pillar_score(&policy.score(&with), Pillar::Infrastructure);
    assert!(s_with > s_without);
}

// ---- Context gate ----

#[test]
fn pipeline_context_allows_enrichment() {
    let hints = ContextHints {
        route_path: Some("/crm/pipeline/42".to_string()),
        table_name: None,
        entity_type: None,
    };
    let v = check_enrichment_allowed(&hints);
    assert_eq!(v.context, EnrichmentContext::PipelineVendas);
    assert!(v.allowed);
}

#[test]
fn unknown_context_is_denied_with_reason() {
    let v = check_enrichment_allowed(&ContextHints::default());
    assert_eq!(v.context, EnrichmentContext::Unknown);
    assert!(!v.allowed);
    assert!(v.reason.unwrap().contains("context"));
}

#[test]
fn entity_hint_beats_route_hint() {
    let hints = ContextHints {
        route_path: Some("/empresas/123".to_string()),
        table_name: None,
        entity_type: Some("deal".to_string()),
    };
    assert_eq!(
        check_enrichment_allowed(&hints).context,
        EnrichmentContext::PipelineVendas
    );
}
