//! Digital maturity / ICP-fit scoring.
//!
//! The scoring policy is a declarative rule table: every pillar has a
//! list of `condition -> points` rules, a cap of 100 and a weight in the
//! overall score. Thresholds and weights are data on `ScoringPolicy`,
//! versioned via `POLICY_VERSION`, so recalibrating the rubric is a
//! table change that shows up on every persisted run row.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bumped whenever rules, weights or thresholds change.
pub const POLICY_VERSION: &str = "2024.2";

/// One scoring run's input: everything known about a single company.
///
/// All fields are optional or default to empty; an empty bundle scores
/// low without erroring.
#[derive(Debug, Clone, Default)]
pub struct SignalBundle {
    /// Technologies detected on the company's web properties.
    pub tech_signals: Vec<TechSignalView>,
    /// Search/web-presence signals (news mentions, marketplace listings).
    pub digital_signals: Vec<DigitalSignalView>,
    /// Decision makers mapped for this company.
    pub people: u32,
    /// Leads opened against this company.
    pub leads: u32,
    /// Outreach messages exchanged.
    pub messages: u32,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub industry: Option<String>,
    pub employees: Option<i64>,
}

/// Minimal view of a tech signal as the scorer needs it.
#[derive(Debug, Clone)]
pub struct TechSignalView {
    pub name: String,
    pub category: String,
}

/// Minimal view of a digital-presence signal.
#[derive(Debug, Clone)]
pub struct DigitalSignalView {
    pub kind: String,
}

/// The five scoring pillars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Infrastructure,
    Systems,
    Processes,
    Security,
    Innovation,
}

impl Pillar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::Infrastructure => "infrastructure",
            Pillar::Systems => "systems",
            Pillar::Processes => "processes",
            Pillar::Security => "security",
            Pillar::Innovation => "innovation",
        }
    }
}

/// Overall maturity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityLevel {
    Initial,
    Basic,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoPriority {
    Medium,
    High,
    Critical,
}

/// A canned recommendation emitted for an underperforming pillar.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub pillar: Pillar,
    pub priority: RecoPriority,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PillarScore {
    pub pillar: Pillar,
    pub score: u32,
    /// Labels of the rules that awarded points, for run auditability.
    pub evidence: Vec<String>,
}

/// Result of one scoring run.
#[derive(Debug, Clone, Serialize)]
pub struct MaturityReport {
    pub run_id: Uuid,
    pub policy_version: String,
    pub overall_score: u32,
    pub classification: MaturityLevel,
    pub pillar_scores: Vec<PillarScore>,
    pub recommendations: Vec<Recommendation>,
}

/// One rule: a labeled condition worth a fixed number of points.
struct ScoreRule {
    label: &'static str,
    eval: fn(&SignalBundle) -> u32,
}

struct PillarPolicy {
    pillar: Pillar,
    weight: f64,
    rules: Vec<ScoreRule>,
    /// Recommendation issued when this pillar lands below the gap threshold.
    gap_priority: RecoPriority,
    gap_action: &'static str,
}

/// The versioned scoring policy: per-pillar rules, weights, thresholds.
pub struct ScoringPolicy {
    pub version: &'static str,
    pillars: Vec<PillarPolicy>,
    /// Pillars scoring below this emit a recommendation.
    gap_threshold: u32,
    /// Classification cut-offs: (advanced, intermediate, basic).
    class_cutoffs: (u32, u32, u32),
}

fn tech_name_matches(bundle: &SignalBundle, needles: &[&str]) -> bool {
    bundle.tech_signals.iter().any(|t| {
        needles
            .iter()
            .any(|n| t.name.to_lowercase().contains(&n.to_lowercase()))
    })
}

fn has_https(bundle: &SignalBundle) -> bool {
    bundle
        .website
        .as_deref()
        .is_some_and(|w| w.starts_with("https://"))
}

impl ScoringPolicy {
    /// The current production policy. Weights and rule points follow the
    /// established rubric: infrastructure 20%, systems 30%, processes
    /// 25%, security 15%, innovation 10%.
    pub fn default_policy() -> Self {
        Self {
            version: POLICY_VERSION,
            gap_threshold: 60,
            class_cutoffs: (80, 60, 40),
            pillars: vec![
                PillarPolicy {
                    pillar: Pillar::Infrastructure,
                    weight: 0.20,
                    gap_priority: RecoPriority::High,
                    gap_action: "Modernize digital infrastructure: cloud migration and CDN adoption",
                    rules: vec![
                        ScoreRule {
                            label: "website over https",
                            eval: |b| {
                                if has_https(b) {
                                    20
                                } else if b.website.is_some() {
                                    10
                                } else {
                                    0
                                }
                            },
                        },
                        ScoreRule {
                            label: "own domain",
                            eval: |b| if b.website.is_some() { 20 } else { 0 },
                        },
                        ScoreRule {
                            label: "detected technologies (5 pts each, max 30)",
                            eval: |b| (b.tech_signals.len() as u32 * 5).min(30),
                        },
                        ScoreRule {
                            label: "cloud adoption",
                            eval: |b| {
                                if tech_name_matches(b, &["AWS", "Azure", "GCP", "Cloud"]) {
                                    30
                                } else {
                                    0
                                }
                            },
                        },
                    ],
                },
                PillarPolicy {
                    pillar: Pillar::Systems,
                    weight: 0.30,
                    gap_priority: RecoPriority::High,
                    gap_action: "Adopt integrated management systems (ERP and CRM)",
                    rules: vec![
                        ScoreRule {
                            label: "structured company record",
                            eval: |_| 20,
                        },
                        ScoreRule {
                            label: "structured website",
                            eval: |b| if b.website.is_some() { 20 } else { 0 },
                        },
                        ScoreRule {
                            label: "industry defined",
                            eval: |b| if b.industry.is_some() { 20 } else { 0 },
                        },
                        ScoreRule {
                            label: "corporate systems in stack",
                            eval: |b| {
                                if tech_name_matches(
                                    b,
                                    &["ERP", "CRM", "SAP", "Oracle", "TOTVS", "Salesforce"],
                                ) {
                                    40
                                } else {
                                    0
                                }
                            },
                        },
                    ],
                },
                PillarPolicy {
                    pillar: Pillar::Processes,
                    weight: 0.25,
                    gap_priority: RecoPriority::Medium,
                    gap_action: "Automate workflows and digitize manual processes",
                    rules: vec![
                        ScoreRule {
                            label: "structured company baseline",
                            eval: |_| 40,
                        },
                        ScoreRule {
                            label: "linkedin presence",
                            eval: |b| if b.linkedin_url.is_some() { 20 } else { 0 },
                        },
                        ScoreRule {
                            label: "headcount tier",
                            eval: |b| match b.employees.unwrap_or(0) {
                                e if e > 500 => 40,
                                e if e > 200 => 30,
                                e if e > 50 => 20,
                                e if e > 10 => 10,
                                _ => 0,
                            },
                        },
                        ScoreRule {
                            label: "decision makers mapped",
                            eval: |b| if b.people >= 3 { 10 } else { 0 },
                        },
                        ScoreRule {
                            label: "active outreach history",
                            eval: |b| if b.messages >= 10 || b.leads >= 3 { 10 } else { 0 },
                        },
                    ],
                },
                PillarPolicy {
                    pillar: Pillar::Security,
                    weight: 0.15,
                    gap_priority: RecoPriority::Critical,
                    gap_action: "Establish security policies and perimeter protection",
                    rules: vec![
                        ScoreRule {
                            label: "https everywhere",
                            eval: |b| if has_https(b) { 40 } else { 0 },
                        },
                        ScoreRule {
                            label: "corporate domain",
                            eval: |b| {
                                let corporate = b.website.as_deref().is_some_and(|w| {
                                    !w.contains("gmail") && !w.contains("hotmail")
                                });
                                if b.website.is_some() && corporate {
                                    20
                                } else {
                                    0
                                }
                            },
                        },
                        ScoreRule {
                            label: "security tooling",
                            eval: |b| {
                                if tech_name_matches(
                                    b,
                                    &["SSL", "Cloudflare", "Security", "WAF", "Firewall"],
                                ) {
                                    40
                                } else {
                                    0
                                }
                            },
                        },
                    ],
                },
                PillarPolicy {
                    pillar: Pillar::Innovation,
                    weight: 0.10,
                    gap_priority: RecoPriority::Medium,
                    gap_action: "Invest in modern technologies and digital channels",
                    rules: vec![
                        ScoreRule {
                            label: "modern digital presence",
                            eval: |b| if b.website.is_some() { 30 } else { 0 },
                        },
                        ScoreRule {
                            label: "modern stack",
                            eval: |b| {
                                if tech_name_matches(
                                    b,
                                    &["React", "Vue", "Angular", "Node", "Python", "AI", "ML", "API"],
                                ) {
                                    40
                                } else {
                                    0
                                }
                            },
                        },
                        ScoreRule {
                            label: "active linkedin",
                            eval: |b| if b.linkedin_url.is_some() { 30 } else { 0 },
                        },
                        ScoreRule {
                            label: "recent digital activity",
                            eval: |b| if b.digital_signals.len() >= 5 { 10 } else { 0 },
                        },
                    ],
                },
            ],
        }
    }

    fn pillar_score(&self, policy: &PillarPolicy, bundle: &SignalBundle) -> (u32, Vec<String>) {
        let mut total = 0u32;
        let mut evidence = Vec::new();

        for rule in &policy.rules {
            let points = (rule.eval)(bundle);
            if points > 0 {
                total += points;
                evidence.push(rule.label.to_string());
            }
        }

        (total.min(100), evidence)
    }

    fn classify(&self, overall: u32) -> MaturityLevel {
        let (advanced, intermediate, basic) = self.class_cutoffs;
        if overall >= advanced {
            MaturityLevel::Advanced
        } else if overall >= intermediate {
            MaturityLevel::Intermediate
        } else if overall >= basic {
            MaturityLevel::Basic
        } else {
            MaturityLevel::Initial
        }
    }

    /// Runs the full policy over a signal bundle. Never fails: missing
    /// signals simply score zero on their rules.
    pub fn score(&self, bundle: &SignalBundle) -> MaturityReport {
        let mut pillar_scores = Vec::with_capacity(self.pillars.len());
        let mut recommendations = Vec::new();
        let mut weighted = 0.0f64;

        for policy in &self.pillars {
            let (score, evidence) = self.pillar_score(policy, bundle);
            weighted += score as f64 * policy.weight;

            if score < self.gap_threshold {
                recommendations.push(Recommendation {
                    pillar: policy.pillar,
                    priority: policy.gap_priority,
                    action: policy.gap_action.to_string(),
                });
            }

            pillar_scores.push(PillarScore {
                pillar: policy.pillar,
                score,
                evidence,
            });
        }

        let overall_score = weighted.round().min(100.0) as u32;

        MaturityReport {
            run_id: Uuid::new_v4(),
            policy_version: self.version.to_string(),
            overall_score,
            classification: self.classify(overall_score),
            pillar_scores,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(name: &str, category: &str) -> TechSignalView {
        TechSignalView {
            name: name.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn empty_bundle_scores_low_without_error() {
        let report = ScoringPolicy::default_policy().score(&SignalBundle::default());
        // Only the structured-record baselines contribute
        assert!(report.overall_score < 40);
        assert_eq!(report.classification, MaturityLevel::Initial);
        assert_eq!(report.pillar_scores.len(), 5);
        for ps in &report.pillar_scores {
            assert!(ps.score <= 100);
        }
    }

    #[test]
    fn empty_bundle_recommends_every_pillar() {
        let report = ScoringPolicy::default_policy().score(&SignalBundle::default());
        assert_eq!(report.recommendations.len(), 5);
        let critical: Vec<_> = report
            .recommendations
            .iter()
            .filter(|r| r.priority == RecoPriority::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].pillar, Pillar::Security);
    }

    #[test]
    fn rich_bundle_classifies_advanced() {
        let bundle = SignalBundle {
            tech_signals: vec![
                tech("SAP ERP", "erp"),
                tech("Salesforce", "crm"),
                tech("AWS", "cloud"),
                tech("React", "frontend"),
                tech("Cloudflare", "infrastructure"),
                tech("Google Analytics", "analytics"),
            ],
            digital_signals: (0..6)
                .map(|_| DigitalSignalView {
                    kind: "news".to_string(),
                })
                .collect(),
            people: 5,
            leads: 4,
            messages: 30,
            website: Some("https://acme.com.br".to_string()),
            linkedin_url: Some("https://linkedin.com/company/acme".to_string()),
            industry: Some("Manufacturing".to_string()),
            employees: Some(800),
        };

        let report = ScoringPolicy::default_policy().score(&bundle);
        assert!(report.overall_score >= 80, "got {}", report.overall_score);
        assert_eq!(report.classification, MaturityLevel::Advanced);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn pillar_scores_are_capped_at_100() {
        let bundle = SignalBundle {
            tech_signals: (0..50).map(|i| tech(&format!("Tech{}", i), "other")).collect(),
            website: Some("https://acme.com.br".to_string()),
            linkedin_url: Some("https://linkedin.com/company/acme".to_string()),
            employees: Some(10_000),
            people: 10,
            messages: 100,
            leads: 10,
            ..Default::default()
        };
        let report = ScoringPolicy::default_policy().score(&bundle);
        for ps in &report.pillar_scores {
            assert!(ps.score <= 100, "{:?} over cap", ps);
        }
        assert!(report.overall_score <= 100);
    }

    #[test]
    fn weights_sum_to_one() {
        let policy = ScoringPolicy::default_policy();
        let sum: f64 = policy.pillars.iter().map(|p| p.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn classification_thresholds() {
        let policy = ScoringPolicy::default_policy();
        assert_eq!(policy.classify(80), MaturityLevel::Advanced);
        assert_eq!(policy.classify(79), MaturityLevel::Intermediate);
        assert_eq!(policy.classify(60), MaturityLevel::Intermediate);
        assert_eq!(policy.classify(59), MaturityLevel::Basic);
        assert_eq!(policy.classify(40), MaturityLevel::Basic);
        assert_eq!(policy.classify(39), MaturityLevel::Initial);
    }

    #[test]
    fn fired_rules_appear_as_evidence() {
        let bundle = SignalBundle {
            website: Some("https://acme.com.br".to_string()),
            ..Default::default()
        };
        let report = ScoringPolicy::default_policy().score(&bundle);

        let infra = report
            .pillar_scores
            .iter()
            .find(|p| p.pillar == Pillar::Infrastructure)
            .unwrap();
        assert!(infra.evidence.iter().any(|l| l == "website over https"));
        // No cloud signal, so that rule leaves no trace
        assert!(!infra.evidence.iter().any(|l| l == "cloud adoption"));
    }

    #[test]
    fn https_outscores_plain_http_on_security() {
        let policy = ScoringPolicy::default_policy();
        let https = SignalBundle {
            website: Some("https://acme.com.br".to_string()),
            ..Default::default()
        };
        let http = SignalBundle {
            website: Some("http://acme.com.br".to_string()),
            ..Default::default()
        };
        let s_https = policy
            .score(&https)
            .pillar_scores
            .iter()
            .find(|p| p.pillar == Pillar::Security)
            .unwrap()
            .score;
        let s_http = policy
            .score(&http)
            .pillar_scores
            .iter()
            .find(|p| p.pillar == Pillar::Security)
            .unwrap()
            .score;
        assert!(s_https > s_http);
    }
}
