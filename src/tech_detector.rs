//! Heuristic tech-stack detection over fetched page content.
//!
//! A fixed, ordered list of regex rules is evaluated against the page
//! HTML plus its extracted script/meta/link strings. Each rule fires
//! independently with a hardcoded confidence and category; there is no
//! negative evidence and no score combination. Absence of a match
//! simply yields no entry.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Page content as fetched and pre-split for matching.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub html: String,
    pub scripts: Vec<String>,
    pub metas: Vec<String>,
    pub links: Vec<String>,
}

impl PageContent {
    /// Builds content from raw HTML, extracting script srcs, meta tags
    /// and link hrefs with single-pass regexes.
    pub fn from_html(html: &str) -> Self {
        static SCRIPT_SRC: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r#"<script[^>]+src=["']([^"']+)["']"#).unwrap());
        static META_TAG: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r#"<meta[^>]+>"#).unwrap());
        static LINK_HREF: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r#"<link[^>]+href=["']([^"']+)["']"#).unwrap());

        let scripts = SCRIPT_SRC
            .captures_iter(html)
            .map(|c| c[1].to_string())
            .collect();
        let metas = META_TAG
            .find_iter(html)
            .map(|m| m.as_str().to_string())
            .collect();
        let links = LINK_HREF
            .captures_iter(html)
            .map(|c| c[1].to_string())
            .collect();

        Self {
            html: html.to_string(),
            scripts,
            metas,
            links,
        }
    }

    fn haystack(&self) -> String {
        let mut text = String::with_capacity(
            self.html.len() + self.scripts.len() * 32 + self.metas.len() * 32,
        );
        text.push_str(&self.html);
        for s in &self.scripts {
            text.push('\n');
            text.push_str(s);
        }
        for m in &self.metas {
            text.push('\n');
            text.push_str(m);
        }
        for l in &self.links {
            text.push('\n');
            text.push_str(l);
        }
        text
    }
}

/// A technology detected on a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedTech {
    pub tech_name: String,
    pub category: String,
    /// Hardcoded per-rule confidence, 0.0-1.0.
    pub confidence: f64,
}

struct TechRule {
    name: &'static str,
    category: &'static str,
    confidence: f64,
    pattern: Regex,
}

fn rule(name: &'static str, category: &'static str, confidence: f64, pattern: &str) -> TechRule {
    TechRule {
        name,
        category,
        confidence,
        pattern: Regex::new(pattern).expect("signature regex must compile"),
    }
}

/// The fixed signature table. Order matters only for output stability;
/// rules never interact.
static RULES: LazyLock<Vec<TechRule>> = LazyLock::new(|| {
    vec![
        rule("WordPress", "cms", 0.95, r"(?i)wp-content|wp-includes|wp-json"),
        rule("Wix", "cms", 0.9, r"(?i)wix\.com|wixstatic\.com"),
        rule("Shopify", "ecommerce", 0.95, r"(?i)cdn\.shopify\.com|myshopify\.com"),
        rule("VTEX", "ecommerce", 0.9, r"(?i)vteximg\.com\.br|vtexassets\.com|vtex\.com"),
        rule("Magento", "ecommerce", 0.85, r"(?i)/skin/frontend/|mage/cookies|magento"),
        rule("WooCommerce", "ecommerce", 0.9, r"(?i)woocommerce"),
        rule("React", "frontend", 0.8, r"(?i)react(\.production|\.development)?(\.min)?\.js|data-reactroot|__NEXT_DATA__"),
        rule("Next.js", "frontend", 0.85, r"(?i)/_next/static|__NEXT_DATA__"),
        rule("Vue.js", "frontend", 0.8, r"(?i)vue(\.runtime)?(\.global)?(\.min)?\.js|data-v-app"),
        rule("Angular", "frontend", 0.8, r"(?i)ng-version=|angular(\.min)?\.js"),
        rule("jQuery", "frontend", 0.85, r"(?i)jquery[.\-]"),
        rule("Bootstrap", "frontend", 0.8, r"(?i)bootstrap(\.min)?\.(css|js)"),
        rule("Google Analytics", "analytics", 0.9, r"(?i)google-analytics\.com|gtag\(|ga\('create'|UA-\d{4,}-\d"),
        rule("Google Tag Manager", "analytics", 0.9, r"(?i)googletagmanager\.com|GTM-[A-Z0-9]{4,}"),
        rule("Facebook Pixel", "marketing", 0.85, r"(?i)connect\.facebook\.net|fbq\("),
        rule("Hotjar", "analytics", 0.85, r"(?i)static\.hotjar\.com|hjid"),
        rule("RD Station", "marketing", 0.85, r"(?i)rdstation|d335luupugsy2\.cloudfront\.net"),
        rule("Cloudflare", "infrastructure", 0.8, r"(?i)cdnjs\.cloudflare\.com|cf-ray|__cfduid|cdn-cgi"),
        rule("PHP", "backend", 0.6, r#"(?i)\.php[?"']|x-powered-by:\s*php"#),
    ]
});

/// Evaluates the rule table against page content.
///
/// Pure function: no I/O, no side effects. Each technology appears at
/// most once per call (best-effort seen set, request-scoped only).
pub fn detect_technologies(content: &PageContent) -> Vec<DetectedTech> {
    let haystack = content.haystack();
    let mut seen: HashSet<&'static str> = HashSet::new();
    let mut detected = Vec::new();

    for rule in RULES.iter() {
        if seen.contains(rule.name) {
            continue;
        }
        if rule.pattern.is_match(&haystack) {
            seen.insert(rule.name);
            detected.push(DetectedTech {
                tech_name: rule.name.to_string(),
                category: rule.category.to_string(),
                confidence: rule.confidence,
            });
        }
    }

    detected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect_html(html: &str) -> Vec<DetectedTech> {
        detect_technologies(&PageContent::from_html(html))
    }

    #[test]
    fn wp_content_detects_wordpress() {
        let found = detect_html(
            r#"<html><link rel="stylesheet" href="/wp-content/themes/acme/style.css"></html>"#,
        );
        assert!(found.iter().any(|t| t.tech_name == "WordPress"));
    }

    #[test]
    fn empty_page_detects_nothing() {
        assert!(detect_html("<html><body>hello</body></html>").is_empty());
    }

    #[test]
    fn rules_fire_independently() {
        let html = r#"
            <html>
            <script src="https://www.googletagmanager.com/gtm.js?id=GTM-ABC123"></script>
            <script src="/wp-content/plugins/woocommerce/assets/js/frontend.js"></script>
            <script src="https://code.jquery.com/jquery-3.6.0.min.js"></script>
            </html>"#;
        let found = detect_html(html);
        let names: Vec<_> = found.iter().map(|t| t.tech_name.as_str()).collect();
        assert!(names.contains(&"WordPress"));
        assert!(names.contains(&"WooCommerce"));
        assert!(names.contains(&"Google Tag Manager"));
        assert!(names.contains(&"jQuery"));
    }

    #[test]
    fn each_tech_reported_once() {
        let html = r#"<a href="/wp-content/a.css"></a><img src="/wp-content/b.png">"#;
        let found = detect_html(html);
        let wp_count = found.iter().filter(|t| t.tech_name == "WordPress").count();
        assert_eq!(wp_count, 1);
    }

    #[test]
    fn confidences_are_in_range() {
        let html = r#"
            <script src="https://cdn.shopify.com/s/files/app.js"></script>
            <script>gtag('config', 'UA-12345-1');</script>"#;
        for tech in detect_html(html) {
            assert!(tech.confidence > 0.0 && tech.confidence <= 1.0);
        }
    }

    #[test]
    fn extracts_script_meta_link_strings() {
        let html = r#"
            <html><head>
            <meta name="generator" content="WordPress 6.2">
            <link rel="icon" href="/favicon.ico">
            <script src="/static/app.js"></script>
            </head></html>"#;
        let content = PageContent::from_html(html);
        assert_eq!(content.scripts, vec!["/static/app.js"]);
        assert_eq!(content.links, vec!["/favicon.ico"]);
        assert_eq!(content.metas.len(), 1);
    }

    #[test]
    fn detection_is_pure() {
        let content = PageContent::from_html(r#"<script src="/wp-content/x.js"></script>"#);
        assert_eq!(detect_technologies(&content), detect_technologies(&content));
    }
}
