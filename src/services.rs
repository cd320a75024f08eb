use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{ApolloPerson, ReceitaCompany, SearchHit};
use crate::resilience::{fetch_with_timeout, retry};
use crate::tech_detector::DetectedTech;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_TRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// ReceitaWS CNPJ registry client.
///
/// The only provider behind both retry and a circuit breaker: it rate
/// limits aggressively on the free tier and enrichment cannot proceed
/// without it.
pub struct ReceitaWsService {
    client: Client,
    base_url: String,
    token: Option<String>,
    breaker: ProviderBreaker,
}

impl ReceitaWsService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.receitaws_base_url.clone(),
            token: config.receitaws_token.clone(),
            breaker: create_provider_circuit_breaker(),
        }
    }

    /// Looks up a company by CNPJ (digits only).
    ///
    /// 5xx and transport failures are retried; a registry "ERROR" payload
    /// or a 404 is terminal and maps to NotFound.
    pub async fn lookup_cnpj(&self, cnpj: &str) -> Result<ReceitaCompany, AppError> {
        let url = format!("{}/v1/cnpj/{}", self.base_url, cnpj);
        tracing::info!("Fetching ReceitaWS record for CNPJ: {}", cnpj);

        let response = retry(
            || async {
                use failsafe::futures::CircuitBreaker;

                let mut builder = self.client.get(&url);
                if let Some(token) = &self.token {
                    builder = builder.bearer_auth(token);
                }

                let timed = self
                    .breaker
                    .call(fetch_with_timeout(builder, PROVIDER_TIMEOUT))
                    .await
                    .map_err(|e| match e {
                        failsafe::Error::Inner(inner) => inner,
                        failsafe::Error::Rejected => {
                            AppError::ProviderDown("ReceitaWS circuit open".to_string())
                        }
                    })?;

                let status = timed.response.status();
                if status.is_server_error() {
                    return Err(AppError::ProviderDown(format!(
                        "ReceitaWS returned status {}",
                        status
                    )));
                }
                Ok(timed.response)
            },
            RETRY_TRIES,
            RETRY_DELAY,
        )
        .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("CNPJ {} not found", cnpj)));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ProviderDown(format!(
                "ReceitaWS returned status {}: {}",
                status, error_text
            )));
        }

        let record: ReceitaCompany = response.json().await.map_err(|e| {
            AppError::ProviderDown(format!("Failed to parse ReceitaWS response: {}", e))
        })?;

        // The registry signals misses in-band with status: ERROR
        if record.status.as_deref() == Some("ERROR") {
            let message = record
                .message
                .unwrap_or_else(|| "CNPJ not found in registry".to_string());
            return Err(AppError::NotFound(message));
        }

        tracing::info!("Successfully fetched ReceitaWS record for {}", cnpj);
        Ok(record)
    }
}

/// Apollo organization/people enrichment client.
pub struct ApolloService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApolloService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.apollo_base_url.clone(),
            api_key: config.apollo_api_key.clone(),
        }
    }

    /// Enriches an organization record by domain.
    pub async fn enrich_organization(&self, domain: &str) -> Result<Value, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/organizations/enrich", self.base_url),
            &[("domain", domain)],
        )
        .map_err(|e| AppError::ProviderDown(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Fetching Apollo organization for domain: {}", domain);
        // Key goes in a header; never log it
        let builder = self
            .client
            .get(url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json");

        let timed = fetch_with_timeout(builder, PROVIDER_TIMEOUT).await?;
        let status = timed.response.status();
        if !status.is_success() {
            return Err(AppError::ProviderDown(format!(
                "Apollo returned status {}",
                status
            )));
        }

        let body: Value = timed.response.json().await.map_err(|e| {
            AppError::ProviderDown(format!("Failed to parse Apollo response: {}", e))
        })?;

        Ok(body.get("organization").cloned().unwrap_or(body))
    }

    /// Searches senior people at an organization by domain.
    pub async fn search_people(&self, domain: &str) -> Result<Vec<ApolloPerson>, AppError> {
        let url = format!("{}/mixed_people/search", self.base_url);

        let body = json!({
            "q_organization_domains": domain,
            "person_seniorities": ["owner", "founder", "c_suite", "vp", "director"],
            "page": 1,
            "per_page": 10,
        });

        tracing::info!("Searching Apollo people for domain: {}", domain);
        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body);

        let timed = fetch_with_timeout(builder, PROVIDER_TIMEOUT).await?;
        let status = timed.response.status();
        if !status.is_success() {
            return Err(AppError::ProviderDown(format!(
                "Apollo people search returned status {}",
                status
            )));
        }

        let payload: Value = timed.response.json().await.map_err(|e| {
            AppError::ProviderDown(format!("Failed to parse Apollo response: {}", e))
        })?;

        let people = payload
            .get("people")
            .and_then(|p| p.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| serde_json::from_value::<ApolloPerson>(p.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(people)
    }
}

/// Serper (Google search) client for digital-presence signals.
pub struct SerperService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerperService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.serper_base_url.clone(),
            api_key: config.serper_api_key.clone(),
        }
    }

    /// Runs one web search, Brazil-localized, returning organic hits.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AppError> {
        let url = format!("{}/search", self.base_url);

        tracing::info!("Serper search: {}", query);
        let builder = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": 10, "gl": "br" }));

        let timed = fetch_with_timeout(builder, PROVIDER_TIMEOUT).await?;
        let status = timed.response.status();
        if !status.is_success() {
            return Err(AppError::ProviderDown(format!(
                "Serper returned status {}",
                status
            )));
        }

        let payload: Value = timed.response.json().await.map_err(|e| {
            AppError::ProviderDown(format!("Failed to parse Serper response: {}", e))
        })?;

        let hits = payload
            .get("organic")
            .and_then(|o| o.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|h| serde_json::from_value::<SearchHit>(h.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(hits)
    }
}

/// BuiltWith tech-profile client, a fallback/complement to the local
/// heuristic detector. Results are normalized into the same shape.
pub struct BuiltWithService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BuiltWithService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.builtwith_base_url.clone(),
            api_key: config.builtwith_api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetches the tech profile for a domain.
    pub async fn lookup_domain(&self, domain: &str) -> Result<Vec<DetectedTech>, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ProviderDown("BuiltWith API key not configured".to_string())
        })?;

        let url = reqwest::Url::parse_with_params(
            &format!("{}/v21/api.json", self.base_url),
            &[("KEY", api_key), ("LOOKUP", domain)],
        )
        .map_err(|e| AppError::ProviderDown(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Fetching BuiltWith profile for domain: {}", domain);
        tracing::debug!(
            "BuiltWith URL: {}/v21/api.json?KEY=[REDACTED]&LOOKUP={}",
            self.base_url,
            domain
        );

        let timed = fetch_with_timeout(self.client.get(url), PROVIDER_TIMEOUT).await?;
        let status = timed.response.status();
        if !status.is_success() {
            return Err(AppError::ProviderDown(format!(
                "BuiltWith returned status {}",
                status
            )));
        }

        let payload: Value = timed.response.json().await.map_err(|e| {
            AppError::ProviderDown(format!("Failed to parse BuiltWith response: {}", e))
        })?;

        Ok(Self::normalize(&payload))
    }

    /// Flattens the Results/Paths/Technologies nesting into tech entries.
    fn normalize(payload: &Value) -> Vec<DetectedTech> {
        let mut detected = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let paths = payload
            .get("Results")
            .and_then(|r| r.as_array())
            .into_iter()
            .flatten()
            .filter_map(|r| r.get("Result"))
            .filter_map(|r| r.get("Paths").and_then(|p| p.as_array()))
            .flatten();

        for path in paths {
            let techs = path
                .get("Technologies")
                .and_then(|t| t.as_array())
                .into_iter()
                .flatten();
            for tech in techs {
                let name = tech.get("Name").and_then(|n| n.as_str()).unwrap_or("");
                if name.is_empty() || !seen.insert(name.to_string()) {
                    continue;
                }
                let category = tech
                    .get("Tag")
                    .and_then(|t| t.as_str())
                    .unwrap_or("other")
                    .to_lowercase();
                detected.push(DetectedTech {
                    tech_name: name.to_string(),
                    category,
                    confidence: 0.9,
                });
            }
        }

        detected
    }
}

/// Outreach dispatch: transactional email (Resend-compatible) and
/// WhatsApp (gateway with a Twilio-shaped message resource).
pub struct OutreachService {
    client: Client,
    email_base_url: String,
    email_api_key: Option<String>,
    whatsapp_base_url: String,
    whatsapp_api_key: Option<String>,
}

impl OutreachService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            email_base_url: config.email_base_url.clone(),
            email_api_key: config.email_api_key.clone(),
            whatsapp_base_url: config.whatsapp_base_url.clone(),
            whatsapp_api_key: config.whatsapp_api_key.clone(),
        }
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), AppError> {
        let api_key = self.email_api_key.as_deref().ok_or_else(|| {
            AppError::ProviderDown("Email API key not configured".to_string())
        })?;

        let url = format!("{}/emails", self.email_base_url);
        tracing::info!("Sending outreach email to: {}", to);

        let builder = self.client.post(&url).bearer_auth(api_key).json(&json!({
            "from": "sdr@sales-intel.app",
            "to": [to],
            "subject": subject,
            "html": body,
        }));

        let timed = fetch_with_timeout(builder, PROVIDER_TIMEOUT).await?;
        let status = timed.response.status();
        if !status.is_success() {
            let error_text = timed
                .response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ProviderDown(format!(
                "Email send failed {}: {}",
                status, error_text
            )));
        }

        tracing::info!("✓ Email sent to {}", to);
        Ok(())
    }

    /// Sends a WhatsApp message. `to` must already be E.164 normalized.
    pub async fn send_whatsapp(&self, to: &str, body: &str) -> Result<(), AppError> {
        let api_key = self.whatsapp_api_key.as_deref().ok_or_else(|| {
            AppError::ProviderDown("WhatsApp API key not configured".to_string())
        })?;

        let url = format!("{}/v1/messages", self.whatsapp_base_url);
        tracing::info!("Sending WhatsApp message to: {}", to);

        let builder = self.client.post(&url).bearer_auth(api_key).json(&json!({
            "to": format!("whatsapp:{}", to),
            "body": body,
        }));

        let timed = fetch_with_timeout(builder, PROVIDER_TIMEOUT).await?;
        let status = timed.response.status();
        if !status.is_success() {
            let error_text = timed
                .response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ProviderDown(format!(
                "WhatsApp send failed {}: {}",
                status, error_text
            )));
        }

        tracing::info!("✓ WhatsApp message sent to {}", to);
        Ok(())
    }
}

/// Fetches a website's HTML for the heuristic detector.
///
/// Longer timeout than API providers: marketing sites are slow.
pub async fn fetch_website_html(client: &Client, url: &str) -> Result<(String, u64), AppError> {
    let builder = client
        .get(url)
        .header("User-Agent", "Mozilla/5.0 (compatible; SalesIntelBot/1.0)");

    let timed = fetch_with_timeout(builder, Duration::from_secs(8)).await?;
    let elapsed_ms = timed.elapsed_ms;
    let status = timed.response.status();
    if !status.is_success() {
        return Err(AppError::ProviderDown(format!(
            "Website fetch returned status {}",
            status
        )));
    }

    let html = timed
        .response
        .text()
        .await
        .map_err(|e| AppError::ProviderDown(format!("Failed to read website body: {}", e)))?;

    Ok((html, elapsed_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builtwith_normalize_flattens_paths() {
        let payload = json!({
            "Results": [{
                "Result": {
                    "Paths": [{
                        "Technologies": [
                            {"Name": "WordPress", "Tag": "cms"},
                            {"Name": "Nginx", "Tag": "Web Server"},
                            {"Name": "WordPress", "Tag": "cms"}
                        ]
                    }]
                }
            }]
        });

        let techs = BuiltWithService::normalize(&payload);
        assert_eq!(techs.len(), 2);
        assert_eq!(techs[0].tech_name, "WordPress");
        assert_eq!(techs[0].category, "cms");
        assert_eq!(techs[1].category, "web server");
    }

    #[test]
    fn builtwith_normalize_handles_empty_payload() {
        assert!(BuiltWithService::normalize(&json!({})).is_empty());
        assert!(BuiltWithService::normalize(&json!({"Results": []})).is_empty());
    }

    #[test]
    fn builtwith_unconfigured_is_detectable() {
        let mut config = Config::for_tests("http://localhost".to_string());
        config.builtwith_api_key = None;
        let service = BuiltWithService::new(&config);
        assert!(!service.is_configured());
    }
}
