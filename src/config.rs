use serde::Deserialize;

/// Runtime configuration, loaded from the environment.
///
/// Provider base URLs have production defaults but can be overridden,
/// which is what lets integration tests point the services at a
/// wiremock server instead of the real APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// ReceitaWS bearer token (the free tier works without one).
    pub receitaws_token: Option<String>,
    pub receitaws_base_url: String,
    pub apollo_api_key: String,
    pub apollo_base_url: String,
    pub serper_api_key: String,
    pub serper_base_url: String,
    pub builtwith_api_key: Option<String>,
    pub builtwith_base_url: String,
    /// Resend-compatible email API key.
    pub email_api_key: Option<String>,
    pub email_base_url: String,
    /// Twilio-compatible WhatsApp API key.
    pub whatsapp_api_key: Option<String>,
    pub whatsapp_base_url: String,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|v| {
            if v.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(v)
        })
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn base_url(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name).unwrap_or_else(|_| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            receitaws_token: optional("RECEITAWS_API_TOKEN"),
            receitaws_base_url: base_url("RECEITAWS_BASE_URL", "https://receitaws.com.br")?,
            apollo_api_key: required("APOLLO_API_KEY")?,
            apollo_base_url: base_url("APOLLO_BASE_URL", "https://api.apollo.io/api/v1")?,
            serper_api_key: required("SERPER_API_KEY")?,
            serper_base_url: base_url("SERPER_BASE_URL", "https://google.serper.dev")?,
            builtwith_api_key: optional("BUILTWITH_API_KEY"),
            builtwith_base_url: base_url("BUILTWITH_BASE_URL", "https://api.builtwith.com")?,
            email_api_key: optional("EMAIL_API_KEY"),
            email_base_url: base_url("EMAIL_BASE_URL", "https://api.resend.com")?,
            whatsapp_api_key: optional("WHATSAPP_API_KEY"),
            whatsapp_base_url: base_url("WHATSAPP_BASE_URL", "https://api.twilio.com")?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("ReceitaWS base URL: {}", config.receitaws_base_url);
        tracing::debug!("Apollo base URL: {}", config.apollo_base_url);
        tracing::debug!("Serper base URL: {}", config.serper_base_url);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }

    /// Config for tests: all providers pointed at `base`, dummy keys.
    #[allow(dead_code)]
    pub fn for_tests(base: String) -> Self {
        Self {
            database_url: "postgresql://test".to_string(),
            port: 8080,
            receitaws_token: None,
            receitaws_base_url: base.clone(),
            apollo_api_key: "test_apollo_key".to_string(),
            apollo_base_url: base.clone(),
            serper_api_key: "test_serper_key".to_string(),
            serper_base_url: base.clone(),
            builtwith_api_key: Some("test_builtwith_key".to_string()),
            builtwith_base_url: base.clone(),
            email_api_key: Some("test_email_key".to_string()),
            email_base_url: base.clone(),
            whatsapp_api_key: Some("test_whatsapp_key".to_string()),
            whatsapp_base_url: base,
        }
    }
}
