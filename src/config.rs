//! Process-wide configuration, constructed once at startup and passed by
//! reference into the collaborators that need it. Nothing below reads env
//! vars after construction.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::util::env as env_util;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub gemini: GeminiConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub api_secret: String,
    pub allowed_origins: String,
}

/// Settings for the generative-model endpoint used by the report client.
///
/// `api_key` is optional at construction so the API server can come up
/// without it; the report pipeline itself treats a missing key as fatal.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Mail relay settings. When no relay URL is configured, notification
/// sends degrade to a logged no-op.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        env_util::init_env();

        let host = env_util::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_util::env_opt("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("Invalid API_PORT")?;
        let api_secret = env_util::env_req("API_SECRET")
            .context("API_SECRET environment variable is required")?;
        let allowed_origins = env_util::env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        let gemini = GeminiConfig {
            api_key: env_util::env_opt("GEMINI_API_KEY"),
            base_url: env_util::env_opt("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            model: env_util::env_opt("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            timeout: Duration::from_secs(env_util::env_parse("GEMINI_TIMEOUT_SECS", 30u64)),
        };

        let mail = MailConfig {
            relay_url: env_util::env_opt("MAIL_RELAY_URL"),
            relay_token: env_util::env_opt("MAIL_RELAY_TOKEN"),
            from: env_util::env_opt("EMAIL_FROM")
                .unwrap_or_else(|| "Crafted Market <noreply@craftedmarket.dev>".to_string()),
        };

        Ok(Self {
            http: HttpConfig {
                host,
                port,
                api_secret,
                allowed_origins,
            },
            gemini,
            mail,
        })
    }
}
