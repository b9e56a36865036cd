// API server implementation using actix-web

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

use crate::ai::GeminiClient;
use crate::api::{auth, middleware, routes};
use crate::config::HttpConfig;
use crate::error::AppError;
use crate::notify::Mailer;
use crate::reports::ReportRunConfig;
use crate::store::Db;

/// Process start marker; the health endpoint reports uptime against it.
#[derive(Clone, Copy)]
pub struct StartTime(std::time::Instant);

impl StartTime {
    pub fn now() -> Self {
        Self(std::time::Instant::now())
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.0.elapsed().as_secs()
    }
}

/// Report-pipeline state shared with request handlers. `gemini` is absent
/// when no API key is configured; report endpoints then fail while the rest
/// of the API stays up.
pub struct ReportState {
    gemini: Option<GeminiClient>,
    pub run_cfg: ReportRunConfig,
}

impl ReportState {
    pub fn new(gemini: Option<GeminiClient>, run_cfg: ReportRunConfig) -> Self {
        Self { gemini, run_cfg }
    }

    pub fn gemini(&self) -> Result<&GeminiClient, AppError> {
        self.gemini
            .as_ref()
            .ok_or_else(|| AppError::FatalConfig("GEMINI_API_KEY is not configured".into()))
    }
}

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub api_secret: String,
    pub allowed_origins: String,
}

impl ApiServer {
    pub fn new(cfg: &HttpConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            api_secret: cfg.api_secret.clone(),
            allowed_origins: cfg.allowed_origins.clone(),
        }
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db, report_state: ReportState, mailer: Mailer) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting crafted-market API server"
        );

        let db_data = web::Data::new(db);
        let report_data = web::Data::new(report_state);
        let mailer_data = web::Data::new(mailer);
        let start_data = web::Data::new(StartTime::now());
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(api_secret.clone());

            App::new()
                .app_data(db_data.clone())
                .app_data(report_data.clone())
                .app_data(mailer_data.clone())
                .app_data(start_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .wrap(auth)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_counts_from_process_start_not_epoch() {
        let start = StartTime::now();
        // A fresh marker is seconds old, not decades.
        assert!(start.uptime_seconds() < 60);
    }
}
