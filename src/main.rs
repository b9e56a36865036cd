use anyhow::{Context, Result};
use dotenv::dotenv;
use std::time::Duration;
use tracing::{error, info, warn};

use crafted_market::ai::GeminiClient;
use crafted_market::api::{ApiServer, ReportState};
use crafted_market::config::AppConfig;
use crafted_market::error::AppError;
use crafted_market::notify::Mailer;
use crafted_market::reports::{pipeline, ReportRunConfig};
use crafted_market::store::Db;
use crafted_market::util::env as env_util;

#[tokio::main]
async fn main() -> Result<()> {
    // --- logging -------------------------------------------------------------
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    // --- configuration -------------------------------------------------------
    env_util::preflight_check(
        "crafted-market",
        &["API_SECRET"],
        &[
            "API_HOST",
            "API_PORT",
            "DATABASE_URL",
            "GEMINI_API_KEY",
            "GEMINI_MODEL",
            "MAIL_RELAY_URL",
        ],
    )?;
    let config = AppConfig::from_env()?;

    // --- DB connect ----------------------------------------------------------
    let database_url = env_util::db_url().context("database URL not configured")?;
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_conns)
        .await
        .context("Db::connect failed")?;

    let mailer = Mailer::new(&config.mail);
    let run_cfg = ReportRunConfig::default();

    // Missing credential is fatal for report generation but not for serving
    // the rest of the API.
    let gemini = match GeminiClient::new(&config.gemini) {
        Ok(client) => Some(client),
        Err(e) => {
            let fatal = AppError::FatalConfig(e.to_string());
            error!(error = %fatal, "report generation disabled");
            None
        }
    };

    // --- deferred startup report run -----------------------------------------
    // Runs once shortly after boot so the listener binds first; the HTTP
    // server never waits on it.
    if let Some(client) = gemini.clone() {
        let db_reports = db.clone();
        let cfg = run_cfg.clone();
        let delay: u64 = env_util::env_parse("STARTUP_REPORT_DELAY_SECS", 5u64);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay)).await;
            match pipeline::run_all(&db_reports, &db_reports, &client, &cfg).await {
                Ok(summary) => {
                    info!(
                        successes = summary.successes.len(),
                        failures = summary.failures.len(),
                        "startup report run complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "startup report run failed");
                }
            }
        });
    } else {
        warn!("skipping startup report run: no AI credential");
    }

    // --- HTTP API ------------------------------------------------------------
    let server = ApiServer::new(&config.http);
    let report_state = ReportState::new(gemini, run_cfg);
    server.run(db, report_state, mailer).await?;

    info!("server stopped — goodbye");
    Ok(())
}
