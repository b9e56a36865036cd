// HTTP API for the crafted-market backend: ratings, quality reports,
// and moderation endpoints behind bearer-token auth.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ReportState};
