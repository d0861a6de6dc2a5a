use anyhow::Result;
use axum::{Router, http::StatusCode, routing::get};
use owo_colors::OwoColorize;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

pub const HEALTH_PORT: u16 = 8080;

/// Readiness endpoint for K8s. Answers 200 unconditionally; liveness of
/// the watch loop is not probed here.
pub async fn run_health(shutdown: CancellationToken) -> Result<()> {
    let port = HEALTH_PORT;
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let app = Router::new().route("/healthz", get(|| async { StatusCode::OK }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("{}", format!("🩺 healthz listening on :{port}").green());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
