//! `car-value`: a stdio tool provider with one placeholder tool.
//!
//! Stdout carries the protocol, so logs go to stderr.

mod valuation;

use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

use crate::valuation::CarValue;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "provider stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let service = CarValue::new().serve(stdio()).await?;
    let reason = service.waiting().await?;
    tracing::debug!(?reason, "client disconnected");
    Ok(())
}
