use std::sync::Arc;

use anyhow::Context;

use campus_api::app::{build_app, build_services};
use campus_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    campus_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    let services = build_services(&config)
        .await
        .context("failed to wire services")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, tenant_mode = ?config.tenant_mode, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
