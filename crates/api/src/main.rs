use anyhow::Context;

use turnstile_api::config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("invalid configuration")?;
    turnstile_observability::init(config.log_format());

    let app = turnstile_api::app::build_app(&config)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "startup failed"))?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
