use anyhow::Context;
use oidc_bridge::api::{self, AppState};
use oidc_bridge::config::{Config, KvBackend};
use rust_common::{init_tracing, KvStore, MemoryKvStore, RedisKvStore, TracingConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    init_tracing(
        &TracingConfig::default()
            .with_service_name("oidc-bridge")
            .with_log_level(config.log_level.clone())
            .with_json_output(config.log_json),
    );

    info!("Starting OIDC bridge");

    let kv: Arc<dyn KvStore> = match &config.kv_backend {
        KvBackend::Memory => {
            warn!("using in-memory key store; keys are not shared between replicas");
            Arc::new(MemoryKvStore::new())
        }
        KvBackend::Redis { url } => Arc::new(
            RedisKvStore::connect(url, "oidc-bridge")
                .await
                .context("failed to connect to redis")?,
        ),
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let state = AppState::new(config, kv)?;
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "OIDC bridge listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("OIDC bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
