//! collection-unfolder — service entry point.
//!
//! Reads config from env vars (see `config::AppConfig`), wires the HTTP
//! clients for the writer, relations API, content resolver and queue proxy,
//! and serves the unfold endpoint plus admin endpoints.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use collection_unfolder::config::AppConfig;
use collection_unfolder::forwarder::HttpForwarder;
use collection_unfolder::health::HealthService;
use collection_unfolder::producer::{ContentProducer, HttpMessagePublisher, MessagePublisher};
use collection_unfolder::relations::HttpRelationsResolver;
use collection_unfolder::resolver::HttpContentResolver;
use collection_unfolder::routing::build_router;
use collection_unfolder::unfolder::Unfolder;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,collection_unfolder=debug".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    info!("starting with config {config:?}");

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .pool_max_idle_per_host(20)
        .build()
        .context("failed to create HTTP client")?;

    let publisher = Arc::new(HttpMessagePublisher::new(
        client.clone(),
        &config.queue_proxy_uri,
        &config.write_topic,
    )) as Arc<dyn MessagePublisher>;

    let unfolder = Arc::new(Unfolder::new(
        Arc::new(HttpRelationsResolver::new(
            client.clone(),
            config.relations_resolver_uri.clone(),
        )),
        Arc::new(HttpForwarder::new(client.clone(), config.writer_uri.clone())),
        Arc::new(HttpContentResolver::new(
            client.clone(),
            config.content_resolver_uri.clone(),
        )),
        ContentProducer::new(publisher),
        config.unfolding_whitelist.clone(),
    ));
    let health_service = Arc::new(HealthService::new(client, &config));

    let app = build_router(unfolder, health_service);
    let addr = format!("0.0.0.0:{}", config.app_port);
    info!("listening on {addr}");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
