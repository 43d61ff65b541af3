//! Service configuration, read once from the environment at startup and
//! injected as an immutable value.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_port: u16,
    /// Writer base URI; the collection type and uuid are appended on forward.
    pub writer_uri: String,
    pub writer_health_uri: String,
    /// Relations API URI with a `{uuid}` placeholder.
    pub relations_resolver_uri: String,
    pub relations_resolver_health_uri: String,
    pub content_resolver_uri: String,
    pub content_resolver_health_uri: String,
    /// Message-queue HTTP proxy base URI.
    pub queue_proxy_uri: String,
    pub queue_health_uri: String,
    pub write_topic: String,
    /// Collection types for which unfolding is performed at all.
    pub unfolding_whitelist: HashSet<String>,
    pub http_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let app_port = env_or("APP_PORT", "8080")
            .parse::<u16>()
            .context("APP_PORT must be a valid port number")?;
        let timeout_secs = env_or("HTTP_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .context("HTTP_TIMEOUT_SECS must be a number of seconds")?;

        Ok(Self {
            app_port,
            writer_uri: env_or(
                "WRITER_URI",
                "http://localhost:8080/__content-collection-rw/content-collection",
            ),
            writer_health_uri: env_or(
                "WRITER_HEALTH_URI",
                "http://localhost:8080/__content-collection-rw/__health",
            ),
            relations_resolver_uri: env_or(
                "RELATIONS_RESOLVER_URI",
                "http://localhost:8080/__relations-api/contentcollection/{uuid}/relations",
            ),
            relations_resolver_health_uri: env_or(
                "RELATIONS_RESOLVER_HEALTH_URI",
                "http://localhost:8080/__relations-api/__health",
            ),
            content_resolver_uri: env_or(
                "CONTENT_RESOLVER_URI",
                "http://localhost:8080/__document-store-api/content",
            ),
            content_resolver_health_uri: env_or(
                "CONTENT_RESOLVER_HEALTH_URI",
                "http://localhost:8080/__document-store-api/__health",
            ),
            queue_proxy_uri: env_or("QUEUE_PROXY_URI", "http://localhost:8080/__kafka-proxy"),
            queue_health_uri: env_or(
                "QUEUE_HEALTH_URI",
                "http://localhost:8080/__kafka-proxy/topics",
            ),
            write_topic: env_or("WRITE_TOPIC", "PostPublicationEvents"),
            unfolding_whitelist: parse_whitelist(&env_or("UNFOLDING_WHITELIST", "content-package")),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_whitelist(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
