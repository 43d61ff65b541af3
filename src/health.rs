//! Health and good-to-go endpoints.
//!
//! The service is healthy when every collaborator it depends on — the
//! writer, the relations API, the content resolver and the queue proxy — is
//! reachable and answers 200 on its health URI.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::config::AppConfig;
use crate::routing::AppState;

pub struct HealthService {
    client: reqwest::Client,
    checks: Vec<CollaboratorCheck>,
}

struct CollaboratorCheck {
    name: &'static str,
    business_impact: &'static str,
    uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    name: &'static str,
    ok: bool,
    checks: Vec<CheckResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResult {
    name: &'static str,
    business_impact: &'static str,
    ok: bool,
    output: String,
}

impl HealthService {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        let checks = vec![
            CollaboratorCheck {
                name: "collection writer",
                business_impact: "collection updates will not be persisted",
                uri: config.writer_health_uri.clone(),
            },
            CollaboratorCheck {
                name: "relations api",
                business_impact: "membership deltas cannot be computed, no notifications",
                uri: config.relations_resolver_health_uri.clone(),
            },
            CollaboratorCheck {
                name: "content resolver",
                business_impact: "no notifications will be created for unfolded collections",
                uri: config.content_resolver_health_uri.clone(),
            },
            CollaboratorCheck {
                name: "queue proxy",
                business_impact: "no notifications will be created for unfolded collections",
                uri: config.queue_health_uri.clone(),
            },
        ];
        Self { client, checks }
    }

    async fn run_checks(&self) -> HealthReport {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let (ok, output) = match probe(&self.client, &check.uri).await {
                Ok(()) => (true, "OK".to_string()),
                Err(msg) => (false, msg),
            };
            results.push(CheckResult {
                name: check.name,
                business_impact: check.business_impact,
                ok,
                output,
            });
        }
        HealthReport {
            name: "collection-unfolder",
            ok: results.iter().all(|r| r.ok),
            checks: results,
        }
    }

    /// First failing check, if any. All probes run concurrently and the
    /// first failure to complete wins; the rest are abandoned.
    async fn first_failure(&self) -> Option<String> {
        let mut probes = JoinSet::new();
        for check in &self.checks {
            let client = self.client.clone();
            let uri = check.uri.clone();
            let name = check.name;
            probes.spawn(async move {
                probe(&client, &uri)
                    .await
                    .err()
                    .map(|msg| format!("{name}: {msg}"))
            });
        }

        while let Some(result) = probes.join_next().await {
            if let Ok(Some(failure)) = result {
                probes.abort_all();
                return Some(failure);
            }
        }
        None
    }
}

async fn probe(client: &reqwest::Client, uri: &str) -> Result<(), String> {
    let resp = client
        .get(uri)
        .send()
        .await
        .map_err(|e| format!("error contacting the service: {e}"))?;
    if resp.status().as_u16() != 200 {
        return Err(format!(
            "service did not respond with OK, status was {}",
            resp.status()
        ));
    }
    Ok(())
}

/// `GET /__health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.run_checks().await)
}

/// `GET /__gtg`
pub async fn gtg(State(state): State<AppState>) -> impl IntoResponse {
    match state.health.first_failure().await {
        None => (StatusCode::OK, "OK".to_string()),
        Some(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
    }
}

/// `GET /__ping`
pub async fn ping() -> &'static str {
    "pong"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    name: &'static str,
    version: &'static str,
}

/// `GET /__build-info`
pub async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
