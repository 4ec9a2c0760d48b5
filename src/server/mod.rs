//! Server initialization and routing

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderName, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::access::{CredentialSource, ScopeResolver, TokenDecoder};
use crate::config::Config;
use crate::jwt::JwtManager;
use crate::middleware::SanitizedMakeSpan;
use crate::registrar::Registrar;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics: Prometheus text exposition format.
pub async fn metrics_handler(
    State(handle): State<Arc<Option<PrometheusHandle>>>,
) -> impl IntoResponse {
    match handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "Metrics not enabled".to_string()),
    }
}

/// A registrar wired to `config`'s credential and body settings.
pub fn registrar(config: &Config, decoder: Arc<dyn TokenDecoder>) -> Result<Registrar> {
    let resolver =
        ScopeResolver::new(decoder).with_invalid_token_policy(config.access.invalid_token_policy);

    let credentials = CredentialSource {
        api_key_header: HeaderName::try_from(config.access.api_key_header.as_str())
            .context("Invalid API_KEY_HEADER")?,
        api_key_query_param: config.access.api_key_query_param.clone(),
    };

    Ok(Registrar::new(resolver)
        .with_credentials(credentials)
        .with_body_limit(config.request_body_limit_bytes))
}

/// Build the HTTP router with the demo routes, health and metrics.
pub fn build_router(
    config: &Config,
    decoder: Arc<dyn TokenDecoder>,
    prometheus: Option<PrometheusHandle>,
) -> Result<Router> {
    let mut registrar = registrar(config, decoder)?;
    routes::register(&mut registrar).context("Failed to register routes")?;

    let mut router = registrar.into_router().route("/health", get(health));
    if prometheus.is_some() {
        router = router.route(
            "/metrics",
            get(metrics_handler).with_state(Arc::new(prometheus)),
        );
    }

    Ok(router.layer(
        TraceLayer::new_for_http()
            .make_span_with(SanitizedMakeSpan::new(&config.access.api_key_query_param)),
    ))
}

/// Run the HTTP server until it fails.
pub async fn run(config: Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    let decoder: Arc<dyn TokenDecoder> = Arc::new(JwtManager::new(config.jwt.clone()));
    let app = build_router(&config, decoder, prometheus)?;

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_structure() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
        };

        assert_eq!(response.status, "healthy");
        assert_eq!(response.version, "0.1.0");
    }

    #[tokio::test]
    async fn test_metrics_handler_disabled() {
        let response = metrics_handler(State(Arc::new(None))).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
