//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use typed_router::{
    access::{Identity, InvalidTokenPolicy, Role, TokenScope},
    config::{AccessConfig, Config, JwtConfig, TelemetryConfig},
    jwt::JwtManager,
    pipeline::DEFAULT_BODY_LIMIT,
    registrar::Registrar,
    server,
};

pub fn test_config() -> Config {
    Config {
        http_host: "127.0.0.1".to_string(),
        http_port: 0,
        jwt: JwtConfig {
            secret: "integration-test-secret-key".to_string(),
            issuer: "https://typed-router.test".to_string(),
            access_token_ttl_secs: 3600,
            leeway_secs: 5,
        },
        access: AccessConfig::default(),
        request_body_limit_bytes: DEFAULT_BODY_LIMIT,
        telemetry: TelemetryConfig {
            metrics_enabled: false,
            ..TelemetryConfig::default()
        },
    }
}

pub fn identity(role: Role) -> Identity {
    Identity {
        id: "u1001".to_string(),
        email: "jane@example.com".to_string(),
        first_name: "Jane".to_string(),
        last_name: Some("Doe".to_string()),
        role,
        scope: TokenScope::Access,
        organization: None,
    }
}

/// A router under test plus the token manager its resolver trusts.
pub struct TestApp {
    pub config: Config,
    pub jwt: JwtManager,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_policy(policy: InvalidTokenPolicy) -> Self {
        let mut config = test_config();
        config.access.invalid_token_policy = policy;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let jwt = JwtManager::new(config.jwt.clone());
        Self { config, jwt }
    }

    pub fn token(&self, role: Role) -> String {
        self.jwt
            .create_identity_token(&identity(role))
            .expect("token should encode")
    }

    /// An empty registrar wired like the server's.
    pub fn registrar(&self) -> Registrar {
        server::registrar(&self.config, Arc::new(self.jwt.clone())).expect("registrar")
    }

    /// The demo server router.
    pub fn router(&self) -> Router {
        server::build_router(&self.config, Arc::new(self.jwt.clone()), None).expect("router")
    }
}

pub fn bearer(request: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    request.header(AUTHORIZATION, format!("Bearer {token}"))
}

/// Sends `request` and returns the status with the body parsed as JSON
/// (or `Value::String` when it isn't JSON).
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.oneshot(request).await.expect("request should complete");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");

    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, body)
}
