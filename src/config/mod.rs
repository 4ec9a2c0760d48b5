//! Configuration management

use anyhow::{Context, Result};
use std::env;

use crate::access::InvalidTokenPolicy;
use crate::pipeline::DEFAULT_BODY_LIMIT;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Access control configuration
    pub access: AccessConfig,
    /// Maximum buffered size of body and form facets
    pub request_body_limit_bytes: usize,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Header carrying an API key
    pub api_key_header: String,
    /// Query parameter carrying an API key when the header is absent
    pub api_key_query_param: String,
    pub invalid_token_policy: InvalidTokenPolicy,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            api_key_header: "x-api-key".to_string(),
            api_key_query_param: "api-key".to_string(),
            invalid_token_policy: InvalidTokenPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
    /// `json` or `pretty`
    pub log_format: String,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_format: "pretty".to_string(),
            service_name: "typed-router".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").context("JWT_SECRET is required")?,
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "typed-router".to_string()),
                access_token_ttl_secs: env::var("JWT_ACCESS_TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
                leeway_secs: env::var("JWT_LEEWAY_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            access: AccessConfig {
                api_key_header: env::var("API_KEY_HEADER")
                    .unwrap_or_else(|_| "x-api-key".to_string())
                    .to_ascii_lowercase(),
                api_key_query_param: env::var("API_KEY_QUERY_PARAM")
                    .unwrap_or_else(|_| "api-key".to_string()),
                invalid_token_policy: env::var("INVALID_TOKEN_POLICY")
                    .unwrap_or_else(|_| "public".to_string())
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("Invalid INVALID_TOKEN_POLICY")?,
            },
            request_body_limit_bytes: env::var("REQUEST_BODY_LIMIT_BYTES")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("Invalid REQUEST_BODY_LIMIT_BYTES")?
                .unwrap_or(DEFAULT_BODY_LIMIT),
            telemetry: TelemetryConfig {
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(true),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "typed-router".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                issuer: "test".to_string(),
                access_token_ttl_secs: 3600,
                leeway_secs: 5,
            },
            access: AccessConfig::default(),
            request_body_limit_bytes: DEFAULT_BODY_LIMIT,
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn test_config_http_addr() {
        let config = test_config();
        assert_eq!(config.http_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_config_http_addr_ipv6() {
        let mut config = test_config();
        config.http_host = "::1".to_string();
        config.http_port = 3000;

        assert_eq!(config.http_addr(), "::1:3000");
    }

    #[test]
    fn test_config_clone() {
        let config = test_config();
        let cloned = config.clone();

        assert_eq!(config.http_host, cloned.http_host);
        assert_eq!(config.jwt.secret, cloned.jwt.secret);
        assert_eq!(
            config.access.invalid_token_policy,
            cloned.access.invalid_token_policy
        );
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let config = test_config();
        let debug_str = format!("{:?}", config.jwt);

        assert!(debug_str.contains("JwtConfig"));
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains("test-secret"));
    }

    #[test]
    fn test_access_config_defaults() {
        let access = AccessConfig::default();
        assert_eq!(access.api_key_header, "x-api-key");
        assert_eq!(access.api_key_query_param, "api-key");
        assert_eq!(access.invalid_token_policy, InvalidTokenPolicy::TreatAsPublic);
    }
}
