//! Access control processing step.

use std::borrow::Cow;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderName, Request},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    pipeline::{Flow, ProcessingStep},
    telemetry::metrics::ACCESS_DENIED,
};

use super::{AccessScope, ResolvedScope, ScopeResolver, ScopeSet};

pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_API_KEY_QUERY_PARAM: &str = "api-key";

/// Where to look for credentials on an incoming request.
#[derive(Debug, Clone)]
pub struct CredentialSource {
    pub api_key_header: HeaderName,
    pub api_key_query_param: String,
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self {
            api_key_header: HeaderName::from_static(DEFAULT_API_KEY_HEADER),
            api_key_query_param: DEFAULT_API_KEY_QUERY_PARAM.to_string(),
        }
    }
}

impl CredentialSource {
    /// Reads `(bearer token, api key)` from the request.
    ///
    /// The token is the second whitespace-separated word of `Authorization`.
    /// The API key comes from the configured header, falling back to the
    /// query parameter.
    pub fn read(
        &self,
        request: &Request<Body>,
    ) -> Result<(Option<String>, Option<String>), AppError> {
        let token = match request.headers().get(AUTHORIZATION) {
            Some(value) => value
                .to_str()
                .map_err(|_| {
                    AppError::Unauthorized("authorization header is not valid UTF-8".to_string())
                })?
                .split_whitespace()
                .nth(1)
                .map(str::to_string),
            None => None,
        };

        let header_key = match request.headers().get(&self.api_key_header) {
            Some(value) => Some(value.to_str().map_err(|_| {
                AppError::Unauthorized("api key header is not valid UTF-8".to_string())
            })?),
            None => None,
        };

        // An empty header falls back to the query parameter.
        let api_key = header_key
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| {
                request.uri().query().and_then(|query| {
                    url::form_urlencoded::parse(query.as_bytes())
                        .find(|(name, _)| name == self.api_key_query_param.as_str())
                        .map(|(_, value)| value.into_owned())
                })
            });

        Ok((token, api_key))
    }
}

/// Guards a route: resolves the caller's scope and admits or rejects them.
#[derive(Debug, Clone)]
pub struct AccessControl {
    expected: ScopeSet,
    resolver: ScopeResolver,
    credentials: CredentialSource,
}

/// Builds the access control step admitting `expected` scopes.
pub fn authorize(
    expected: ScopeSet,
    resolver: ScopeResolver,
    credentials: CredentialSource,
) -> AccessControl {
    AccessControl {
        expected,
        resolver,
        credentials,
    }
}

impl AccessControl {
    pub fn expected(&self) -> &ScopeSet {
        &self.expected
    }

    fn deny(&self, reason: &'static str, err: AppError) -> Flow {
        metrics::counter!(ACCESS_DENIED, "reason" => reason).increment(1);
        Flow::Halt(err.into_response())
    }
}

#[async_trait]
impl ProcessingStep for AccessControl {
    async fn process(&self, mut request: Request<Body>) -> Flow {
        let (token, api_key) = match self.credentials.read(&request) {
            Ok(credentials) => credentials,
            Err(err) => return self.deny("unreadable_credentials", err),
        };

        let resolution = self
            .resolver
            .resolve(token.as_deref(), api_key.as_deref())
            .await;

        match resolution.scope {
            // Anonymous callers are admitted regardless of the expected scopes.
            ResolvedScope::Scope(AccessScope::Public) => {
                request.extensions_mut().insert(AccessScope::Public);
                Flow::Continue(request)
            }
            ResolvedScope::Unknown => {
                tracing::debug!(
                    uri = %request.uri().path(),
                    "Access denied: unrecognized credentials"
                );
                self.deny("unknown_scope", AppError::InvalidAccess)
            }
            ResolvedScope::Scope(scope) if self.expected.contains(scope) => {
                if let Some(identity) = resolution.identity {
                    request.extensions_mut().insert(identity);
                }
                request.extensions_mut().insert(scope);
                Flow::Continue(request)
            }
            ResolvedScope::Scope(scope) => {
                tracing::debug!(
                    uri = %request.uri().path(),
                    %scope,
                    expected = ?self.expected.scopes(),
                    "Access denied: scope not admitted"
                );
                self.deny("scope_mismatch", AppError::InvalidAccess)
            }
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("access_control")
    }
}
