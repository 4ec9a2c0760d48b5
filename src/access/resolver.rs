//! Credential → scope resolution.

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;

use super::{AccessScope, Identity, ResolvedScope};

/// Turns a bearer token into an identity. Treated as untrusted: every error
/// is contained by the resolver.
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode(&self, token: &str) -> anyhow::Result<Identity>;
}

/// How a token that fails to decode is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidTokenPolicy {
    /// Same as presenting no credentials.
    #[default]
    TreatAsPublic,
    /// Resolves to [`ResolvedScope::Unknown`], which is always denied.
    Reject,
}

impl FromStr for InvalidTokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(InvalidTokenPolicy::TreatAsPublic),
            "reject" => Ok(InvalidTokenPolicy::Reject),
            other => Err(format!(
                "invalid token policy `{other}`, expected `public` or `reject`"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub scope: ResolvedScope,
    /// Decoded identity. Present for any successfully decoded token, including
    /// ones whose role is not recognized.
    pub identity: Option<Identity>,
}

impl Resolution {
    fn public() -> Self {
        Self {
            scope: ResolvedScope::PUBLIC,
            identity: None,
        }
    }
}

#[derive(Clone)]
pub struct ScopeResolver {
    decoder: Arc<dyn TokenDecoder>,
    invalid_token: InvalidTokenPolicy,
}

impl ScopeResolver {
    pub fn new(decoder: Arc<dyn TokenDecoder>) -> Self {
        Self {
            decoder,
            invalid_token: InvalidTokenPolicy::default(),
        }
    }

    pub fn with_invalid_token_policy(mut self, policy: InvalidTokenPolicy) -> Self {
        self.invalid_token = policy;
        self
    }

    pub fn invalid_token_policy(&self) -> InvalidTokenPolicy {
        self.invalid_token
    }

    /// Determines the caller's scope. A token takes precedence over an API key;
    /// empty strings count as absent.
    pub async fn resolve(&self, token: Option<&str>, api_key: Option<&str>) -> Resolution {
        let token = token.filter(|t| !t.is_empty());
        let api_key = api_key.filter(|k| !k.is_empty());

        match (token, api_key) {
            (Some(token), _) => self.resolve_token(token).await,
            (None, Some(_)) => Resolution {
                scope: AccessScope::ApiKey.into(),
                identity: None,
            },
            (None, None) => Resolution::public(),
        }
    }

    async fn resolve_token(&self, token: &str) -> Resolution {
        let identity = match self.decoder.decode(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    policy = ?self.invalid_token,
                    "Bearer token rejected by decoder"
                );
                return match self.invalid_token {
                    InvalidTokenPolicy::TreatAsPublic => Resolution::public(),
                    InvalidTokenPolicy::Reject => Resolution {
                        scope: ResolvedScope::Unknown,
                        identity: None,
                    },
                };
            }
        };

        let scope = AccessScope::for_role(&identity.role)
            .map(ResolvedScope::Scope)
            .unwrap_or(ResolvedScope::Unknown);

        Resolution {
            scope,
            identity: Some(identity),
        }
    }
}

impl std::fmt::Debug for ScopeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeResolver")
            .field("invalid_token", &self.invalid_token)
            .finish_non_exhaustive()
    }
}
