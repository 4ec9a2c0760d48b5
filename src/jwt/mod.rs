//! JWT identity tokens

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::access::{Identity, TokenDecoder};
use crate::config::JwtConfig;

/// Identity token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Identity payload
    #[serde(flatten)]
    pub identity: Identity,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = self.config.leeway_secs;
        v.validate_aud = false;
        v.set_issuer(&[&self.config.issuer]);
        v
    }

    /// Create an identity token for `identity`
    pub fn create_identity_token(
        &self,
        identity: &Identity,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_ttl_secs);

        let claims = IdentityClaims {
            sub: identity.id.clone(),
            iss: self.config.issuer.clone(),
            identity: identity.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Verify and decode an identity token
    pub fn verify_identity_token(
        &self,
        token: &str,
    ) -> Result<IdentityClaims, jsonwebtoken::errors::Error> {
        let token_data =
            decode::<IdentityClaims>(token, &self.decoding_key, &self.strict_validation())?;
        Ok(token_data.claims)
    }

    pub fn access_token_ttl(&self) -> i64 {
        self.config.access_token_ttl_secs
    }
}

#[async_trait]
impl TokenDecoder for JwtManager {
    async fn decode(&self, token: &str) -> anyhow::Result<Identity> {
        Ok(self.verify_identity_token(token)?.identity)
    }
}
