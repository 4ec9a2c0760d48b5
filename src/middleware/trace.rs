//! TraceLayer span maker that keeps credentials out of request spans.

use std::sync::Arc;

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;
use url::form_urlencoded;

/// Query parameters always redacted, on top of the configured API key name.
const SENSITIVE_PARAMS: &[&str] = &["token", "access_token", "api-key", "api_key"];

/// Builds request spans with sensitive query values replaced by `[REDACTED]`.
#[derive(Clone, Debug)]
pub struct SanitizedMakeSpan {
    extra: Arc<[String]>,
}

impl SanitizedMakeSpan {
    /// `api_key_param` is the query parameter callers may pass an API key in.
    pub fn new(api_key_param: &str) -> Self {
        Self {
            extra: Arc::from(vec![api_key_param.to_ascii_lowercase()]),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        SENSITIVE_PARAMS.contains(&key.as_str()) || self.extra.iter().any(|s| *s == key)
    }

    fn sanitize_uri(&self, uri: &axum::http::Uri) -> String {
        let Some(query) = uri.query() else {
            return uri.path().to_string();
        };

        let pairs: Vec<String> = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, _)) if self.is_sensitive(&decode_key(key)) => {
                    format!("{key}=[REDACTED]")
                }
                _ => pair.to_string(),
            })
            .collect();

        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}

/// Decodes a raw query key the way credential extraction does.
fn decode_key(raw: &str) -> String {
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

impl Default for SanitizedMakeSpan {
    fn default() -> Self {
        Self {
            extra: Arc::from(Vec::new()),
        }
    }
}

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %self.sanitize_uri(request.uri()),
            version = ?request.version(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::CredentialSource;
    use axum::http::Uri;

    #[test]
    fn test_no_query_params() {
        let uri: Uri = "/hello/abc".parse().unwrap();
        assert_eq!(SanitizedMakeSpan::default().sanitize_uri(&uri), "/hello/abc");
    }

    #[test]
    fn test_no_sensitive_params() {
        let uri: Uri = "/hi/abc?greeting=hey&page=1".parse().unwrap();
        assert_eq!(
            SanitizedMakeSpan::default().sanitize_uri(&uri),
            "/hi/abc?greeting=hey&page=1"
        );
    }

    #[test]
    fn test_default_api_key_redacted() {
        let uri: Uri = "/me?api-key=s3cret&x=1".parse().unwrap();
        assert_eq!(
            SanitizedMakeSpan::default().sanitize_uri(&uri),
            "/me?api-key=[REDACTED]&x=1"
        );
    }

    #[test]
    fn test_configured_param_redacted_case_insensitively() {
        let uri: Uri = "/me?Key=s3cret&token=abc".parse().unwrap();
        assert_eq!(
            SanitizedMakeSpan::new("key").sanitize_uri(&uri),
            "/me?Key=[REDACTED]&token=[REDACTED]"
        );
    }

    #[test]
    fn test_percent_encoded_key_redacted() {
        let uri: Uri = "/me?api%2Dkey=s3cret&ac%63ess_token=t0k&x=1".parse().unwrap();
        assert_eq!(
            SanitizedMakeSpan::default().sanitize_uri(&uri),
            "/me?api%2Dkey=[REDACTED]&ac%63ess_token=[REDACTED]&x=1"
        );
    }

    #[test]
    fn test_redacts_every_key_credential_reading_accepts() {
        let request = Request::get("/me?api%2Dkey=s3cret")
            .body(axum::body::Body::empty())
            .unwrap();
        let (_, api_key) = CredentialSource::default().read(&request).unwrap();
        assert_eq!(api_key.as_deref(), Some("s3cret"));

        let sanitized = SanitizedMakeSpan::default().sanitize_uri(request.uri());
        assert!(!sanitized.contains("s3cret"));
    }
}
