//! Unified error handling for typed-router

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::schema::Facet;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Message body for scope mismatches and unrecognized roles.
pub const INVALID_ACCESS_MESSAGE: &str = "Invalid access";
/// Message body for credential-handling failures.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Per-request error types
#[derive(Error, Debug)]
pub enum AppError {
    /// The raw facet could not be decoded into the schema's shape.
    #[error("Malformed {facet}: {message}")]
    MalformedFacet { facet: Facet, message: String },

    /// The facet decoded but violated declared constraints.
    #[error("Invalid {facet}: {message}")]
    Validation {
        facet: Facet,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Invalid access")]
    InvalidAccess,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A handler asked for a facet value under the wrong type, or for a facet
    /// that was never validated. Always a programming error.
    #[error("Facet {facet} is not available as {expected}")]
    FacetTypeMismatch {
        facet: Facet,
        expected: &'static str,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body for client-input failures
#[derive(Serialize)]
struct InvalidRequestBody {
    error: &'static str,
    facet: Facet,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MalformedFacet { facet, message } => (
                StatusCode::BAD_REQUEST,
                Json(InvalidRequestBody {
                    error: "invalid_request",
                    facet,
                    message,
                    details: None,
                }),
            )
                .into_response(),
            AppError::Validation {
                facet,
                message,
                details,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(InvalidRequestBody {
                    error: "invalid_request",
                    facet,
                    message,
                    details,
                }),
            )
                .into_response(),
            AppError::InvalidAccess => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": INVALID_ACCESS_MESSAGE })),
            )
                .into_response(),
            AppError::Unauthorized(reason) => {
                tracing::warn!(reason = %reason, "Access control step failed");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "message": UNAUTHORIZED_MESSAGE })),
                )
                    .into_response()
            }
            AppError::FacetTypeMismatch { facet, expected } => {
                tracing::error!(%facet, expected, "Handler requested facet with mismatched type");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "internal_error",
                        "message": "An internal error occurred",
                    })),
                )
                    .into_response()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "internal_error",
                        "message": "An internal error occurred",
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl AppError {
    /// Builds a constraint-violation error from `validator` output.
    pub fn from_violations(facet: Facet, errors: &validator::ValidationErrors) -> Self {
        AppError::Validation {
            facet,
            message: describe_violations(errors),
            details: serde_json::to_value(errors).ok(),
        }
    }
}

/// Renders `field: message` pairs, sorted by field, falling back to the
/// constraint code when no custom message was declared.
pub fn describe_violations(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let field = field.to_string();
            field_errors.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: failed `{}` constraint", e.code),
            })
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        errors.to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 3))]
        name: String,
        #[validate(range(min = 1, message = "age must be positive"))]
        age: i64,
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = AppError::MalformedFacet {
            facet: Facet::Query,
            message: "missing field `page`".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed query: missing field `page`");
    }

    #[test]
    fn test_error_conversion() {
        let err: AppError = anyhow::anyhow!("Something went wrong").into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_describe_violations_uses_code_and_custom_message() {
        let errors = Named {
            name: "ab".to_string(),
            age: 0,
        }
        .validate()
        .unwrap_err();

        assert_eq!(
            describe_violations(&errors),
            "age: age must be positive; name: failed `length` constraint"
        );
    }

    #[tokio::test]
    async fn test_invalid_access_body_is_exact() {
        let response = AppError::InvalidAccess.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "message": "Invalid access" }));
    }

    #[tokio::test]
    async fn test_unauthorized_body_hides_reason() {
        let response = AppError::Unauthorized("header not utf-8".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "message": "Unauthorized" }));
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let errors = Named {
            name: "ab".to_string(),
            age: 3,
        }
        .validate()
        .unwrap_err();

        let response = AppError::from_violations(Facet::Param, &errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(body["facet"], "param");
        assert!(body["message"].as_str().unwrap().contains("length"));
        assert_eq!(body["details"]["name"][0]["code"], "length");
    }

    #[test]
    fn test_violations_keep_the_failing_facet() {
        let errors = Named {
            name: "ab".to_string(),
            age: 3,
        }
        .validate()
        .unwrap_err();

        for facet in Facet::CANONICAL_ORDER {
            match AppError::from_violations(facet, &errors) {
                AppError::Validation { facet: reported, .. } => assert_eq!(reported, facet),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_facet_is_bad_request() {
        let response = AppError::MalformedFacet {
            facet: Facet::Body,
            message: "expected value".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = AppError::FacetTypeMismatch {
            facet: Facet::Cookie,
            expected: "u32",
        };
        assert_eq!(err.to_string(), "Facet cookie is not available as u32");
    }
}
