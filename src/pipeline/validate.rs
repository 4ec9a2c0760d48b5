//! Facet validation steps.

use std::{borrow::Cow, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    schema::{Facet, FacetSchema, RawRequest, SchemaDescriptor, ValidView},
    telemetry::metrics::VALIDATION_FAILURES,
};

use super::{Flow, ProcessingStep};

/// Body buffering limit applied when none is configured.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Validates one facet and records the decoded value in the [`ValidView`].
#[derive(Clone)]
pub struct ValidationStep {
    facet: Facet,
    schema: Arc<dyn FacetSchema>,
    body_limit: usize,
}

/// Builds the step validating `facet` against `schema`.
pub fn validate(facet: Facet, schema: Arc<dyn FacetSchema>) -> ValidationStep {
    ValidationStep {
        facet,
        schema,
        body_limit: DEFAULT_BODY_LIMIT,
    }
}

/// One validation step per declared facet, in canonical facet order.
pub fn build(descriptor: &SchemaDescriptor) -> Vec<ValidationStep> {
    descriptor
        .facets()
        .into_iter()
        .filter_map(|facet| {
            descriptor
                .get(facet)
                .map(|schema| validate(facet, schema.clone()))
        })
        .collect()
}

impl ValidationStep {
    pub fn facet(&self) -> Facet {
        self.facet
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    fn reject(&self, err: AppError) -> Flow {
        let kind = match &err {
            AppError::MalformedFacet { .. } => "malformed",
            AppError::Validation { .. } => "constraint",
            _ => "other",
        };
        metrics::counter!(
            VALIDATION_FAILURES,
            "facet" => self.facet.as_str(),
            "kind" => kind,
        )
        .increment(1);
        tracing::debug!(facet = %self.facet, kind, error = %err, "Request facet rejected");

        Flow::Halt(err.into_response())
    }
}

#[async_trait]
impl ProcessingStep for ValidationStep {
    async fn process(&self, request: Request<Body>) -> Flow {
        let (mut parts, body) = request.into_parts();

        // Body facets consume the stream; hand a rebuilt body to later steps.
        let (body, buffered) = if self.facet.reads_body() {
            match to_bytes(body, self.body_limit).await {
                Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
                Err(e) => {
                    return self.reject(AppError::MalformedFacet {
                        facet: self.facet,
                        message: format!("Failed to buffer request body: {e}"),
                    })
                }
            }
        } else {
            (body, None)
        };

        let decoded = self
            .schema
            .decode(
                self.facet,
                RawRequest {
                    parts: &mut parts,
                    body: buffered,
                },
            )
            .await;

        match decoded {
            Ok(value) => {
                parts
                    .extensions
                    .get_or_insert_default::<ValidView>()
                    .insert(self.facet, value);
                Flow::Continue(Request::from_parts(parts, body))
            }
            Err(err) => self.reject(err),
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("validate:{}", self.facet))
    }
}
