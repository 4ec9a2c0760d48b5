use std::{future::Future, pin::Pin, sync::Arc};

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::{
    access::AccessScope,
    context::RequestContext,
    pipeline::ProcessingStep,
    schema::SchemaShape,
};

pub(crate) type BoxedHandler<S> = Arc<
    dyn Fn(RequestContext<S>) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync,
>;

/// Where an extra step runs relative to facet validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOrder {
    BeforeValidation,
    AfterValidation,
}

/// Human-facing route metadata shown in the route catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteDocs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl RouteDocs {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Everything needed to register one route.
///
/// Access scope defaults to `[User]`: a route is only public when it says so.
pub struct RouteDef<S: SchemaShape> {
    pub(crate) access_scope: Option<Vec<AccessScope>>,
    pub(crate) schema: S,
    pub(crate) before: Vec<Arc<dyn ProcessingStep>>,
    pub(crate) after: Vec<Arc<dyn ProcessingStep>>,
    pub(crate) docs: Option<RouteDocs>,
    pub(crate) handler: BoxedHandler<S>,
}

impl<S: SchemaShape> RouteDef<S> {
    pub fn new<F, Fut, R>(schema: S, handler: F) -> Self
    where
        F: Fn(RequestContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let handler: BoxedHandler<S> = Arc::new(
            move |ctx: RequestContext<S>| -> Pin<Box<dyn Future<Output = Response> + Send>> {
                let fut = handler(ctx);
                Box::pin(async move { fut.await.into_response() })
            },
        );

        Self {
            access_scope: None,
            schema,
            before: Vec::new(),
            after: Vec::new(),
            docs: None,
            handler,
        }
    }

    /// Scopes admitted by this route. An empty list fails registration.
    pub fn access_scope(mut self, scopes: impl IntoIterator<Item = AccessScope>) -> Self {
        self.access_scope = Some(scopes.into_iter().collect());
        self
    }

    /// Adds an extra step around validation. Steps with the same order run
    /// in the order they were added.
    pub fn middleware(mut self, order: StepOrder, step: impl ProcessingStep + 'static) -> Self {
        let step: Arc<dyn ProcessingStep> = Arc::new(step);
        match order {
            StepOrder::BeforeValidation => self.before.push(step),
            StepOrder::AfterValidation => self.after.push(step),
        }
        self
    }

    pub fn docs(mut self, docs: RouteDocs) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{step_fn, Flow};
    use crate::schema::NoSchema;

    fn def() -> RouteDef<NoSchema> {
        RouteDef::new(NoSchema::new(), |_ctx| async { "ok" })
    }

    #[test]
    fn test_defaults() {
        let def = def();
        assert!(def.access_scope.is_none());
        assert!(def.before.is_empty());
        assert!(def.after.is_empty());
        assert!(def.docs.is_none());
    }

    #[test]
    fn test_middleware_ordering_buckets() {
        let def = def()
            .middleware(
                StepOrder::AfterValidation,
                step_fn("audit", |req| async { Flow::Continue(req) }),
            )
            .middleware(
                StepOrder::BeforeValidation,
                step_fn("trace", |req| async { Flow::Continue(req) }),
            );

        assert_eq!(def.before[0].name(), "trace");
        assert_eq!(def.after[0].name(), "audit");
    }

    #[test]
    fn test_docs_builder() {
        let docs = RouteDocs::new("Say hello")
            .description("Greets the caller")
            .tag("demo")
            .tag("greeting");

        assert_eq!(docs.summary.as_deref(), Some("Say hello"));
        assert_eq!(docs.tags, vec!["demo", "greeting"]);
        assert_eq!(
            serde_json::to_value(RouteDocs::default()).unwrap(),
            serde_json::json!({})
        );
    }
}
