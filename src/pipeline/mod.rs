//! Per-route request processing pipeline.
//!
//! A route's pipeline is an ordered list of [`ProcessingStep`]s run inside a
//! single axum middleware. Each step either hands the request on or halts with
//! a terminal response; nothing after a halt runs, including the handler.

mod validate;

pub use validate::{build, validate, ValidationStep, DEFAULT_BODY_LIMIT};

use std::{borrow::Cow, future::Future, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

/// Outcome of one processing step.
pub enum Flow {
    Continue(Request<Body>),
    Halt(Response),
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Continue(req) => f.debug_tuple("Continue").field(req.uri()).finish(),
            Flow::Halt(res) => f.debug_tuple("Halt").field(&res.status()).finish(),
        }
    }
}

/// A unit of per-request processing.
#[async_trait]
pub trait ProcessingStep: Send + Sync {
    async fn process(&self, request: Request<Body>) -> Flow;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("custom")
    }
}

/// Adapts an async closure into a [`ProcessingStep`].
pub struct FnStep<F> {
    name: &'static str,
    f: F,
}

pub fn step_fn<F, Fut>(name: &'static str, f: F) -> FnStep<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send,
{
    FnStep { name, f }
}

#[async_trait]
impl<F, Fut> ProcessingStep for FnStep<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send,
{
    async fn process(&self, request: Request<Body>) -> Flow {
        (self.f)(request).await
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.name)
    }
}

/// Ordered steps for one route.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn ProcessingStep>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Arc<dyn ProcessingStep>>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: Arc<dyn ProcessingStep>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().into_owned()).collect()
    }

    /// Runs every step in order, stopping at the first halt.
    pub async fn run(&self, mut request: Request<Body>) -> Flow {
        for step in &self.steps {
            match step.process(request).await {
                Flow::Continue(next) => request = next,
                Flow::Halt(response) => {
                    tracing::debug!(
                        step = %step.name(),
                        status = %response.status(),
                        "Pipeline halted"
                    );
                    return Flow::Halt(response);
                }
            }
        }
        Flow::Continue(request)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.step_names()).finish()
    }
}

/// Middleware running a route's pipeline in front of its handler.
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match pipeline.run(request).await {
        Flow::Continue(request) => next.run(request).await,
        Flow::Halt(response) => response,
    }
}
