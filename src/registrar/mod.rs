//! Route registration façade.
//!
//! Every route gets the same pipeline shape: access control, any extra
//! before-validation steps, one validation step per declared facet in
//! canonical order, any extra after-validation steps, then the handler.
//! Problems are reported as [`RegistrationError`] so a misconfigured route
//! fails startup instead of silently disappearing.

mod route;

pub use route::{RouteDef, RouteDocs, StepOrder};

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{on, MethodFilter},
    Router,
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    access::{authorize, AccessScope, CredentialSource, ScopeResolver, ScopeSet},
    context::RequestContext,
    pipeline::{self, pipeline_middleware, Pipeline, ProcessingStep, DEFAULT_BODY_LIMIT},
    schema::{Facet, SchemaShape},
    telemetry::metrics::ROUTES_REGISTERED,
};

/// Startup-time route declaration defects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Method {0} cannot be routed")]
    UnsupportedMethod(Method),

    #[error("Route {method} {path} declares no access scopes; use [Public] for open routes")]
    EmptyAccessScope { method: Method, path: String },

    #[error("Route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("Route `{path}` conflicts with `{existing}`")]
    ConflictingRoute { path: String, existing: String },
}

/// Catalog entry for one registered route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
    pub scopes: Vec<AccessScope>,
    pub facets: Vec<Facet>,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<RouteDocs>,
}

/// Builds an axum [`Router`] from [`RouteDef`]s.
pub struct Registrar {
    router: Router,
    resolver: ScopeResolver,
    credentials: CredentialSource,
    body_limit: usize,
    routes: Vec<RouteInfo>,
    registered: HashSet<(Method, String)>,
    shapes: HashMap<String, String>,
}

impl Registrar {
    pub fn new(resolver: ScopeResolver) -> Self {
        Self {
            router: Router::new(),
            resolver,
            credentials: CredentialSource::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            routes: Vec::new(),
            registered: HashSet::new(),
            shapes: HashMap::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialSource) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn get<S: SchemaShape>(
        &mut self,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::GET, path, def)
    }

    pub fn post<S: SchemaShape>(
        &mut self,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::POST, path, def)
    }

    pub fn put<S: SchemaShape>(
        &mut self,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::PUT, path, def)
    }

    pub fn patch<S: SchemaShape>(
        &mut self,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::PATCH, path, def)
    }

    pub fn delete<S: SchemaShape>(
        &mut self,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<&mut Self, RegistrationError> {
        self.route(Method::DELETE, path, def)
    }

    /// Registers `def` for `method` on `path`.
    ///
    /// On error nothing is registered and the registrar stays usable.
    pub fn route<S: SchemaShape>(
        &mut self,
        method: Method,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<&mut Self, RegistrationError> {
        match self.try_route(method.clone(), path, def) {
            Ok(()) => Ok(self),
            Err(e) => {
                tracing::error!(%method, path, error = %e, "Route registration failed");
                Err(e)
            }
        }
    }

    fn try_route<S: SchemaShape>(
        &mut self,
        method: Method,
        path: &str,
        def: RouteDef<S>,
    ) -> Result<(), RegistrationError> {
        let path = normalize_path(path)?;
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RegistrationError::UnsupportedMethod(method.clone()))?;

        let RouteDef {
            access_scope,
            before,
            after,
            docs,
            handler,
            ..
        } = def;

        let scopes = match access_scope {
            Some(scopes) => {
                ScopeSet::new(scopes).ok_or_else(|| RegistrationError::EmptyAccessScope {
                    method: method.clone(),
                    path: path.clone(),
                })?
            }
            None => ScopeSet::default(),
        };

        let key = (method.clone(), path.clone());
        if self.registered.contains(&key) {
            return Err(RegistrationError::DuplicateRoute { method, path });
        }
        let shape = path_shape(&path);
        if let Some(existing) = self.shapes.get(&shape) {
            if existing != &path {
                return Err(RegistrationError::ConflictingRoute {
                    path,
                    existing: existing.clone(),
                });
            }
        }

        let descriptor = S::descriptor();
        let access = authorize(scopes.clone(), self.resolver.clone(), self.credentials.clone());

        let mut steps: Vec<Arc<dyn ProcessingStep>> = vec![Arc::new(access)];
        steps.extend(before);
        steps.extend(
            pipeline::build(&descriptor).into_iter().map(|step| {
                Arc::new(step.with_body_limit(self.body_limit)) as Arc<dyn ProcessingStep>
            }),
        );
        steps.extend(after);
        let pipeline = Pipeline::new(steps);

        let info = RouteInfo {
            method: method.to_string(),
            path: path.clone(),
            scopes: scopes.scopes().to_vec(),
            facets: descriptor.facets(),
            steps: pipeline.step_names(),
            docs,
        };

        let method_router = on(filter, move |ctx: RequestContext<S>| {
            let handler = handler.clone();
            async move { handler(ctx).await }
        })
        .route_layer(from_fn_with_state(Arc::new(pipeline), pipeline_middleware));

        self.router = std::mem::take(&mut self.router).route(&path, method_router);
        self.registered.insert(key);
        self.shapes.insert(shape, path.clone());

        metrics::counter!(ROUTES_REGISTERED, "method" => method.to_string()).increment(1);
        tracing::info!(
            %method,
            path = %path,
            scopes = ?info.scopes,
            steps = ?info.steps,
            "Route registered"
        );
        self.routes.push(info);

        Ok(())
    }

    /// Every route registered so far, in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Validates `path` and rewrites `:name` / `*name` segments to axum's
/// `{name}` / `{*name}` syntax.
fn normalize_path(path: &str) -> Result<String, RegistrationError> {
    let invalid = |reason| RegistrationError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with `/`"));
    }

    let segments: Vec<&str> = path[1..].split('/').collect();
    let last = segments.len() - 1;
    let mut names = HashSet::new();
    let mut normalized = String::with_capacity(path.len());

    for (i, segment) in segments.iter().enumerate() {
        normalized.push('/');

        let (name, wildcard) = if let Some(name) = segment.strip_prefix(':') {
            (name, false)
        } else if let Some(name) = segment.strip_prefix('*') {
            (name, true)
        } else if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            match inner.strip_prefix('*') {
                Some(name) => (name, true),
                None => (inner, false),
            }
        } else {
            if segment.contains(|c| c == '{' || c == '}') {
                return Err(invalid("braces are only allowed around a whole segment"));
            }
            normalized.push_str(segment);
            continue;
        };

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("parameter names must be non-empty and alphanumeric"));
        }
        if !names.insert(name) {
            return Err(invalid("parameter names must be unique"));
        }
        if wildcard && i != last {
            return Err(invalid("a wildcard must be the last segment"));
        }

        normalized.push('{');
        if wildcard {
            normalized.push('*');
        }
        normalized.push_str(name);
        normalized.push('}');
    }

    Ok(normalized)
}

/// `path` with parameter names erased, used to detect routes that would
/// shadow each other.
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
