//! Schema-validated, scope-guarded route registration for axum.
//!
//! Declare a route's request facets with [`RouteSchema`], the scopes it admits
//! and a handler taking a typed [`RequestContext`]; the [`Registrar`] composes
//! access control and per-facet validation in front of the handler.

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod pipeline;
pub mod registrar;
pub mod schema;
pub mod server;
pub mod telemetry;

pub use access::{AccessScope, Identity, ResolvedScope, ScopeResolver, TokenDecoder};
pub use context::RequestContext;
pub use error::{AppError, Result};
pub use pipeline::{Flow, ProcessingStep};
pub use registrar::{RegistrationError, Registrar, RouteDef, RouteDocs, StepOrder};
pub use schema::{Facet, NoSchema, RouteSchema, SchemaDescriptor};
