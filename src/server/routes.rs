//! Demo routes exercising every part of the router.

use std::sync::{Arc, OnceLock};

use axum::{response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::{
    access::AccessScope,
    context::RequestContext,
    registrar::{RegistrationError, Registrar, RouteDef, RouteDocs, RouteInfo},
    schema::{Absent, NoSchema, Present, RouteSchema},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NameParam {
    #[validate(length(min = 3))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HelloBody {
    #[validate(length(min = 1, max = 64, message = "greeting must be 1 to 64 characters"))]
    pub greeting: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HiQuery {
    #[validate(length(min = 1, max = 32))]
    pub greeting: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HiHeaders {
    #[serde(rename = "accept-language")]
    pub accept_language: Option<String>,
}

pub type HelloSchema = RouteSchema<Absent, Present<NameParam>, Absent, Absent, Present<HelloBody>>;
pub type HiSchema = RouteSchema<Present<HiHeaders>, Present<NameParam>, Present<HiQuery>>;

/// Every scope that implies presented credentials.
const AUTHENTICATED: [AccessScope; 5] = [
    AccessScope::User,
    AccessScope::UserAdmin,
    AccessScope::AdminModerator,
    AccessScope::AdminMaintainer,
    AccessScope::ApiKey,
];

/// Registers the demo routes on `registrar`.
pub fn register(registrar: &mut Registrar) -> Result<(), RegistrationError> {
    let catalog: Arc<OnceLock<Vec<RouteInfo>>> = Arc::new(OnceLock::new());
    let catalog_view = catalog.clone();

    registrar
        .get(
            "/",
            RouteDef::new(NoSchema::new(), root)
                .access_scope([AccessScope::Public])
                .docs(RouteDocs::new("Plain-text greeting")),
        )?
        .post(
            "/hello/:name",
            RouteDef::new(HelloSchema::default(), hello).docs(
                RouteDocs::new("Greet by name")
                    .description("Validates the path name and the JSON greeting")
                    .tag("demo"),
            ),
        )?
        .get(
            "/hi/:name",
            RouteDef::new(HiSchema::default(), hi)
                .access_scope([AccessScope::Public])
                .docs(RouteDocs::new("Greet with optional query and header").tag("demo")),
        )?
        .get(
            "/me",
            RouteDef::new(NoSchema::new(), me)
                .access_scope(AUTHENTICATED)
                .docs(RouteDocs::new("Echo the caller's identity")),
        )?
        .get(
            "/routes",
            RouteDef::new(NoSchema::new(), move |_ctx| {
                let catalog = catalog_view.clone();
                async move { Json(catalog.get().cloned().unwrap_or_default()) }
            })
            .access_scope([AccessScope::Public])
            .docs(RouteDocs::new("Route catalog")),
        )?;

    let _ = catalog.set(registrar.routes().to_vec());
    Ok(())
}

async fn root(_ctx: RequestContext) -> &'static str {
    "Hello from typed-router!"
}

async fn hello(ctx: RequestContext<HelloSchema>) -> impl IntoResponse {
    Json(json!({
        "param": ctx.param(),
        "body": ctx.body(),
        "caller": ctx.identity().map(|identity| identity.email.as_str()),
    }))
}

async fn hi(ctx: RequestContext<HiSchema>) -> impl IntoResponse {
    let greeting = ctx.query().greeting.as_deref().unwrap_or("Hi");

    Json(json!({
        "message": format!("{greeting}, {}!", ctx.param().name),
        "language": ctx.header().accept_language,
    }))
}

async fn me(ctx: RequestContext) -> impl IntoResponse {
    Json(json!({
        "scope": ctx.scope(),
        "identity": ctx.identity(),
    }))
}
