//! The handler's view of a request that passed its pipeline.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Method, Uri},
};
use serde::de::DeserializeOwned;
use std::any::Any;
use validator::Validate;

use crate::{
    access::{AccessScope, Identity},
    error::AppError,
    schema::{Facet, NoSchema, Present, RouteSchema, SchemaShape, Slot, ValidView},
};

/// Typed request context handed to route handlers.
///
/// For a route declared with `RouteSchema::new().param::<P>().body::<B>()` the
/// context has `param() -> &P` and `body() -> &B` and no other facet
/// accessors.
pub struct RequestContext<S = NoSchema>
where
    S: SchemaShape,
{
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    identity: Option<Identity>,
    scope: Option<AccessScope>,
    view: ValidView,
    header: <S::Header as Slot>::Value,
    param: <S::Param as Slot>::Value,
    query: <S::Query as Slot>::Value,
    cookie: <S::Cookie as Slot>::Value,
    body: <S::Body as Slot>::Value,
    form: <S::Form as Slot>::Value,
}

impl<S, St> FromRequestParts<St> for RequestContext<S>
where
    S: SchemaShape,
    St: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let view = parts
            .extensions
            .get::<ValidView>()
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            header: <S::Header as Slot>::project(&view, Facet::Header)?,
            param: <S::Param as Slot>::project(&view, Facet::Param)?,
            query: <S::Query as Slot>::project(&view, Facet::Query)?,
            cookie: <S::Cookie as Slot>::project(&view, Facet::Cookie)?,
            body: <S::Body as Slot>::project(&view, Facet::Body)?,
            form: <S::Form as Slot>::project(&view, Facet::Form)?,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            identity: parts.extensions.get::<Identity>().cloned(),
            scope: parts.extensions.get::<AccessScope>().copied(),
            view,
        })
    }
}

impl<S: SchemaShape> RequestContext<S> {
    /// Identity attached by access control, when the caller presented a
    /// token whose scope the route admits.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Scope the caller was admitted under.
    pub fn scope(&self) -> Option<AccessScope> {
        self.scope
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn view(&self) -> &ValidView {
        &self.view
    }

    /// Runtime-checked access to a validated facet.
    pub fn valid<T: Any + Send + Sync>(&self, facet: Facet) -> Result<&T, AppError> {
        self.view.get::<T>(facet)
    }
}

impl<T, P, Q, C, B, F> RequestContext<RouteSchema<Present<T>, P, Q, C, B, F>>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
    P: Slot,
    Q: Slot,
    C: Slot,
    B: Slot,
    F: Slot,
{
    pub fn header(&self) -> &T {
        &self.header
    }
}

impl<H, T, Q, C, B, F> RequestContext<RouteSchema<H, Present<T>, Q, C, B, F>>
where
    H: Slot,
    T: DeserializeOwned + Validate + Send + Sync + 'static,
    Q: Slot,
    C: Slot,
    B: Slot,
    F: Slot,
{
    pub fn param(&self) -> &T {
        &self.param
    }
}

impl<H, P, T, C, B, F> RequestContext<RouteSchema<H, P, Present<T>, C, B, F>>
where
    H: Slot,
    P: Slot,
    T: DeserializeOwned + Validate + Send + Sync + 'static,
    C: Slot,
    B: Slot,
    F: Slot,
{
    pub fn query(&self) -> &T {
        &self.query
    }
}

impl<H, P, Q, T, B, F> RequestContext<RouteSchema<H, P, Q, Present<T>, B, F>>
where
    H: Slot,
    P: Slot,
    Q: Slot,
    T: DeserializeOwned + Validate + Send + Sync + 'static,
    B: Slot,
    F: Slot,
{
    pub fn cookie(&self) -> &T {
        &self.cookie
    }
}

impl<H, P, Q, C, T, F> RequestContext<RouteSchema<H, P, Q, C, Present<T>, F>>
where
    H: Slot,
    P: Slot,
    Q: Slot,
    C: Slot,
    T: DeserializeOwned + Validate + Send + Sync + 'static,
    F: Slot,
{
    pub fn body(&self) -> &T {
        &self.body
    }
}

impl<H, P, Q, C, B, T> RequestContext<RouteSchema<H, P, Q, C, B, Present<T>>>
where
    H: Slot,
    P: Slot,
    Q: Slot,
    C: Slot,
    B: Slot,
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    pub fn form(&self) -> &T {
        &self.form
    }
}
