//! Request schemas: facets, facet schemas and the per-route descriptor.
//!
//! A [`SchemaDescriptor`] names which facets of a request are validated and
//! with which [`FacetSchema`]. The typed front-end in [`typed`] derives both the
//! descriptor and the handler's typed accessors from one declaration.

pub mod typed;
pub mod view;

use std::{any::Any, collections::HashMap, fmt, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::{request::Parts, HeaderMap, Request},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

use crate::error::AppError;

pub use typed::{Absent, NoSchema, Present, RouteSchema, SchemaShape, Slot};
pub use view::ValidView;

/// One named part of an HTTP request subject to independent validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Header,
    Param,
    Query,
    Cookie,
    Body,
    Form,
}

impl Facet {
    /// Order in which validation steps run, regardless of declaration order.
    pub const CANONICAL_ORDER: [Facet; 6] = [
        Facet::Header,
        Facet::Param,
        Facet::Query,
        Facet::Cookie,
        Facet::Body,
        Facet::Form,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Header => "header",
            Facet::Param => "param",
            Facet::Query => "query",
            Facet::Cookie => "cookie",
            Facet::Body => "body",
            Facet::Form => "form",
        }
    }

    /// Whether extracting this facet consumes the request body.
    pub fn reads_body(&self) -> bool {
        matches!(self, Facet::Body | Facet::Form)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded facet value, type-erased for storage in the request view.
pub type DecodedValue = Arc<dyn Any + Send + Sync>;

/// The raw material a facet schema decodes from.
///
/// `body` holds the buffered request body for body-reading facets and is
/// `None` for all others.
pub struct RawRequest<'a> {
    pub parts: &'a mut Parts,
    pub body: Option<Bytes>,
}

/// An opaque validation schema for one facet.
///
/// Implementations extract the facet from the raw request, decode it and run
/// their constraints. The core never looks inside a schema.
#[async_trait]
pub trait FacetSchema: Send + Sync {
    async fn decode(&self, facet: Facet, raw: RawRequest<'_>) -> Result<DecodedValue, AppError>;

    /// Name of the decoded type, used in diagnostics.
    fn type_name(&self) -> &'static str;
}

/// Facet schema backed by a serde type carrying `validator` constraints.
pub struct TypedSchema<T>(PhantomData<fn() -> T>);

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypedSchema<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    async fn extract(facet: Facet, raw: RawRequest<'_>) -> Result<T, AppError> {
        let malformed = |message: String| AppError::MalformedFacet { facet, message };

        match facet {
            Facet::Header => from_string_map(facet, header_map(&raw.parts.headers)),
            Facet::Cookie => {
                let jar = CookieJar::from_headers(&raw.parts.headers);
                let cookies = jar
                    .iter()
                    .map(|c| (c.name().to_string(), c.value().to_string()))
                    .collect();
                from_string_map(facet, cookies)
            }
            Facet::Param => Path::<T>::from_request_parts(raw.parts, &())
                .await
                .map(|Path(value)| value)
                .map_err(|rejection| malformed(rejection.body_text())),
            Facet::Query => Query::<T>::try_from_uri(&raw.parts.uri)
                .map(|Query(value)| value)
                .map_err(|rejection| malformed(rejection.body_text())),
            Facet::Body => {
                let request = shadow_request(raw.parts, raw.body.unwrap_or_default());
                Json::<T>::from_request(request, &())
                    .await
                    .map(|Json(value)| value)
                    .map_err(|rejection| malformed(rejection.body_text()))
            }
            Facet::Form => {
                let request = shadow_request(raw.parts, raw.body.unwrap_or_default());
                Form::<T>::from_request(request, &())
                    .await
                    .map(|Form(value)| value)
                    .map_err(|rejection| malformed(rejection.body_text()))
            }
        }
    }
}

#[async_trait]
impl<T> FacetSchema for TypedSchema<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    async fn decode(&self, facet: Facet, raw: RawRequest<'_>) -> Result<DecodedValue, AppError> {
        let value = Self::extract(facet, raw).await?;
        value
            .validate()
            .map_err(|errors| AppError::from_violations(facet, &errors))?;
        Ok(Arc::new(value))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Rebuilds a request carrying the buffered body so axum's body extractors
/// (and their content-type checks) can run against it.
fn shadow_request(parts: &Parts, body: Bytes) -> Request<Body> {
    let mut request = Request::new(Body::from(body));
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.headers_mut() = parts.headers.clone();
    request
}

/// Lowercased header names to their first UTF-8 value.
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            map.entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    map
}

fn from_string_map<T: DeserializeOwned>(
    facet: Facet,
    map: HashMap<String, String>,
) -> Result<T, AppError> {
    let object = map
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect::<serde_json::Map<_, _>>();

    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
        AppError::MalformedFacet {
            facet,
            message: e.to_string(),
        }
    })
}

/// Declarative mapping from facet to schema.
///
/// Declaring the same facet twice replaces the earlier schema. Iteration
/// order is always [`Facet::CANONICAL_ORDER`].
#[derive(Clone, Default)]
pub struct SchemaDescriptor {
    slots: HashMap<Facet, Arc<dyn FacetSchema>>,
}

impl SchemaDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `facet` with an arbitrary schema object.
    pub fn with(mut self, facet: Facet, schema: Arc<dyn FacetSchema>) -> Self {
        self.slots.insert(facet, schema);
        self
    }

    /// Declares `facet` with a serde + `validator` type.
    pub fn typed<T>(self, facet: Facet) -> Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        self.with(facet, Arc::new(TypedSchema::<T>::new()))
    }

    pub fn get(&self, facet: Facet) -> Option<&Arc<dyn FacetSchema>> {
        self.slots.get(&facet)
    }

    pub fn contains(&self, facet: Facet) -> bool {
        self.slots.contains_key(&facet)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Present facets in canonical order.
    pub fn facets(&self) -> Vec<Facet> {
        Facet::CANONICAL_ORDER
            .into_iter()
            .filter(|f| self.contains(*f))
            .collect()
    }
}

impl fmt::Debug for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for facet in self.facets() {
            if let Some(schema) = self.get(facet) {
                map.entry(&facet, &schema.type_name());
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_TYPE, COOKIE};
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize, Validate, PartialEq)]
    struct Paging {
        #[validate(range(min = 1, max = 100))]
        limit: u32,
    }

    #[derive(Debug, Clone, Deserialize, Validate, PartialEq)]
    struct Greeting {
        #[validate(length(min = 1, message = "Greeting text is required"))]
        text: String,
    }

    #[derive(Debug, Clone, Deserialize, Validate, PartialEq)]
    struct Session {
        session: String,
    }

    #[derive(Debug, Clone, Deserialize, Validate, PartialEq)]
    struct Tracing {
        #[serde(rename = "x-request-id")]
        #[validate(length(min = 8))]
        request_id: String,
    }

    fn parts_for(request: Request<Body>) -> Parts {
        request.into_parts().0
    }

    async fn decode<T>(facet: Facet, mut parts: Parts, body: Option<Bytes>) -> Result<T, AppError>
    where
        T: DeserializeOwned + Validate + Clone + Send + Sync + 'static,
    {
        let value = TypedSchema::<T>::new()
            .decode(facet, RawRequest { parts: &mut parts, body })
            .await?;
        Ok(value.downcast_ref::<T>().unwrap().clone())
    }

    #[test]
    fn test_canonical_order() {
        assert_eq!(
            Facet::CANONICAL_ORDER.map(|f| f.as_str()),
            ["header", "param", "query", "cookie", "body", "form"]
        );
    }

    #[test]
    fn test_reads_body() {
        assert!(Facet::Body.reads_body());
        assert!(Facet::Form.reads_body());
        assert!(!Facet::Query.reads_body());
    }

    #[test]
    fn test_descriptor_facets_follow_canonical_order() {
        let descriptor = SchemaDescriptor::new()
            .typed::<Greeting>(Facet::Form)
            .typed::<Paging>(Facet::Query)
            .typed::<Tracing>(Facet::Header);

        assert_eq!(
            descriptor.facets(),
            vec![Facet::Header, Facet::Query, Facet::Form]
        );
        assert_eq!(descriptor.len(), 3);
    }

    #[test]
    fn test_descriptor_redeclaration_replaces() {
        let descriptor = SchemaDescriptor::new()
            .typed::<Greeting>(Facet::Body)
            .typed::<Paging>(Facet::Body);

        assert_eq!(descriptor.len(), 1);
        assert!(descriptor
            .get(Facet::Body)
            .unwrap()
            .type_name()
            .ends_with("Paging"));
    }

    #[tokio::test]
    async fn test_query_decodes_and_coerces() {
        let parts = parts_for(Request::get("/items?limit=20").body(Body::empty()).unwrap());
        let paging: Paging = decode(Facet::Query, parts, None).await.unwrap();
        assert_eq!(paging, Paging { limit: 20 });
    }

    #[tokio::test]
    async fn test_query_constraint_violation() {
        let parts = parts_for(Request::get("/items?limit=500").body(Body::empty()).unwrap());
        let err = decode::<Paging>(Facet::Query, parts, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { facet: Facet::Query, .. }));
    }

    #[tokio::test]
    async fn test_query_missing_field_is_malformed() {
        let parts = parts_for(Request::get("/items").body(Body::empty()).unwrap());
        let err = decode::<Paging>(Facet::Query, parts, None).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedFacet { facet: Facet::Query, .. }));
    }

    #[tokio::test]
    async fn test_body_requires_json() {
        let parts = parts_for(Request::post("/").body(Body::empty()).unwrap());
        let err = decode::<Greeting>(Facet::Body, parts, Some(Bytes::from(r#"{"text":"hi"}"#)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedFacet { facet: Facet::Body, .. }));
    }

    #[tokio::test]
    async fn test_body_custom_message() {
        let parts = parts_for(
            Request::post("/")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        );
        let err = decode::<Greeting>(Facet::Body, parts, Some(Bytes::from(r#"{"text":""}"#)))
            .await
            .unwrap_err();

        match err {
            AppError::Validation { message, .. } => {
                assert_eq!(message, "text: Greeting text is required")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_form_decodes() {
        let parts = parts_for(
            Request::post("/")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::empty())
                .unwrap(),
        );
        let greeting: Greeting = decode(Facet::Form, parts, Some(Bytes::from("text=hello")))
            .await
            .unwrap();
        assert_eq!(greeting.text, "hello");
    }

    #[tokio::test]
    async fn test_cookie_decodes() {
        let parts = parts_for(
            Request::get("/")
                .header(COOKIE, "session=abc123; theme=dark")
                .body(Body::empty())
                .unwrap(),
        );
        let session: Session = decode(Facet::Cookie, parts, None).await.unwrap();
        assert_eq!(session.session, "abc123");
    }

    #[tokio::test]
    async fn test_header_names_are_lowercased() {
        let parts = parts_for(
            Request::get("/")
                .header("X-Request-Id", "req-12345678")
                .body(Body::empty())
                .unwrap(),
        );
        let tracing: Tracing = decode(Facet::Header, parts, None).await.unwrap();
        assert_eq!(tracing.request_id, "req-12345678");
    }
}
