//! Compile-time schema declaration.
//!
//! `RouteSchema` is a type-state builder: each of its six slots is either
//! [`Absent`] or [`Present<T>`]. A slot's builder method only exists while the
//! slot is absent, so a facet cannot be declared twice, and
//! [`RequestContext`](crate::context::RequestContext) only grows an accessor for
//! slots that are present.
//!
//! ```ignore
//! let schema = RouteSchema::new().param::<NameParam>().body::<Greeting>();
//! // handler: |ctx: RequestContext<_>| async move { ctx.param().name.clone() }
//! ```

use std::{fmt, marker::PhantomData, sync::Arc};

use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

use super::{Facet, FacetSchema, SchemaDescriptor, TypedSchema, ValidView};

/// Slot marker: the facet is not part of the schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

/// Slot marker: the facet is validated into `T`.
pub struct Present<T>(PhantomData<fn() -> T>);

/// One facet slot of a [`RouteSchema`].
pub trait Slot: Send + Sync + 'static {
    /// What the request context holds for this slot.
    type Value: Clone + Send + Sync + 'static;

    fn schema() -> Option<Arc<dyn FacetSchema>>;

    /// Pulls this slot's value out of the validated view.
    fn project(view: &ValidView, facet: Facet) -> Result<Self::Value, AppError>;
}

impl Slot for Absent {
    type Value = ();

    fn schema() -> Option<Arc<dyn FacetSchema>> {
        None
    }

    fn project(_view: &ValidView, _facet: Facet) -> Result<(), AppError> {
        Ok(())
    }
}

impl<T> Slot for Present<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    type Value = Arc<T>;

    fn schema() -> Option<Arc<dyn FacetSchema>> {
        Some(Arc::new(TypedSchema::<T>::new()))
    }

    fn project(view: &ValidView, facet: Facet) -> Result<Arc<T>, AppError> {
        view.get_arc::<T>(facet)
    }
}

/// Schema types usable on a route.
pub trait SchemaShape: Send + Sync + 'static {
    type Header: Slot;
    type Param: Slot;
    type Query: Slot;
    type Cookie: Slot;
    type Body: Slot;
    type Form: Slot;

    fn descriptor() -> SchemaDescriptor {
        let slots = [
            (Facet::Header, <Self::Header as Slot>::schema()),
            (Facet::Param, <Self::Param as Slot>::schema()),
            (Facet::Query, <Self::Query as Slot>::schema()),
            (Facet::Cookie, <Self::Cookie as Slot>::schema()),
            (Facet::Body, <Self::Body as Slot>::schema()),
            (Facet::Form, <Self::Form as Slot>::schema()),
        ];

        slots
            .into_iter()
            .fold(SchemaDescriptor::new(), |descriptor, (facet, schema)| {
                match schema {
                    Some(schema) => descriptor.with(facet, schema),
                    None => descriptor,
                }
            })
    }
}

/// Typed schema declaration for one route.
pub struct RouteSchema<H = Absent, P = Absent, Q = Absent, C = Absent, B = Absent, F = Absent> {
    _slots: PhantomData<fn() -> (H, P, Q, C, B, F)>,
}

/// A route that validates nothing.
pub type NoSchema = RouteSchema;

impl RouteSchema {
    pub fn new() -> Self {
        Self {
            _slots: PhantomData,
        }
    }
}

impl<H, P, Q, C, B, F> RouteSchema<H, P, Q, C, B, F> {
    fn retype<H2, P2, Q2, C2, B2, F2>(self) -> RouteSchema<H2, P2, Q2, C2, B2, F2> {
        RouteSchema::default()
    }
}

impl<P, Q, C, B, F> RouteSchema<Absent, P, Q, C, B, F> {
    pub fn header<T>(self) -> RouteSchema<Present<T>, P, Q, C, B, F> {
        self.retype()
    }
}

impl<H, Q, C, B, F> RouteSchema<H, Absent, Q, C, B, F> {
    pub fn param<T>(self) -> RouteSchema<H, Present<T>, Q, C, B, F> {
        self.retype()
    }
}

impl<H, P, C, B, F> RouteSchema<H, P, Absent, C, B, F> {
    pub fn query<T>(self) -> RouteSchema<H, P, Present<T>, C, B, F> {
        self.retype()
    }
}

impl<H, P, Q, B, F> RouteSchema<H, P, Q, Absent, B, F> {
    pub fn cookie<T>(self) -> RouteSchema<H, P, Q, Present<T>, B, F> {
        self.retype()
    }
}

impl<H, P, Q, C, F> RouteSchema<H, P, Q, C, Absent, F> {
    pub fn body<T>(self) -> RouteSchema<H, P, Q, C, Present<T>, F> {
        self.retype()
    }
}

impl<H, P, Q, C, B> RouteSchema<H, P, Q, C, B, Absent> {
    pub fn form<T>(self) -> RouteSchema<H, P, Q, C, B, Present<T>> {
        self.retype()
    }
}

impl<H, P, Q, C, B, F> SchemaShape for RouteSchema<H, P, Q, C, B, F>
where
    H: Slot,
    P: Slot,
    Q: Slot,
    C: Slot,
    B: Slot,
    F: Slot,
{
    type Header = H;
    type Param = P;
    type Query = Q;
    type Cookie = C;
    type Body = B;
    type Form = F;
}

impl<H, P, Q, C, B, F> Default for RouteSchema<H, P, Q, C, B, F> {
    fn default() -> Self {
        Self {
            _slots: PhantomData,
        }
    }
}

impl<H, P, Q, C, B, F> Clone for RouteSchema<H, P, Q, C, B, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H, P, Q, C, B, F> Copy for RouteSchema<H, P, Q, C, B, F> {}

impl<H, P, Q, C, B, F> fmt::Debug for RouteSchema<H, P, Q, C, B, F>
where
    H: Slot,
    P: Slot,
    Q: Slot,
    C: Slot,
    B: Slot,
    F: Slot,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RouteSchema")
            .field(&<Self as SchemaShape>::descriptor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct NameParam {
        #[validate(length(min = 3))]
        name: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Paging {
        #[allow(dead_code)]
        page: Option<u32>,
    }

    fn descriptor_of<S: SchemaShape>(_schema: S) -> SchemaDescriptor {
        S::descriptor()
    }

    #[test]
    fn test_no_schema_is_empty() {
        assert!(NoSchema::descriptor().is_empty());
    }

    #[test]
    fn test_declaration_order_is_irrelevant() {
        let a = descriptor_of(RouteSchema::new().query::<Paging>().param::<NameParam>());
        let b = descriptor_of(RouteSchema::new().param::<NameParam>().query::<Paging>());

        assert_eq!(a.facets(), vec![Facet::Param, Facet::Query]);
        assert_eq!(a.facets(), b.facets());
    }

    #[test]
    fn test_present_slot_projects_value() {
        let mut view = ValidView::new();
        view.insert(
            Facet::Param,
            Arc::new(NameParam {
                name: "abc".to_string(),
            }),
        );

        let value = <Present<NameParam> as Slot>::project(&view, Facet::Param).unwrap();
        assert_eq!(value.name, "abc");
    }

    #[test]
    fn test_present_slot_without_value_fails() {
        let view = ValidView::new();
        assert!(<Present<NameParam> as Slot>::project(&view, Facet::Param).is_err());
        assert!(<Absent as Slot>::project(&view, Facet::Param).is_ok());
    }
}
