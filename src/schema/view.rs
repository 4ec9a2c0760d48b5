//! Per-request store of decoded facet values.

use std::{any::Any, collections::HashMap, sync::Arc};

use crate::error::AppError;

use super::{DecodedValue, Facet};

/// Facet → decoded value, filled in by validation steps as they succeed.
///
/// Lives in the request extensions. A facet has an entry only if its
/// validation step ran and passed.
#[derive(Clone, Default)]
pub struct ValidView {
    values: HashMap<Facet, DecodedValue>,
}

impl ValidView {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, facet: Facet, value: DecodedValue) {
        self.values.insert(facet, value);
    }

    pub fn contains(&self, facet: Facet) -> bool {
        self.values.contains_key(&facet)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validated facets in canonical order.
    pub fn facets(&self) -> Vec<Facet> {
        Facet::CANONICAL_ORDER
            .into_iter()
            .filter(|f| self.contains(*f))
            .collect()
    }

    /// Borrows the decoded value for `facet` as `T`.
    ///
    /// Fails with [`AppError::FacetTypeMismatch`] when the facet was never
    /// validated or was decoded into a different type.
    pub fn get<T: Any + Send + Sync>(&self, facet: Facet) -> Result<&T, AppError> {
        self.values
            .get(&facet)
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or_else(|| mismatch::<T>(facet))
    }

    /// Shared handle to the decoded value for `facet`.
    pub fn get_arc<T: Any + Send + Sync>(&self, facet: Facet) -> Result<Arc<T>, AppError> {
        let value = self
            .values
            .get(&facet)
            .cloned()
            .ok_or_else(|| mismatch::<T>(facet))?;
        value.downcast::<T>().map_err(|_| mismatch::<T>(facet))
    }
}

fn mismatch<T>(facet: Facet) -> AppError {
    AppError::FacetTypeMismatch {
        facet,
        expected: std::any::type_name::<T>(),
    }
}

impl std::fmt::Debug for ValidView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidView")
            .field("facets", &self.facets())
            .finish()
    }
}
