//! Species identification boundary.
//!
//! `Identifier` is the substitution point for a real visual classifier. The
//! default implementation ignores the photo and samples the catalog uniformly,
//! matching the behavior the mobile app was built against.

use std::sync::Arc;

use crate::catalog::RarityCatalog;
use crate::errors::AppError;
use crate::models::{Geolocation, Species};

/// One observation submitted for identification.
pub struct Observation<'a> {
    pub payload: &'a [u8],
    pub taken_at: &'a str,
    pub location: Option<&'a Geolocation>,
}

/// Resolves an observation to a species.
pub trait Identifier: Send + Sync {
    fn identify(&self, observation: &Observation<'_>) -> Result<Species, AppError>;
}

/// Stub identifier: uniform random pick from the catalog.
pub struct RandomIdentifier {
    catalog: Arc<RarityCatalog>,
}

impl RandomIdentifier {
    pub fn new(catalog: Arc<RarityCatalog>) -> Self {
        Self { catalog }
    }
}

impl Identifier for RandomIdentifier {
    fn identify(&self, observation: &Observation<'_>) -> Result<Species, AppError> {
        tracing::trace!(
            payload_bytes = observation.payload.len(),
            taken_at = observation.taken_at,
            has_location = observation.location.is_some(),
            "identifying observation via uniform catalog draw"
        );
        self.catalog.sample_uniform()
    }
}
