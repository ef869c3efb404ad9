//! Normalized catalog provider interfaces. The HTTP contracts behind the
//! gateways are not modeled here — both clients consume an already
//! normalized shape and clamp their inputs to the documented bounds.

pub mod error;
pub mod events;
pub mod places;

pub use error::{ProviderError, Result};
pub use events::HttpEventsProvider;
pub use places::HttpPlacesProvider;

use async_trait::async_trait;

use citypulse_common::{EventsQuery, PlacesQuery, SearchResult};

/// The places catalog. Stateless across calls; safe to invoke concurrently.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn search_places(&self, query: &PlacesQuery) -> Result<Vec<SearchResult>>;

    fn name(&self) -> &'static str {
        "places"
    }
}

/// The ticketing catalog. Stateless across calls; safe to invoke
/// concurrently.
#[async_trait]
pub trait EventsProvider: Send + Sync {
    async fn search_events(&self, query: &EventsQuery) -> Result<Vec<SearchResult>>;

    fn name(&self) -> &'static str {
        "events"
    }
}
