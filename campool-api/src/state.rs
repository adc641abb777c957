use std::sync::Arc;

use campool_core::repository::RideshareStore;
use campool_match::MatchingEngine;
use campool_ride::RideService;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RideshareStore>,
    pub rides: Arc<RideService>,
    pub matching: Arc<MatchingEngine>,
}
