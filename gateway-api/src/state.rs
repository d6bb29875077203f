use std::sync::Arc;

use gateway_core::Manager;

use crate::metrics::Metrics;

/// Shared state handed to every axum handler: the Manager (the gateway's
/// entire public method surface) and the request/worker metrics registry.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(manager: Arc<Manager>, metrics: Arc<Metrics>) -> Self {
        AppState { manager, metrics }
    }
}
