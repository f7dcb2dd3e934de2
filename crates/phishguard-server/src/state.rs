//! Shared application state, constructed once at process init and passed
//! through Axum's `State` extractor — no mutable process globals.

use std::sync::Arc;

use phishguard_core::trust::TrustGate;
use phishguard_governance::controller::GovernanceController;
use phishguard_pipeline::executor::Pipeline;
use phishguard_telemetry::aggregator::TelemetryAggregator;

use crate::config::ServerConfig;

/// Everything an HTTP handler needs. Cheap to clone: every field is
/// already an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The decision pipeline.
    pub pipeline: Arc<Pipeline>,
    /// The governance controller, for status/unfreeze endpoints.
    pub governance: Arc<GovernanceController>,
    /// The trusted-domain gate, for the sample-listing endpoint.
    pub trust_gate: Arc<TrustGate>,
    /// Telemetry aggregator, for `/metrics`.
    pub telemetry: Arc<TelemetryAggregator>,
    /// Runtime configuration (admin key, reclassification flag, etc).
    pub config: Arc<ServerConfig>,
}
