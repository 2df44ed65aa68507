//! Shared application state. Cloning is cheap; every clone sees the same
//! graph and telemetry service.

use std::sync::Arc;

use parking_lot::RwLock;

use occam_graph::GraphMapper;
use occam_telemetry::TelemetryService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub graph: Arc<RwLock<GraphMapper>>,
    pub telemetry: TelemetryService,
}

impl AppState {
    /// State with an empty graph.
    pub fn new(telemetry: TelemetryService) -> Self {
        Self::with_graph(GraphMapper::new(), telemetry)
    }

    pub fn with_graph(graph: GraphMapper, telemetry: TelemetryService) -> Self {
        Self {
            graph: Arc::new(RwLock::new(graph)),
            telemetry,
        }
    }
}
