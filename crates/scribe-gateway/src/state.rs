use std::sync::Arc;

use scribe_core::config::GatewayConfig;
use scribe_workflows::WorkflowService;

/// Shared state for all gateway handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub service: Arc<WorkflowService>,
}
