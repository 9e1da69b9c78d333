//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

use medcall_config::{PromptCatalog, Settings};
use medcall_telephony::CallGateway;

use crate::orchestrator::ReminderOrchestrator;
use crate::registry::CallRegistry;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub settings: Arc<Settings>,
    /// Keyed store of active reminder calls
    pub registry: Arc<CallRegistry>,
    /// Call-flow orchestration
    pub orchestrator: Arc<ReminderOrchestrator>,
    /// Prometheus render handle, when the recorder installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        gateway: Arc<dyn CallGateway>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let registry = Arc::new(CallRegistry::with_config(
            settings.reminder.max_active_calls,
            Duration::from_secs(settings.reminder.eviction_grace_secs),
            Duration::from_secs(settings.reminder.sweep_interval_secs),
        ));
        let prompts = Arc::new(PromptCatalog::default());
        let orchestrator = Arc::new(ReminderOrchestrator::new(
            &settings,
            registry.clone(),
            gateway,
            prompts,
        ));

        Self {
            settings: Arc::new(settings),
            registry,
            orchestrator,
            metrics,
        }
    }
}
