//! Shared state of the status API.

use std::sync::Arc;

use crate::{
    ui::{broker::ExtensionBroker, scheduler::SchedulerControl},
    usecase::StateReconciler,
};

/// Shared application state
pub struct AppState {
    /// Browser-extension broker (status only)
    pub broker: Arc<ExtensionBroker>,
    /// Owner of the runtime state
    pub reconciler: Arc<StateReconciler>,
    /// Desktop target of the polling scheduler
    pub scheduler: SchedulerControl,
}
