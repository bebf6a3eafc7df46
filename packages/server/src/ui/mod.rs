//! Presentation layer: TCP broker, polling scheduler and status API.

pub mod broker;
pub mod handler;
pub mod runner;
pub mod scheduler;
mod signal;
pub mod state;

pub use broker::{BindError, BrokerOptions, BrokerStatus, ExtensionBroker};
pub use runner::{RunError, run, run_until};
pub use scheduler::{SchedulerControl, SyncScheduler};
