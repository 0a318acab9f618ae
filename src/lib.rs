pub mod config;
pub mod context;
pub mod delivery;
pub mod encode;
pub mod error;
pub mod intercept;
pub mod logging;
pub mod providers;
pub mod record;
pub mod scope;

pub use context::TaskContext;
pub use intercept::{EntryPoint, InterceptionTarget, LibraryCatalog};
pub use record::TelemetryRecord;
pub use scope::{ActiveScope, ExitReport, ScopeController};

/// A scope over every supported entry point for `task_name`.
pub fn monitor(task_name: impl Into<String>) -> ScopeController {
    monitor_with(TaskContext::new(task_name))
}

pub fn monitor_with(context: TaskContext) -> ScopeController {
    ScopeController::new(context).with_targets(providers::openai::supported_targets())
}
