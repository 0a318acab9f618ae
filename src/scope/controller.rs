use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config;
use crate::context::TaskContext;
use crate::delivery::{self, DeliveryQueue};
use crate::error::PatchError;
use crate::intercept::{CallRecorder, InterceptionTarget, LibraryCatalog, PatchPoint, PatchState};

/// What happened when a scope closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitReport {
    /// False when the scope was entered with monitoring disabled.
    pub monitoring: bool,
    pub restored: usize,
    pub failed: Vec<String>,
}

/// Installs interceptors for the lifetime of one task and puts the originals
/// back afterwards.
///
/// `Idle -> Active -> Idle`, re-enterable. While active the controller is
/// mutably borrowed by its [`ActiveScope`], whose `Drop` performs the exit on
/// every path out: normal return, `?`, or a panic unwinding through it.
///
/// Two scopes patching the same entry point at the same time is not guarded
/// against. Each scope saves and restores its own "original", so the later
/// exit can reinstate an intermediate interceptor.
pub struct ScopeController {
    context: Arc<TaskContext>,
    points: Vec<Arc<dyn PatchPoint>>,
    catalog: Option<Arc<LibraryCatalog>>,
    queue: Option<DeliveryQueue>,
    user_id: Option<String>,
    enabled: Option<bool>,
    patches: Vec<Box<dyn PatchState>>,
    active: bool,
    monitoring: bool,
}

impl ScopeController {
    pub fn new(context: TaskContext) -> Self {
        Self {
            context: Arc::new(context),
            points: Vec::new(),
            catalog: None,
            queue: None,
            user_id: None,
            enabled: None,
            patches: Vec::new(),
            active: false,
            monitoring: false,
        }
    }

    pub fn with_target(mut self, point: Arc<dyn PatchPoint>) -> Self {
        self.points.push(point);
        self
    }

    pub fn with_targets<I>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn PatchPoint>>,
    {
        self.points.extend(points);
        self
    }

    /// Defaults to [`LibraryCatalog::global`].
    pub fn with_catalog(mut self, catalog: Arc<LibraryCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Defaults to the process-wide queue, which starts the delivery worker
    /// the first time a target is actually patched.
    pub fn with_queue(mut self, queue: DeliveryQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Per-scope switch. `false` turns monitoring off for this scope; `true`
    /// has no effect while `RESULT_AI_ENABLED` is falsy.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn patched_targets(&self) -> Vec<&InterceptionTarget> {
        self.patches
            .iter()
            .filter(|p| p.is_patched())
            .map(|p| p.target())
            .collect()
    }

    pub fn enter(&mut self) -> ActiveScope<'_> {
        self.activate();
        ActiveScope {
            controller: self,
            finished: false,
        }
    }

    pub fn run<T>(&mut self, body: impl FnOnce() -> T) -> T {
        let _scope = self.enter();
        body()
    }

    /// Like [`run`](Self::run), logging an `Err` from the body before
    /// handing it back untouched.
    pub fn run_fallible<T, E: Display>(
        &mut self,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let scope = self.enter();
        let result = body();
        if let Err(e) = &result {
            error!("Error inside monitored task '{}': {}", scope.context().task_name, e);
        }
        drop(scope);
        result
    }

    fn activate(&mut self) {
        self.active = true;
        // The global switch always wins; a scope can only opt out further.
        self.monitoring = self.enabled.unwrap_or(true) && config::monitoring_enabled();
        if !self.monitoring {
            debug!("Monitoring disabled; task '{}' runs unpatched", self.context.task_name);
            return;
        }

        info!("Entering monitoring scope for task: {}", self.context.task_name);
        self.context.check_template();

        let catalog = self.catalog.clone().unwrap_or_else(LibraryCatalog::global);
        let compatible: Vec<Arc<dyn PatchPoint>> = self
            .points
            .iter()
            .filter(|point| is_compatible(point.target(), &catalog))
            .cloned()
            .collect();
        if compatible.is_empty() {
            return;
        }

        let queue = self.queue.clone().unwrap_or_else(delivery::global_queue);
        let user_id = self.user_id.clone().or_else(config::configured_user_id);
        let recorder = CallRecorder::new(queue).with_user_id(user_id);

        for point in compatible {
            let target = point.target().clone();
            match point.patch(self.context.clone(), recorder.clone()) {
                Ok(state) => self.patches.push(state),
                Err(e) => error!("Failed to patch {}: {}", target, e),
            }
        }
    }

    fn deactivate(&mut self) -> ExitReport {
        let mut report = ExitReport {
            monitoring: self.monitoring,
            ..ExitReport::default()
        };
        if !self.active {
            return report;
        }

        // Last patched, first restored.
        while let Some(mut patch) = self.patches.pop() {
            let name = patch.target().qualified_name();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| patch.restore()));
            match outcome {
                Ok(Ok(())) => report.restored += 1,
                Ok(Err(e)) => {
                    error!("Error restoring {}: {}", name, e);
                    report.failed.push(name);
                }
                Err(_) => {
                    let e = PatchError::Restore {
                        target: name.clone(),
                        reason: "restore panicked".to_string(),
                    };
                    error!("Error restoring {}: {}", name, e);
                    report.failed.push(name);
                }
            }
        }

        if self.monitoring {
            info!("Exiting monitoring scope for task: {}", self.context.task_name);
        }
        self.active = false;
        self.monitoring = false;
        report
    }
}

fn is_compatible(target: &InterceptionTarget, catalog: &LibraryCatalog) -> bool {
    let Some(version) = catalog.version_of(target.root()) else {
        debug!("Library {} not available; skipping {}", target.root(), target);
        return false;
    };
    if !target.supports(&version) {
        debug!(
            "{} {} is outside the supported range of {}; skipping",
            target.root(),
            version,
            target
        );
        return false;
    }
    true
}

/// A live scope. Dropping it restores every patched entry point.
pub struct ActiveScope<'a> {
    controller: &'a mut ScopeController,
    finished: bool,
}

impl ActiveScope<'_> {
    pub fn context(&self) -> &TaskContext {
        &self.controller.context
    }

    pub fn is_monitoring(&self) -> bool {
        self.controller.monitoring
    }

    pub fn patched_targets(&self) -> Vec<&InterceptionTarget> {
        self.controller.patched_targets()
    }

    pub fn exit(mut self) -> ExitReport {
        self.finished = true;
        self.controller.deactivate()
    }
}

impl Drop for ActiveScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            error!(
                "Panic inside monitored task '{}'; restoring entry points",
                self.controller.context.task_name
            );
        }
        self.controller.deactivate();
    }
}
