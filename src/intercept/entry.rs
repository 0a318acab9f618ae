use serde::Serialize;
use std::fmt::{Debug, Display};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use super::interceptor::{intercept, CallRecorder};
use super::target::InterceptionTarget;
use crate::context::TaskContext;
use crate::error::{PatchError, PatchResult};

/// The single call signature an entry point exposes.
pub type Handler<A, R, E> = Arc<dyn Fn(A) -> Result<R, E> + Send + Sync>;

/// A named, replaceable callable.
///
/// Integration code routes every call through [`EntryPoint::call`]; a scope
/// swaps the live handler for an interceptor and later swaps the original
/// back. Identity is `Arc` pointer identity.
pub struct EntryPoint<A, R, E> {
    target: InterceptionTarget,
    live: RwLock<Handler<A, R, E>>,
}

impl<A, R, E> EntryPoint<A, R, E> {
    pub fn new<F>(target: InterceptionTarget, handler: F) -> Self
    where
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    {
        Self::from_handler(target, Arc::new(handler))
    }

    pub fn from_handler(target: InterceptionTarget, handler: Handler<A, R, E>) -> Self {
        Self {
            target,
            live: RwLock::new(handler),
        }
    }

    pub fn target(&self) -> &InterceptionTarget {
        &self.target
    }

    /// Invokes whatever is currently installed. The lock is released before
    /// the handler runs.
    pub fn call(&self, args: A) -> Result<R, E> {
        let handler = self.current();
        handler(args)
    }

    pub fn current(&self) -> Handler<A, R, E> {
        // A poisoned lock still holds a valid handler; callers must not fail on it.
        self.live.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Installs `handler`, returning the one it displaced.
    pub fn replace(&self, handler: Handler<A, R, E>) -> PatchResult<Handler<A, R, E>> {
        let mut live = self.live.write().map_err(|_| PatchError::Poisoned {
            target: self.target.qualified_name(),
        })?;
        Ok(std::mem::replace(&mut *live, handler))
    }

    pub fn set_handler<F>(&self, handler: F) -> PatchResult<Handler<A, R, E>>
    where
        F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    {
        self.replace(Arc::new(handler))
    }

    pub fn is_live(&self, handler: &Handler<A, R, E>) -> bool {
        Arc::ptr_eq(&self.current(), handler)
    }
}

/// Something a scope can patch.
pub trait PatchPoint: Send + Sync {
    fn target(&self) -> &InterceptionTarget;

    /// Installs an interceptor and hands back the saved original.
    fn patch(
        self: Arc<Self>,
        context: Arc<TaskContext>,
        recorder: CallRecorder,
    ) -> PatchResult<Box<dyn PatchState>>;
}

/// One target's patch as held by the scope that made it.
pub trait PatchState: Send {
    fn target(&self) -> &InterceptionTarget;

    /// True iff the original is held and the interceptor is still live.
    fn is_patched(&self) -> bool;

    fn restore(&mut self) -> PatchResult<()>;
}

impl<A, R, E> PatchPoint for EntryPoint<A, R, E>
where
    A: Serialize + Debug + 'static,
    R: Serialize + Debug + 'static,
    E: Display + 'static,
{
    fn target(&self) -> &InterceptionTarget {
        &self.target
    }

    fn patch(
        self: Arc<Self>,
        context: Arc<TaskContext>,
        recorder: CallRecorder,
    ) -> PatchResult<Box<dyn PatchState>> {
        let mut live = self.live.write().map_err(|_| PatchError::Poisoned {
            target: self.target.qualified_name(),
        })?;

        // Capture and install under one write lock.
        let original = live.clone();
        let installed = intercept(original.clone(), self.target.clone(), context, recorder);
        *live = installed.clone();
        drop(live);

        debug!("Patched {}", self.target);
        Ok(Box::new(EntryPatch {
            entry: self,
            original: Some(original),
            installed: Some(installed),
        }))
    }
}

struct EntryPatch<A, R, E> {
    entry: Arc<EntryPoint<A, R, E>>,
    original: Option<Handler<A, R, E>>,
    installed: Option<Handler<A, R, E>>,
}

impl<A, R, E> PatchState for EntryPatch<A, R, E> {
    fn target(&self) -> &InterceptionTarget {
        &self.entry.target
    }

    fn is_patched(&self) -> bool {
        match (&self.original, &self.installed) {
            (Some(_), Some(installed)) => self.entry.is_live(installed),
            _ => false,
        }
    }

    fn restore(&mut self) -> PatchResult<()> {
        let Some(original) = self.original.take() else {
            return Err(PatchError::NotPatched {
                target: self.entry.target.qualified_name(),
            });
        };

        if let Some(installed) = &self.installed {
            if !self.entry.is_live(installed) {
                // Another scope patched over us; we still put our original back.
                warn!(
                    "{} was re-patched by another scope; restoring this scope's original anyway",
                    self.entry.target
                );
            }
        }

        match self.entry.replace(original.clone()) {
            Ok(_) => {
                self.installed = None;
                debug!("Restored {}", self.entry.target);
                Ok(())
            }
            Err(e) => {
                self.original = Some(original);
                Err(e)
            }
        }
    }
}
