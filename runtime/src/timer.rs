//! Cancellable task registry backing `Effect::Cancellable` and `Effect::Cancel`.
//!
//! The [`TimerService`] owns at most one task per [`EffectId`]. Spawning under
//! an id that is still pending aborts the previous task before the new one is
//! registered, so a superseded refresh deadline can never fire.

use link_session_core::effect::EffectId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

type Registry = HashMap<EffectId, (u64, AbortHandle)>;

/// Registry of cancellable tasks keyed by [`EffectId`]
///
/// Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct TimerService {
    tasks: Arc<Mutex<Registry>>,
    sequence: Arc<AtomicU64>,
}

impl TimerService {
    /// Create an empty timer service
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `task` under `id`, aborting any task already registered under it
    ///
    /// The registration is removed when the task finishes on its own.
    pub fn spawn<F>(&self, id: EffectId, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let finished_id = id.clone();

        // Hold the registry lock across spawn so the task cannot deregister
        // itself before it has been registered.
        let mut registry = self.registry();
        let handle = tokio::spawn(async move {
            task.await;
            let mut registry = tasks.lock().unwrap_or_else(PoisonError::into_inner);
            if registry.get(&finished_id).is_some_and(|(current, _)| *current == seq) {
                registry.remove(&finished_id);
            }
        });

        if let Some((_, previous)) = registry.insert(id.clone(), (seq, handle.abort_handle())) {
            previous.abort();
            tracing::trace!(effect_id = %id, "Superseded pending task");
            metrics::counter!("store.timers.cancelled").increment(1);
        }
    }

    /// Abort the task registered under `id`
    ///
    /// Returns `true` if a task was pending.
    pub fn cancel(&self, id: &EffectId) -> bool {
        let removed = self.registry().remove(id);
        match removed {
            Some((_, handle)) => {
                handle.abort();
                tracing::trace!(effect_id = %id, "Cancelled pending task");
                metrics::counter!("store.timers.cancelled").increment(1);
                true
            },
            None => false,
        }
    }

    /// Abort every registered task
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.registry().drain().collect();
        for (id, (_, handle)) in drained {
            handle.abort();
            tracing::trace!(effect_id = %id, "Cancelled pending task");
        }
    }

    /// Whether a task is currently registered under `id`
    #[must_use]
    pub fn is_pending(&self, id: &EffectId) -> bool {
        self.registry().contains_key(id)
    }

    /// Number of registered tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    /// Whether no task is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }
}
