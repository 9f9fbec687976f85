use std::collections::HashSet;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Client-local delayed tasks keyed by courier id. Timers are best-effort
/// and non-persistent; the store, not this registry, is authoritative, so
/// every armed task must re-check persisted state before acting.
#[derive(Default)]
pub struct TimerRegistry {
    tasks: DashMap<Uuid, JoinHandle<()>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task for a courier, aborting any previous one.
    pub fn arm(&self, courier_id: Uuid, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(courier_id, handle) {
            previous.abort();
        }
    }

    /// Abort and drop the courier's task, if any.
    pub fn disarm(&self, courier_id: Uuid) {
        if let Some((_, handle)) = self.tasks.remove(&courier_id) {
            handle.abort();
        }
    }

    /// Drop the entry without aborting. Used by a task cleaning up after
    /// itself once it has run.
    pub fn forget(&self, courier_id: Uuid) {
        self.tasks.remove(&courier_id);
    }

    /// Reconcile against freshly polled state: abort every task whose
    /// courier is no longer in the pending set.
    pub fn reconcile(&self, pending: &HashSet<Uuid>) {
        let stale: Vec<Uuid> = self
            .tasks
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| !pending.contains(id))
            .collect();

        for id in stale {
            self.disarm(id);
        }
    }

    /// Abort everything; used on shutdown or when switching away from a
    /// unit's view.
    pub fn clear(&self) {
        let all: Vec<Uuid> = self.tasks.iter().map(|entry| *entry.key()).collect();
        for id in all {
            self.disarm(id);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::TimerRegistry;

    #[tokio::test]
    async fn arm_replaces_previous_task() {
        let registry = TimerRegistry::new();
        let id = Uuid::new_v4();

        registry.arm(id, tokio::spawn(std::future::pending()));
        registry.arm(id, tokio::spawn(std::future::pending()));

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_drops_tasks_outside_pending_set() {
        let registry = TimerRegistry::new();
        let kept = Uuid::new_v4();
        let dropped = Uuid::new_v4();

        registry.arm(kept, tokio::spawn(std::future::pending()));
        registry.arm(dropped, tokio::spawn(std::future::pending()));

        registry.reconcile(&HashSet::from([kept]));

        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
