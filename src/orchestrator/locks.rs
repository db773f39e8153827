//! Per-workspace mutual exclusion.
//!
//! Every transition holds its workspace's lock from the precondition
//! check through the external tool call to the final commit, so two
//! requests for the same workspace never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

/// `(project, workspace)` key.
pub type WorkspaceKey = (String, String);

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Registry of one async mutex per workspace key.
#[derive(Debug, Default)]
pub struct WorkspaceLocks {
    slots: Mutex<HashMap<WorkspaceKey, Slot>>,
}

impl WorkspaceLocks {
    fn slot(&self, project: &str, workspace: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry((project.to_owned(), workspace.to_owned()))
                .or_default(),
        )
    }

    /// Wait for exclusive access to one workspace.
    pub async fn acquire(&self, project: &str, workspace: &str) -> OwnedMutexGuard<()> {
        self.slot(project, workspace).lock_owned().await
    }

    /// Wait for exclusive access to several workspaces, in key order.
    pub async fn acquire_many<I>(&self, keys: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = WorkspaceKey>,
    {
        let mut keys: Vec<WorkspaceKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for (project, workspace) in keys {
            guards.push(self.acquire(&project, &workspace).await);
        }
        guards
    }

    /// Make sure `keys` are covered by a later [`WorkspaceLocks::quiesce`].
    pub fn track<I>(&self, keys: I)
    where
        I: IntoIterator<Item = WorkspaceKey>,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            slots.entry(key).or_default();
        }
    }

    /// Acquire every lock known so far, giving up on each at `deadline`.
    ///
    /// Returns the held guards and the keys whose transition was still in
    /// flight when the deadline passed.
    pub async fn quiesce(
        &self,
        deadline: Instant,
    ) -> (Vec<OwnedMutexGuard<()>>, Vec<WorkspaceKey>) {
        let mut known: Vec<(WorkspaceKey, Slot)> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots
                .iter()
                .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
                .collect()
        };
        known.sort_by(|a, b| a.0.cmp(&b.0));

        let mut guards = Vec::with_capacity(known.len());
        let mut busy = Vec::new();
        for (key, slot) in known {
            match tokio::time::timeout_at(deadline, slot.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => busy.push(key),
            }
        }
        (guards, busy)
    }
}
