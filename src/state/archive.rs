use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::ExecutionState;

/// Read-only store of finished runs, kept for a bounded retention window.
#[derive(Debug)]
pub struct StateArchive {
    retention: Duration,
    capacity: usize,
    entries: RwLock<VecDeque<Arc<ExecutionState>>>,
}

impl StateArchive {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            retention,
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Stores a terminal state, purging expired runs and evicting the oldest
    /// entry once the archive is full. Non-terminal states are refused.
    pub fn archive(&self, state: ExecutionState) -> Option<Arc<ExecutionState>> {
        if !state.is_terminal() {
            warn!(
                execution_id = %state.execution_id(),
                status = %state.status(),
                "refusing to archive a run that is still in flight"
            );
            return None;
        }

        self.purge_expired(Utc::now());

        let state = Arc::new(state);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(execution_id = %evicted.execution_id(), "evicting archived run");
            }
        }
        entries.push_back(state.clone());
        Some(state)
    }

    pub fn get(&self, execution_id: &str) -> Option<Arc<ExecutionState>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|state| state.execution_id() == execution_id)
            .cloned()
    }

    /// Drops runs that finished more than `retention` before `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|state| {
            state
                .finished_at()
                .and_then(|finished| finished.checked_add_signed(retention))
                .is_none_or(|expires| expires > now)
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
