use crate::calendar::OperatorId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// One in-flight calendar write per operator. Callers take a token before
/// writing and a second writer for the same operator is turned away.
#[derive(Debug, Clone, Default)]
pub struct OperatorLocks {
    held: Arc<Mutex<HashSet<OperatorId>>>,
}

impl OperatorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, operator_id: OperatorId) -> Option<OperatorGuard> {
        let mut held = self.held.lock();
        if !held.insert(operator_id) {
            debug!(operator_id, "calendar write already in flight");
            return None;
        }
        Some(OperatorGuard {
            operator_id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, operator_id: OperatorId) -> bool {
        self.held.lock().contains(&operator_id)
    }

    /// Runs `write` under the operator's token, or returns `None` without
    /// running it when the token is taken.
    pub fn with_operator<T, F>(&self, operator_id: OperatorId, write: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        let _guard = self.try_acquire(operator_id)?;
        Some(write())
    }
}

#[derive(Debug)]
pub struct OperatorGuard {
    operator_id: OperatorId,
    held: Arc<Mutex<HashSet<OperatorId>>>,
}

impl OperatorGuard {
    pub fn operator_id(&self) -> OperatorId {
        self.operator_id
    }
}

impl Drop for OperatorGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.operator_id);
    }
}
