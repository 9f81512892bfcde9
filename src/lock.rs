//! Per-target mutual exclusion for deployment attempts.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::error::{DeployError, DeployResult};

/// Set of targets with an attempt in flight.
#[derive(Debug, Default)]
pub struct TargetLocks {
    held: Mutex<HashSet<String>>,
}

/// Held for the duration of one attempt; releases on drop.
#[derive(Debug)]
pub struct TargetGuard<'a> {
    locks: &'a TargetLocks,
    target_id: String,
}

impl TargetLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `target_id`, failing with a conflict if another
    /// attempt holds it.
    pub fn acquire(&self, target_id: &str) -> DeployResult<TargetGuard<'_>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(target_id.to_string()) {
            return Err(DeployError::Conflict(format!(
                "a deployment is already running for target {target_id}"
            )));
        }
        Ok(TargetGuard {
            locks: self,
            target_id: target_id.to_string(),
        })
    }

    #[must_use]
    pub fn is_held(&self, target_id: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(target_id)
    }
}

impl Drop for TargetGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.target_id);
    }
}
