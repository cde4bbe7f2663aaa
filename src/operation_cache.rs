//! In-flight client requests keyed by request id.
//!
//! Inbound frames resolve entries on the transport task while the client API
//! offers new ones from arbitrary callers, so every access goes through one
//! lock. Draining takes the whole map in a single critical section.

use crate::types::operation::Operation;
use log::warn;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationCacheError {
    #[error("an operation with request id {0} is already in flight")]
    Duplicate(i32),
}

#[derive(Debug, Default)]
pub struct OperationCache {
    cache: Mutex<HashMap<i32, Operation>>,
}

impl OperationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, Operation>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers an operation. The existing entry wins if the id is taken.
    pub fn offer(&self, operation: Operation) -> Result<(), OperationCacheError> {
        let mut cache = self.lock();
        if let Some(existing) = cache.get(&operation.request_id) {
            warn!(
                target: "Session/Operations",
                "Refusing to overwrite in-flight {} with {} for request id {}",
                existing.kind,
                operation.kind,
                operation.request_id
            );
            return Err(OperationCacheError::Duplicate(operation.request_id));
        }
        cache.insert(operation.request_id, operation);
        Ok(())
    }

    /// Removes and returns the operation for `request_id`.
    pub fn poll(&self, request_id: i32) -> Option<Operation> {
        self.lock().remove(&request_id)
    }

    pub fn contains(&self, request_id: i32) -> bool {
        self.lock().contains_key(&request_id)
    }

    /// Empties the cache, returning entries ordered by request id.
    pub fn drain(&self) -> Vec<Operation> {
        let mut drained: Vec<Operation> = self.lock().drain().map(|(_, op)| op).collect();
        drained.sort_by_key(|op| op.request_id);
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
