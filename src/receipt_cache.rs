use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};

/// Entries held across all peers before the oldest is forgotten.
pub const DEFAULT_RECEIPT_CAPACITY: usize = 1000;

/// Metadata of a sent message that asked for a delivery receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptEntry {
    pub message_id: String,
    pub timestamp: i64,
    pub content: String,
    pub receipt_requested: bool,
}

/// Process-wide store of sent messages awaiting their delivery receipt.
///
/// Entries are keyed by `(peer id, server message id)` so several sessions in
/// one process can share the cache. An entry is consumed by the first receipt
/// that references it. Receipts that never arrive are aged out oldest-first
/// once `capacity` entries are held.
#[derive(Debug)]
pub struct MessageReceiptCache {
    entries: DashMap<(String, String), (u64, ReceiptEntry)>,
    next_seq: AtomicU64,
    capacity: usize,
}

impl Default for MessageReceiptCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECEIPT_CAPACITY)
    }
}

impl MessageReceiptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn add(&self, peer_id: &str, entry: ReceiptEntry) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries
            .insert((peer_id.to_string(), entry.message_id.clone()), (seq, entry));
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|item| item.value().0)
                .map(|item| item.key().clone());
            let Some(key) = oldest else {
                break;
            };
            debug!(target: "ReceiptCache", "Forgetting receipt for {} of {}", key.1, key.0);
            self.entries.remove(&key);
        }
    }

    /// Removes and returns the entry, so a receipt is surfaced at most once.
    pub fn take(&self, peer_id: &str, message_id: &str) -> Option<ReceiptEntry> {
        self.entries
            .remove(&(peer_id.to_string(), message_id.to_string()))
            .map(|(_, (_, entry))| entry)
    }

    pub fn contains(&self, peer_id: &str, message_id: &str) -> bool {
        self.entries
            .contains_key(&(peer_id.to_string(), message_id.to_string()))
    }

    /// Drops every entry belonging to `peer_id`.
    pub fn clear_peer(&self, peer_id: &str) {
        self.entries.retain(|(peer, _), _| peer != peer_id);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
