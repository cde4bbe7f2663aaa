//! Stale message depot.
//!
//! Remembers the ids of inbound messages that were already delivered so a
//! replay after reconnect is acknowledged but not surfaced twice. The set is
//! bounded: once `capacity` ids are held the oldest one is forgotten first.
//! Contents are written through to a [`DepotStore`] so they survive restarts.

use crate::store::error::Result;
use crate::store::traits::DepotStore;
use log::{debug, warn};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_DEPOT_CAPACITY: usize = 1000;

const DEPOT_KEY_PREFIX: &str = "session.message.";

#[derive(Debug, Default)]
struct DepotState {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

pub struct StaleMessageDepot {
    key: String,
    capacity: usize,
    state: Mutex<DepotState>,
    store: Arc<dyn DepotStore>,
}

impl StaleMessageDepot {
    /// Loads the depot for `peer_id`, keeping only the newest `capacity` ids.
    pub async fn load(
        peer_id: &str,
        store: Arc<dyn DepotStore>,
        capacity: usize,
    ) -> Result<Self> {
        let key = format!("{DEPOT_KEY_PREFIX}{peer_id}");
        let capacity = capacity.max(1);
        let stored = store.load_depot(&key).await?;

        let mut state = DepotState::default();
        let skip = stored.len().saturating_sub(capacity);
        for id in stored.into_iter().skip(skip) {
            if state.seen.insert(id.clone()) {
                state.order.push_back(id);
            }
        }
        debug!(target: "Depot", "Loaded {} stale message ids for {key}", state.order.len());

        Ok(Self {
            key,
            capacity,
            state: Mutex::new(state),
            store,
        })
    }

    /// Records `message_id`, returning `true` only the first time it is seen.
    pub async fn put_if_absent(&self, message_id: &str) -> bool {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.seen.insert(message_id.to_string()) {
                return false;
            }
            state.order.push_back(message_id.to_string());
            while state.order.len() > self.capacity {
                if let Some(evicted) = state.order.pop_front() {
                    state.seen.remove(&evicted);
                }
            }
            state.order.iter().cloned().collect::<Vec<_>>()
        };

        if let Err(e) = self.store.save_depot(&self.key, &snapshot).await {
            warn!(target: "Depot", "Failed to persist stale message depot {}: {e}", self.key);
        }
        true
    }

    pub async fn contains(&self, message_id: &str) -> bool {
        self.state.lock().await.seen.contains(message_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
