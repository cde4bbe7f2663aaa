//! Per-peer session state.
//!
//! A [`Session`] is created on login and shared by the listener (inbound
//! frames) and the request API (outbound commands). Every flag is atomic so
//! the two sides never need a common lock.

use crate::conversation::ConversationRegistry;
use crate::operation_cache::OperationCache;
use crate::pending::PendingMessageQueue;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub struct Session {
    peer_id: String,
    tag: Option<String>,

    opened: AtomicBool,
    paused: AtomicBool,
    resuming: AtomicBool,
    /// Held while an authentication attempt is between start and OPEN send.
    opening: AtomicBool,

    last_notify_time: AtomicI64,
    last_patch_time: AtomicI64,
    server_ack_received: AtomicI64,

    request_counter: AtomicI32,
    /// Request id of the latest signature-path OPEN still in the cache.
    open_request: Mutex<Option<i32>>,

    pending: PendingMessageQueue,
    operations: OperationCache,
    conversations: Arc<ConversationRegistry>,
}

impl Session {
    pub fn new(
        peer_id: impl Into<String>,
        tag: Option<String>,
        conversations: Arc<ConversationRegistry>,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            tag,
            opened: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            resuming: AtomicBool::new(false),
            opening: AtomicBool::new(false),
            last_notify_time: AtomicI64::new(0),
            last_patch_time: AtomicI64::new(0),
            server_ack_received: AtomicI64::new(0),
            request_counter: AtomicI32::new(0),
            open_request: Mutex::new(None),
            pending: PendingMessageQueue::new(),
            operations: OperationCache::new(),
            conversations,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_resuming(&self) -> bool {
        self.resuming.load(Ordering::SeqCst)
    }

    pub fn is_opening(&self) -> bool {
        self.opening.load(Ordering::SeqCst)
    }

    pub(crate) fn set_opened(&self, opened: bool) {
        self.opened.store(opened, Ordering::SeqCst);
    }

    pub(crate) fn set_resuming(&self, resuming: bool) {
        self.resuming.store(resuming, Ordering::SeqCst);
    }

    /// Transitions to paused. Returns `false` if the session already was.
    pub(crate) fn mark_paused(&self) -> bool {
        self.paused
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Leaves the paused state. Returns `true` if the session was paused.
    pub(crate) fn clear_paused(&self) -> bool {
        self.paused
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Whether the transport coming up should trigger authentication.
    pub fn wants_open(&self) -> bool {
        self.is_opened() || self.is_resuming()
    }

    pub(crate) fn try_begin_open(&self) -> bool {
        let acquired = self
            .opening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !acquired {
            debug!(target: "Session/Open", "Open already in flight for {}", self.peer_id);
        }
        acquired
    }

    pub(crate) fn end_open(&self) {
        self.opening.store(false, Ordering::SeqCst);
    }

    /// Records the request id of a new signature-path OPEN, returning the
    /// one it supersedes.
    pub(crate) fn replace_open_request(&self, request_id: Option<i32>) -> Option<i32> {
        let mut slot = self.open_request.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, request_id)
    }

    /// Forgets `request_id` if it is the remembered open request.
    pub(crate) fn clear_open_request(&self, request_id: i32) {
        let mut slot = self.open_request.lock().unwrap_or_else(|e| e.into_inner());
        if *slot == Some(request_id) {
            *slot = None;
        }
    }

    /// Returns the next request id. Ids are positive and wrap back to 1.
    pub fn next_request_id(&self) -> i32 {
        let previous = self
            .request_counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n == i32::MAX { 1 } else { n + 1 })
            })
            .unwrap_or_default();
        if previous == i32::MAX { 1 } else { previous + 1 }
    }

    pub fn last_notify_time(&self) -> i64 {
        self.last_notify_time.load(Ordering::SeqCst)
    }

    pub fn last_patch_time(&self) -> i64 {
        self.last_patch_time.load(Ordering::SeqCst)
    }

    pub fn server_ack_received(&self) -> i64 {
        self.server_ack_received.load(Ordering::SeqCst)
    }

    pub(crate) fn advance_notify_time(&self, timestamp: i64) {
        self.last_notify_time.fetch_max(timestamp, Ordering::SeqCst);
    }

    pub(crate) fn advance_patch_time(&self, timestamp: i64) {
        self.last_patch_time.fetch_max(timestamp, Ordering::SeqCst);
    }

    pub(crate) fn record_server_ack(&self, timestamp: i64) {
        self.server_ack_received.store(timestamp, Ordering::SeqCst);
    }

    pub fn pending(&self) -> &PendingMessageQueue {
        &self.pending
    }

    pub fn operations(&self) -> &OperationCache {
        &self.operations
    }

    pub fn conversations(&self) -> &Arc<ConversationRegistry> {
        &self.conversations
    }
}
