use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// An outbound chat message waiting for its server ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// The request id the message was sent under, used as its local id.
    pub request_id: i32,
    pub conversation_id: String,
    pub content: String,
    pub receipt_requested: bool,
}

/// Messages sent but not yet acknowledged, in send order.
#[derive(Debug, Default)]
pub struct PendingMessageQueue {
    queue: Mutex<VecDeque<PendingMessage>>,
}

impl PendingMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingMessage>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, message: PendingMessage) {
        self.lock().push_back(message);
    }

    /// Removes the message sent under `request_id`.
    pub fn poll(&self, request_id: i32) -> Option<PendingMessage> {
        let mut queue = self.lock();
        let index = queue.iter().position(|m| m.request_id == request_id)?;
        queue.remove(index)
    }

    /// Takes every pending message, oldest first.
    pub fn drain(&self) -> Vec<PendingMessage> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
