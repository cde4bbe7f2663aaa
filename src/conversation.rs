use crate::types::events::{
    ConversationCommandResult, EventBus, HistoryResult, MessageReceipt, MessageReceived,
    MessageSent, MessageUpdated, UnreadUpdate, WatermarkKind, WatermarkUpdate,
};
use crate::types::message::Message;
use dashmap::DashMap;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Client-side view of one conversation.
///
/// Holds the delivered-at and read-at watermarks, which only ever move
/// forward, and forwards every callback to the event bus.
pub struct Conversation {
    id: String,
    delivered_at: AtomicI64,
    read_at: AtomicI64,
    unread: AtomicU32,
    events: Arc<EventBus>,
}

impl Conversation {
    fn new(id: String, events: Arc<EventBus>) -> Self {
        Self {
            id,
            delivered_at: AtomicI64::new(0),
            read_at: AtomicI64::new(0),
            unread: AtomicU32::new(0),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn delivered_at(&self) -> i64 {
        self.delivered_at.load(Ordering::SeqCst)
    }

    pub fn read_at(&self) -> i64 {
        self.read_at.load(Ordering::SeqCst)
    }

    pub fn unread_count(&self) -> u32 {
        self.unread.load(Ordering::SeqCst)
    }

    pub fn on_message(&self, message: Message, has_more: bool, transient: bool) {
        let _ = self.events.message.send(Arc::new(MessageReceived {
            message,
            has_more,
            transient,
        }));
    }

    pub fn on_message_sent(&self, request_id: i32, message_id: String, timestamp: i64) {
        let _ = self.events.message_sent.send(Arc::new(MessageSent {
            conversation_id: self.id.clone(),
            request_id,
            message_id,
            timestamp,
        }));
    }

    pub fn on_message_receipt(&self, message: Message) {
        let _ = self
            .events
            .message_receipt
            .send(Arc::new(MessageReceipt { message }));
    }

    pub fn on_message_updated(&self, message: Message, recalled: bool) {
        let _ = self
            .events
            .message_updated
            .send(Arc::new(MessageUpdated { message, recalled }));
    }

    pub fn on_unread(&self, message: Message, unread: u32) {
        self.unread.store(unread, Ordering::SeqCst);
        let _ = self
            .events
            .unread
            .send(Arc::new(UnreadUpdate { message, unread }));
    }

    pub fn on_delivered_at(&self, timestamp: i64) {
        self.advance(&self.delivered_at, WatermarkKind::DeliveredAt, timestamp);
    }

    pub fn on_read_at(&self, timestamp: i64) {
        self.advance(&self.read_at, WatermarkKind::ReadAt, timestamp);
    }

    fn advance(&self, watermark: &AtomicI64, kind: WatermarkKind, timestamp: i64) {
        let previous = watermark.fetch_max(timestamp, Ordering::SeqCst);
        if timestamp <= previous {
            debug!(
                target: "Conversation",
                "Ignoring stale {kind:?} {timestamp} for {} (current {previous})",
                self.id
            );
            return;
        }
        let _ = self.events.watermark.send(Arc::new(WatermarkUpdate {
            conversation_id: self.id.clone(),
            kind,
            timestamp,
        }));
    }

    pub fn on_command_result(&self, result: ConversationCommandResult) {
        let _ = self.events.conversation_command.send(Arc::new(result));
    }

    pub fn on_history(&self, request_id: i32, messages: Vec<Message>) {
        let _ = self.events.history.send(Arc::new(HistoryResult {
            conversation_id: self.id.clone(),
            request_id,
            messages,
        }));
    }
}

/// Owner of every conversation handle; sessions look conversations up by id.
pub struct ConversationRegistry {
    conversations: DashMap<String, Arc<Conversation>>,
    events: Arc<EventBus>,
}

impl ConversationRegistry {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            conversations: DashMap::new(),
            events,
        }
    }

    /// Returns the conversation, creating it on first reference.
    pub fn get_or_create(&self, conversation_id: &str) -> Arc<Conversation> {
        self.conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                Arc::new(Conversation::new(
                    conversation_id.to_string(),
                    self.events.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, conversation_id: &str) -> Option<Arc<Conversation>> {
        self.conversations
            .get(conversation_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
