//! Payloads published to session and conversation observers.

use crate::error::OperationError;
use crate::operation::OperationKind;
use crate::protocol::{ConversationFrame, ConversationOp};
use crate::types::message::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOpened {
    pub peer_id: String,
    pub request_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResumed {
    pub peer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaused {
    pub peer_id: String,
}

/// Client-initiated close confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosed {
    pub peer_id: String,
    pub request_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedByServer {
    pub peer_id: String,
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineQueryResult {
    pub peer_id: String,
    pub online_peer_ids: Vec<String>,
    pub request_id: Option<i32>,
}

/// An operation resolved with a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailed {
    pub peer_id: String,
    pub conversation_id: Option<String>,
    pub request_id: Option<i32>,
    pub operation: OperationKind,
    pub error: OperationError,
}

/// A session-scoped server error that is surfaced but not retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub peer_id: String,
    pub error: OperationError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceived {
    pub message: Message,
    pub has_more: bool,
    pub transient: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSent {
    pub conversation_id: String,
    pub request_id: i32,
    pub message_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceipt {
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageUpdated {
    pub message: Message,
    pub recalled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadUpdate {
    pub message: Message,
    pub unread: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkKind {
    DeliveredAt,
    ReadAt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkUpdate {
    pub conversation_id: String,
    pub kind: WatermarkKind,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationCommandResult {
    pub conversation_id: String,
    /// Kind of the request that triggered this frame, when it answers one.
    pub origin: Option<OperationKind>,
    pub op: ConversationOp,
    pub request_id: Option<i32>,
    pub frame: ConversationFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryResult {
    pub conversation_id: String,
    pub request_id: i32,
    pub messages: Vec<Message>,
}

/// Payload returned to the requester of a session-scoped query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPayload {
    Conversations(String),
    LastPatchTime(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub peer_id: String,
    pub request_id: i32,
    pub operation: OperationKind,
    pub payload: QueryPayload,
}
