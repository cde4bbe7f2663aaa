//! Wire vocabulary of the session protocol.
//!
//! Inbound frames arrive from the server, outbound packets are produced by the
//! session listener and the client API. Both are encoded as JSON objects
//! tagged by a `cmd` field; the transport treats them as opaque bytes.

use crate::signature::Signature;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode packet: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Server-side session command ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOp {
    Opened,
    Closed,
    QueryResult,
}

/// Server-side conversation command ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationOp {
    Started,
    Added,
    Removed,
    Updated,
    MemberCountQueryResult,
    QueryResult,
    Joined,
    Left,
    MembersJoined,
    MembersLeft,
    Muted,
    Unmuted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFrame {
    /// Session token handed out on a successful open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st: Option<String>,
    /// Lifetime of `st` in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_ttl: Option<i64>,
    /// Present when the server closed the session on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub online_peer_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectFrame {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default)]
    pub from_peer_id: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub transient: bool,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub patch_timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Server-assigned message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub t: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Delivery or read receipt for a message or a whole conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptFrame {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadTuple {
    pub cid: String,
    pub unread: u32,
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub patch_timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadFrame {
    #[serde(default)]
    pub notif_time: i64,
    #[serde(default)]
    pub convs: Vec<UnreadTuple>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchItem {
    pub cid: String,
    pub mid: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub patch_timestamp: i64,
    #[serde(default)]
    pub recall: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchFrame {
    #[serde(default)]
    pub patches: Vec<PatchItem>,
    /// Only meaningful on query-style results.
    #[serde(default)]
    pub last_patch_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Raw JSON results of a conversation query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogItem {
    pub msg_id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub ack_at: i64,
    #[serde(default)]
    pub read_at: i64,
    #[serde(default)]
    pub patch_timestamp: i64,
}

/// A typed inbound frame, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum InboundFrame {
    Session {
        op: SessionOp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
        #[serde(flatten)]
        body: SessionFrame,
    },
    Direct(DirectFrame),
    Ack {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
        #[serde(flatten)]
        body: AckFrame,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
        #[serde(flatten)]
        body: ErrorFrame,
    },
    Rcp(ReceiptFrame),
    Read(ReceiptFrame),
    Unread(UnreadFrame),
    Patch {
        /// `true` for pushed edits/recalls, `false` for a patch-time query result.
        modify: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
        #[serde(flatten)]
        body: PatchFrame,
    },
    Conv {
        op: ConversationOp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
        #[serde(flatten)]
        body: ConversationFrame,
    },
    Logs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
        #[serde(default)]
        logs: Vec<LogItem>,
    },
}

impl InboundFrame {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Direct(_) => "direct",
            Self::Ack { .. } => "ack",
            Self::Error { .. } => "error",
            Self::Rcp(_) => "rcp",
            Self::Read(_) => "read",
            Self::Unread(_) => "unread",
            Self::Patch { .. } => "patch",
            Self::Conv { .. } => "conv",
            Self::Logs { .. } => "logs",
        }
    }
}

/// Conversation-scoped requests a client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRequestOp {
    Start,
    Add,
    Remove,
    Join,
    Quit,
    Update,
    Query,
    Count,
    Mute,
    Unmute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum OutboundPacket {
    Open {
        peer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        st: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<Signature>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        last_notify_time: i64,
        last_patch_time: i64,
        reconnect: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        i: Option<i32>,
    },
    Close {
        peer_id: String,
        i: i32,
    },
    QueryOnline {
        peer_id: String,
        session_peer_ids: Vec<String>,
        i: i32,
    },
    /// Acknowledges a message that belongs to a conversation.
    ConvAck {
        peer_id: String,
        cid: String,
        mid: String,
    },
    /// Acknowledges a message outside any conversation.
    SessionAck {
        peer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mid: Option<String>,
    },
    Direct {
        peer_id: String,
        cid: String,
        msg: String,
        receipt: bool,
        transient: bool,
        i: i32,
    },
    Conv {
        peer_id: String,
        op: ConversationRequestOp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cid: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        members: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<serde_json::Value>,
        i: i32,
    },
    Logs {
        peer_id: String,
        cid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        t: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mid: Option<String>,
        limit: u32,
        i: i32,
    },
    PatchQuery {
        peer_id: String,
        last_patch_time: i64,
        i: i32,
    },
}

impl OutboundPacket {
    /// Request id carried by the packet, if any.
    pub fn request_id(&self) -> Option<i32> {
        match self {
            Self::Open { i, .. } => *i,
            Self::Close { i, .. }
            | Self::QueryOnline { i, .. }
            | Self::Direct { i, .. }
            | Self::Conv { i, .. }
            | Self::Logs { i, .. }
            | Self::PatchQuery { i, .. } => Some(*i),
            Self::ConvAck { .. } | Self::SessionAck { .. } => None,
        }
    }
}

pub fn encode_packet(packet: &OutboundPacket) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(packet).map_err(ProtocolError::Encode)
}

pub fn decode_frame(data: &[u8]) -> Result<InboundFrame, ProtocolError> {
    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}

/// Used by servers and test harnesses that speak the other side of the protocol.
pub fn encode_frame(frame: &InboundFrame) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(frame).map_err(ProtocolError::Encode)
}

pub fn decode_packet(data: &[u8]) -> Result<OutboundPacket, ProtocolError> {
    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}
