//! Outbound commands that expect a server response.
//!
//! Each command takes a fresh request id, registers an [`Operation`] under it
//! and sends the packet. If the send fails the registration is rolled back
//! and the error returned, so nothing is left waiting for an answer that
//! cannot come.

use crate::client::ClientError;
use crate::listener::SessionListener;
use crate::pending::PendingMessage;
use crate::types::operation::{Operation, OperationKind};
use imcore::protocol::{ConversationRequestOp, OutboundPacket};
use log::debug;

/// Default page size of a history query.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

impl SessionListener {
    async fn send_request(&self, op: Operation, packet: OutboundPacket) -> Result<i32, ClientError> {
        let request_id = op.request_id;
        let kind = op.kind;
        self.session.operations().offer(op)?;
        if let Err(e) = self.sink.send_packet(&packet).await {
            self.session.operations().poll(request_id);
            return Err(e);
        }
        debug!(target: "Session/Request", "Sent {kind} as request {request_id}");
        Ok(request_id)
    }

    /// Logs the session out. Answered by a CLOSED session frame.
    pub async fn close(&self) -> Result<i32, ClientError> {
        let request_id = self.session.next_request_id();
        self.send_request(
            Operation::new(OperationKind::ClientDisconnect, self.peer_id(), None, request_id),
            OutboundPacket::Close {
                peer_id: self.peer_id().to_string(),
                i: request_id,
            },
        )
        .await
    }

    pub async fn query_online(&self, peer_ids: Vec<String>) -> Result<i32, ClientError> {
        let request_id = self.session.next_request_id();
        self.send_request(
            Operation::new(OperationKind::ClientOnlineQuery, self.peer_id(), None, request_id),
            OutboundPacket::QueryOnline {
                peer_id: self.peer_id().to_string(),
                session_peer_ids: peer_ids,
                i: request_id,
            },
        )
        .await
    }

    /// Sends a chat message. The returned request id doubles as the local
    /// message id until the server assigns one in its ack.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        receipt_requested: bool,
        transient: bool,
    ) -> Result<i32, ClientError> {
        if conversation_id.trim().is_empty() {
            return Err(ClientError::InvalidOperation(
                "a message needs a conversation id".to_string(),
            ));
        }
        let request_id = self.session.next_request_id();
        self.session.pending().push(PendingMessage {
            request_id,
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
            receipt_requested,
        });

        let result = self
            .send_request(
                Operation::new(
                    OperationKind::ConversationSendMessage,
                    self.peer_id(),
                    Some(conversation_id.to_string()),
                    request_id,
                ),
                OutboundPacket::Direct {
                    peer_id: self.peer_id().to_string(),
                    cid: conversation_id.to_string(),
                    msg: content.to_string(),
                    receipt: receipt_requested,
                    transient,
                    i: request_id,
                },
            )
            .await;
        if result.is_err() {
            self.session.pending().poll(request_id);
        }
        result
    }

    /// Issues a conversation-scoped command. Creation is the only kind that
    /// may omit the conversation id.
    pub async fn conversation_command(
        &self,
        kind: OperationKind,
        conversation_id: Option<String>,
        members: Vec<String>,
        attributes: Option<serde_json::Value>,
    ) -> Result<i32, ClientError> {
        let op = match kind {
            OperationKind::ConversationCreation => ConversationRequestOp::Start,
            OperationKind::ConversationAddMembers => ConversationRequestOp::Add,
            OperationKind::ConversationRemoveMembers => ConversationRequestOp::Remove,
            OperationKind::ConversationJoin => ConversationRequestOp::Join,
            OperationKind::ConversationQuit => ConversationRequestOp::Quit,
            OperationKind::ConversationUpdate => ConversationRequestOp::Update,
            OperationKind::ConversationQuery => ConversationRequestOp::Query,
            OperationKind::ConversationMemberCount => ConversationRequestOp::Count,
            OperationKind::ConversationMute => ConversationRequestOp::Mute,
            OperationKind::ConversationUnmute => ConversationRequestOp::Unmute,
            OperationKind::ClientOpen
            | OperationKind::ClientDisconnect
            | OperationKind::ClientOnlineQuery
            | OperationKind::ConversationSendMessage
            | OperationKind::ConversationMessageQuery
            | OperationKind::ConversationPatchTimeQuery => {
                return Err(ClientError::InvalidOperation(format!(
                    "{kind} is not a conversation command"
                )));
            }
        };
        let needs_id = !matches!(
            kind,
            OperationKind::ConversationCreation | OperationKind::ConversationQuery
        );
        if needs_id && conversation_id.as_deref().is_none_or(|cid| cid.trim().is_empty()) {
            return Err(ClientError::InvalidOperation(format!(
                "{kind} needs a conversation id"
            )));
        }

        let request_id = self.session.next_request_id();
        self.send_request(
            Operation::new(kind, self.peer_id(), conversation_id.clone(), request_id),
            OutboundPacket::Conv {
                peer_id: self.peer_id().to_string(),
                op,
                cid: conversation_id,
                members,
                attributes,
                i: request_id,
            },
        )
        .await
    }

    /// Queries history older than the given timestamp and message id.
    pub async fn query_messages(
        &self,
        conversation_id: &str,
        before_timestamp: Option<i64>,
        before_message_id: Option<String>,
        limit: Option<u32>,
    ) -> Result<i32, ClientError> {
        let request_id = self.session.next_request_id();
        self.send_request(
            Operation::new(
                OperationKind::ConversationMessageQuery,
                self.peer_id(),
                Some(conversation_id.to_string()),
                request_id,
            ),
            OutboundPacket::Logs {
                peer_id: self.peer_id().to_string(),
                cid: conversation_id.to_string(),
                t: before_timestamp,
                mid: before_message_id,
                limit: limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
                i: request_id,
            },
        )
        .await
    }

    /// Asks the server for the latest patch time newer than the local one.
    pub async fn query_patch_time(&self) -> Result<i32, ClientError> {
        let request_id = self.session.next_request_id();
        self.send_request(
            Operation::new(
                OperationKind::ConversationPatchTimeQuery,
                self.peer_id(),
                None,
                request_id,
            ),
            OutboundPacket::PatchQuery {
                peer_id: self.peer_id().to_string(),
                last_patch_time: self.session.last_patch_time(),
                i: request_id,
            },
        )
        .await
    }
}
