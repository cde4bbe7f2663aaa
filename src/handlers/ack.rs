use crate::listener::SessionListener;
use crate::pending::PendingMessage;
use crate::receipt_cache::ReceiptEntry;
use crate::types::operation::OperationKind;
use chrono::Utc;
use imcore::error::OperationError;
use imcore::protocol::AckFrame;
use log::warn;

impl SessionListener {
    /// Server ack for an outbound message, successful or not.
    pub(crate) async fn handle_ack(&self, request_id: Option<i32>, frame: AckFrame) {
        self.session.record_server_ack(Utc::now().timestamp());

        let Some(request_id) = request_id else {
            warn!(target: "Session/Ack", "Ack without request id for {}", self.peer_id());
            return;
        };
        let pending = self.session.pending().poll(request_id);
        if pending.is_none() {
            warn!(target: "Session/Ack", "No pending message for request id {request_id}");
        }

        if let Some(code) = frame.code {
            self.on_ack_error(request_id, code, frame, pending);
            return;
        }

        let op = self.resolve_operation(request_id);
        let conversation_id = pending
            .as_ref()
            .map(|m| m.conversation_id.clone())
            .or_else(|| op.and_then(|op| op.conversation_id))
            .filter(|cid| !cid.is_empty());
        let Some(conversation_id) = conversation_id else {
            warn!(target: "Session/Ack", "Ack {request_id} matches no conversation");
            return;
        };

        let message_id = frame.uid.unwrap_or_default();
        let timestamp = frame.t;
        self.session
            .conversations()
            .get_or_create(&conversation_id)
            .on_message_sent(request_id, message_id.clone(), timestamp);

        if let Some(pending) = pending.filter(|m| m.receipt_requested) {
            self.receipts.add(
                self.peer_id(),
                ReceiptEntry {
                    message_id,
                    timestamp,
                    content: pending.content,
                    receipt_requested: true,
                },
            );
        }
    }

    fn on_ack_error(
        &self,
        request_id: i32,
        code: i32,
        frame: AckFrame,
        pending: Option<PendingMessage>,
    ) {
        let error = OperationError::server(code, frame.app_code, frame.reason.as_deref());
        match self.resolve_operation(request_id) {
            Some(op) => {
                if op.kind == OperationKind::ClientOpen {
                    self.session.set_opened(false);
                    self.session.set_resuming(false);
                }
                let conversation_id = op
                    .conversation_id
                    .or_else(|| pending.map(|m| m.conversation_id));
                self.emit_failure(conversation_id, Some(request_id), op.kind, error);
            }
            None => {
                if let Some(pending) = pending {
                    self.emit_failure(
                        Some(pending.conversation_id),
                        Some(request_id),
                        OperationKind::ConversationSendMessage,
                        error,
                    );
                }
            }
        }
    }
}
