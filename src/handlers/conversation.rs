//! Conversation command results and history queries.

use crate::listener::SessionListener;
use crate::types::events::{ConversationCommandResult, QueryPayload, QueryResult};
use crate::types::message::Message;
use crate::types::operation::OperationKind;
use imcore::protocol::{ConversationFrame, ConversationOp, LogItem};
use log::{debug, warn};
use std::sync::Arc;

impl SessionListener {
    pub(crate) fn handle_conversation_command(
        &self,
        op: ConversationOp,
        request_id: Option<i32>,
        frame: ConversationFrame,
    ) {
        if op == ConversationOp::QueryResult {
            self.on_conversation_query_result(request_id, frame);
            return;
        }

        let answers_request = matches!(
            op,
            ConversationOp::Added
                | ConversationOp::Removed
                | ConversationOp::Updated
                | ConversationOp::MemberCountQueryResult
        );

        let resolved = request_id.and_then(|id| self.resolve_operation(id));
        let origin = resolved.as_ref().map(|op| op.kind);
        let frame_cid = frame.cid.clone().filter(|cid| !cid.is_empty());
        let conversation_id = if answers_request && resolved.is_some() {
            resolved.and_then(|op| op.conversation_id).or(frame_cid)
        } else {
            // Started carries the id of the conversation it just created.
            frame_cid.or_else(|| resolved.and_then(|op| op.conversation_id))
        };

        let Some(conversation_id) = conversation_id else {
            debug!(target: "Session/Conversation", "Dropping {op:?} without conversation id");
            return;
        };
        self.session
            .conversations()
            .get_or_create(&conversation_id)
            .on_command_result(ConversationCommandResult {
                conversation_id,
                origin,
                op,
                request_id,
                frame,
            });
    }

    fn on_conversation_query_result(&self, request_id: Option<i32>, frame: ConversationFrame) {
        let Some(request_id) = request_id else {
            warn!(target: "Session/Conversation", "Query result without request id");
            return;
        };
        let Some(op) = self.resolve_operation(request_id) else {
            return;
        };
        if op.kind != OperationKind::ConversationQuery {
            debug!(target: "Session/Conversation", "Ignoring query result for {}", op.kind);
            return;
        }
        let _ = self.events.query_result.send(Arc::new(QueryResult {
            peer_id: self.peer_id().to_string(),
            request_id,
            operation: op.kind,
            payload: QueryPayload::Conversations(frame.results.unwrap_or_default()),
        }));
    }

    pub(crate) fn handle_logs(&self, request_id: Option<i32>, logs: Vec<LogItem>) {
        let Some(request_id) = request_id else {
            warn!(target: "Session/History", "History result without request id");
            return;
        };
        let Some(op) = self.resolve_operation(request_id) else {
            return;
        };
        let Some(conversation_id) = op.conversation_id else {
            warn!(target: "Session/History", "History request {request_id} has no conversation");
            return;
        };

        let messages = logs
            .into_iter()
            .map(|item| {
                Message::new(&conversation_id, item.from, item.timestamp, item.ack_at)
                    .with_id(item.msg_id)
                    .with_content(item.data)
                    .with_updated_at(item.patch_timestamp)
            })
            .collect();
        self.session
            .conversations()
            .get_or_create(&conversation_id)
            .on_history(request_id, messages);
    }
}
