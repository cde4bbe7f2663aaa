use crate::listener::SessionListener;
use crate::types::message::{Message, MessageStatus};
use imcore::protocol::ReceiptFrame;
use log::debug;

impl SessionListener {
    pub(crate) fn handle_delivery_receipt(&self, frame: ReceiptFrame) {
        let (Some(timestamp), Some(conversation_id)) =
            (frame.t, frame.cid.filter(|cid| !cid.trim().is_empty()))
        else {
            return;
        };
        let conversation = self.session.conversations().get_or_create(&conversation_id);
        conversation.on_delivered_at(timestamp);

        let Some(entry) = self.receipts.take(self.peer_id(), &frame.id) else {
            debug!(target: "Session/Receipt", "No cached message {} for receipt", frame.id);
            return;
        };
        let message = Message::new(&conversation_id, self.peer_id(), entry.timestamp, timestamp)
            .with_id(entry.message_id)
            .with_content(entry.content)
            .with_status(MessageStatus::Receipt);
        conversation.on_message_receipt(message);
    }

    pub(crate) fn handle_read_receipt(&self, frame: ReceiptFrame) {
        let (Some(_), Some(conversation_id)) = (frame.read, frame.cid) else {
            return;
        };
        self.session
            .conversations()
            .get_or_create(&conversation_id)
            .on_read_at(frame.t.unwrap_or_default());
    }
}
