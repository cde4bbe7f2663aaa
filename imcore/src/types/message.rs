use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageStatus {
    #[default]
    None,
    Sending,
    Sent,
    /// The peer's device confirmed delivery.
    Receipt,
    Failed,
}

/// A chat message as handed to conversation observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    pub conversation_id: String,
    pub from: String,
    pub message_id: Option<String>,
    pub content: String,
    pub timestamp: i64,
    /// When the delivery receipt arrived, or -1 while unknown.
    pub receipt_timestamp: i64,
    pub updated_at: i64,
    pub status: MessageStatus,
}

impl Message {
    pub fn new(
        conversation_id: impl Into<String>,
        from: impl Into<String>,
        timestamp: i64,
        receipt_timestamp: i64,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            from: from.into(),
            timestamp,
            receipt_timestamp,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }
}
