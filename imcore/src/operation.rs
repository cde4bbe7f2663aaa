use serde::{Deserialize, Serialize};

/// Every request kind a client can have in flight.
///
/// Frame handlers match on this exhaustively, so adding a kind forces every
/// resolution site to decide what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ClientOpen,
    ClientDisconnect,
    ClientOnlineQuery,
    ConversationCreation,
    ConversationAddMembers,
    ConversationRemoveMembers,
    ConversationJoin,
    ConversationQuit,
    ConversationUpdate,
    ConversationQuery,
    ConversationMemberCount,
    ConversationMute,
    ConversationUnmute,
    ConversationSendMessage,
    ConversationMessageQuery,
    ConversationPatchTimeQuery,
}

impl OperationKind {
    /// True for kinds scoped to a conversation rather than to the session.
    pub fn is_conversation_scoped(&self) -> bool {
        !matches!(
            self,
            Self::ClientOpen
                | Self::ClientDisconnect
                | Self::ClientOnlineQuery
                | Self::ConversationPatchTimeQuery
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientOpen => "client_open",
            Self::ClientDisconnect => "client_disconnect",
            Self::ClientOnlineQuery => "client_online_query",
            Self::ConversationCreation => "conversation_creation",
            Self::ConversationAddMembers => "conversation_add_members",
            Self::ConversationRemoveMembers => "conversation_remove_members",
            Self::ConversationJoin => "conversation_join",
            Self::ConversationQuit => "conversation_quit",
            Self::ConversationUpdate => "conversation_update",
            Self::ConversationQuery => "conversation_query",
            Self::ConversationMemberCount => "conversation_member_count",
            Self::ConversationMute => "conversation_mute",
            Self::ConversationUnmute => "conversation_unmute",
            Self::ConversationSendMessage => "conversation_send_message",
            Self::ConversationMessageQuery => "conversation_message_query",
            Self::ConversationPatchTimeQuery => "conversation_patch_time_query",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-issued request awaiting its server-correlated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub session_id: String,
    pub conversation_id: Option<String>,
    pub request_id: i32,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        session_id: impl Into<String>,
        conversation_id: Option<String>,
        request_id: i32,
    ) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            conversation_id,
            request_id,
        }
    }
}
