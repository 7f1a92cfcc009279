use crate::api::models::PeerId;

/// Notifications pushed from a messaging session to whatever renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConversationsUpdated,
    ActiveChatChanged(PeerId),
    MessagesUpdated(PeerId),
    ComposeCleared,
}
