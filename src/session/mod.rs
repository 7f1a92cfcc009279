pub mod poller;

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::api::events::SessionEvent;
use crate::api::models::{Conversation, Message, MessageId, PeerId};
use crate::api::{ApiError, MessagingApi};
use crate::app::SessionContext;
use crate::utils::deep_link_from_query;
use self::poller::Poller;

/// The chat shown in the message pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveChat {
    Existing(Conversation),
    /// Built from a profile; the peer has no conversation with us yet.
    Placeholder(Conversation),
}

impl ActiveChat {
    pub fn conversation(&self) -> &Conversation {
        match self {
            ActiveChat::Existing(c) | ActiveChat::Placeholder(c) => c,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.conversation().id
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ActiveChat::Placeholder(_))
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("No chat is open")]
    NoActiveChat,

    #[error("Message {0} is not in the open chat")]
    UnknownMessage(MessageId),

    #[error("Message {0} cannot be liked")]
    NotLikeable(MessageId),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub conversations: Vec<Conversation>,
    pub active_chat: Option<ActiveChat>,
    pub messages: Vec<Message>,
    pub compose_text: String,
    pub deep_link: Option<PeerId>,
}

#[derive(Default)]
struct SessionState {
    conversations: Vec<Conversation>,
    active_chat: Option<ActiveChat>,
    messages: Vec<Message>,
    compose_text: String,
    deep_link: Option<PeerId>,
    // bumped whenever the active peer changes
    epoch: u64,
    last_request: u64,
    applied_request: u64,
}

impl SessionState {
    fn active_peer(&self) -> Option<PeerId> {
        self.active_chat.as_ref().map(ActiveChat::peer_id)
    }
}

struct Shared {
    api: Arc<dyn MessagingApi>,
    state: Mutex<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Fetches the thread for `peer` and stores it unless the chat moved on
    /// or a newer response already landed.
    async fn refresh_messages(&self, peer: PeerId) {
        let (epoch, request) = {
            let mut st = self.lock();
            if st.active_peer() != Some(peer) {
                debug!("Skipping refresh for {}: chat is no longer open", peer);
                return;
            }
            st.last_request += 1;
            (st.epoch, st.last_request)
        };

        match self.api.messages(peer).await {
            Ok(messages) => {
                let applied = {
                    let mut st = self.lock();
                    if st.epoch != epoch || request <= st.applied_request {
                        false
                    } else {
                        st.messages = messages;
                        st.applied_request = request;
                        true
                    }
                };
                if applied {
                    self.emit(SessionEvent::MessagesUpdated(peer));
                } else {
                    debug!("Discarding stale messages response for {}", peer);
                }
            }
            Err(e) => warn!("Failed to load messages for {}: {}", peer, e),
        }
    }
}

/// State and behaviour behind the messaging screen.
pub struct MessagesSession {
    shared: Arc<Shared>,
    poller: Poller,
}

impl MessagesSession {
    pub fn new(ctx: &SessionContext) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            api: Arc::clone(&ctx.api),
            state: Mutex::new(SessionState::default()),
            events: tx,
        });
        let session = Self {
            shared,
            poller: Poller::new(ctx.poll_interval),
        };
        (session, rx)
    }

    /// Loads the conversation list. Nothing is selected automatically.
    pub async fn initialize(&mut self) {
        self.load_conversations().await;
    }

    pub async fn load_conversations(&mut self) {
        let list = match self.shared.api.conversations().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to load conversations: {}", e);
                return;
            }
        };
        {
            let mut st = self.shared.lock();
            let refreshed = st
                .active_peer()
                .and_then(|peer| list.iter().find(|c| c.id == peer).cloned());
            if let Some(conv) = refreshed {
                st.active_chat = Some(ActiveChat::Existing(conv));
            }
            st.conversations = list;
        }
        self.shared.emit(SessionEvent::ConversationsUpdated);
        self.resolve_deep_link().await;
    }

    /// Records the peer requested through navigation and opens a chat with it.
    pub async fn open_deep_link(&mut self, peer: Option<PeerId>) {
        self.shared.lock().deep_link = peer;
        self.resolve_deep_link().await;
    }

    /// Same as [`open_deep_link`](Self::open_deep_link), reading `uid` from a navigation target.
    pub async fn open_link(&mut self, target: &str) {
        self.open_deep_link(deep_link_from_query(target)).await;
    }

    async fn resolve_deep_link(&mut self) {
        let (peer, existing, showing_placeholder) = {
            let st = self.shared.lock();
            let Some(peer) = st.deep_link else {
                return;
            };
            let existing = st.conversations.iter().find(|c| c.id == peer).cloned();
            let showing = st
                .active_chat
                .as_ref()
                .is_some_and(|c| c.is_placeholder() && c.peer_id() == peer);
            (peer, existing, showing)
        };

        if let Some(conv) = existing {
            self.activate(ActiveChat::Existing(conv)).await;
            return;
        }
        if showing_placeholder {
            return;
        }

        match self.shared.api.profile(peer).await {
            Ok(profile) => {
                let placeholder = Conversation::placeholder(&profile);
                self.activate(ActiveChat::Placeholder(placeholder)).await;
            }
            Err(e) => warn!("Could not load user details for chat with {}: {}", peer, e),
        }
    }

    /// Opens an existing conversation picked by the user.
    pub async fn select(&mut self, conversation: Conversation) {
        self.shared.lock().deep_link = None;
        self.activate(ActiveChat::Existing(conversation)).await;
    }

    async fn activate(&mut self, chat: ActiveChat) {
        let peer = chat.peer_id();
        let switched = {
            let mut st = self.shared.lock();
            let previous = st.active_peer();
            st.active_chat = Some(chat);
            if previous == Some(peer) {
                false
            } else {
                st.epoch += 1;
                st.messages.clear();
                true
            }
        };
        if !switched {
            return;
        }

        info!("Opening chat with {}", peer);
        self.shared.emit(SessionEvent::ActiveChatChanged(peer));
        let shared = Arc::clone(&self.shared);
        self.poller.start(peer, move |peer| {
            let shared = Arc::clone(&shared);
            async move { shared.refresh_messages(peer).await }
        });
        self.shared.refresh_messages(peer).await;
    }

    pub fn set_compose_text(&self, text: impl Into<String>) {
        self.shared.lock().compose_text = text.into();
    }

    /// Sends whatever is in the compose box.
    pub async fn submit(&mut self) -> Result<(), SessionError> {
        let text = self.shared.lock().compose_text.clone();
        self.send(&text).await
    }

    pub async fn send(&mut self, text: &str) -> Result<(), SessionError> {
        let body = text.trim();
        if body.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let peer = self.active_peer().ok_or(SessionError::NoActiveChat)?;

        self.shared.api.send_message(peer, body).await?;

        self.shared.lock().compose_text.clear();
        self.shared.emit(SessionEvent::ComposeCleared);
        self.shared.refresh_messages(peer).await;
        self.load_conversations().await;
        Ok(())
    }

    /// Likes a message from the peer. Own messages and already liked ones are refused
    /// without contacting the server, which would toggle the like back off.
    pub async fn like(&mut self, id: MessageId) -> Result<(), SessionError> {
        let peer = {
            let st = self.shared.lock();
            let peer = st.active_peer().ok_or(SessionError::NoActiveChat)?;
            let message = st
                .messages
                .iter()
                .find(|m| m.id == id)
                .ok_or(SessionError::UnknownMessage(id))?;
            if !message.can_like() {
                return Err(SessionError::NotLikeable(id));
            }
            peer
        };

        if let Err(e) = self.shared.api.like_message(id).await {
            warn!("Failed to like message {}: {}", id, e);
            return Err(e.into());
        }
        self.shared.refresh_messages(peer).await;
        Ok(())
    }

    /// Tears the screen down: no further polling.
    pub fn close(&mut self) {
        self.poller.stop();
    }

    pub fn active_peer(&self) -> Option<PeerId> {
        self.shared.lock().active_peer()
    }

    pub fn polling_peer(&self) -> Option<PeerId> {
        self.poller.peer()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.shared.lock();
        SessionSnapshot {
            conversations: st.conversations.clone(),
            active_chat: st.active_chat.clone(),
            messages: st.messages.clone(),
            compose_text: st.compose_text.clone(),
            deep_link: st.deep_link,
        }
    }
}
