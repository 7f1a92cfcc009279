use serde::{Deserialize, Serialize};

pub type PeerId = i64;
pub type MessageId = i64;

/// Preview text shown for a chat that has no messages yet.
pub const NEW_CONVERSATION_PREVIEW: &str = "New conversation";

/// One entry of the conversation sidebar, as returned by `/messages/conversations`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: PeerId,
    pub name: String,
    #[serde(default)]
    pub pic: Option<String>,
    #[serde(default)]
    pub last_msg: String,
    /// Server formatted (`HH:MM`); empty when there is no activity yet.
    #[serde(default)]
    pub timestamp: String,
}

impl Conversation {
    /// Builds the client-side stand-in for a peer we have never talked to.
    pub fn placeholder(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            name: profile.display_name(),
            pic: profile.profile_pic.clone(),
            last_msg: NEW_CONVERSATION_PREVIEW.to_string(),
            timestamp: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub body: String,
    #[serde(default)]
    pub sender_id: Option<PeerId>,
    pub is_me: bool,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub timestamp: String,
}

impl Message {
    pub fn can_like(&self) -> bool {
        !self.is_me && !self.is_liked
    }
}

/// Public profile fields needed to open a chat with someone new.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: PeerId,
    pub firstname: String,
    pub lastname: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct SendMessageRequest<'a> {
    pub recipient_id: PeerId,
    pub body: &'a str,
}

#[derive(Debug, Serialize, Clone)]
pub struct SigninRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SigninResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub role: Option<String>,
}
