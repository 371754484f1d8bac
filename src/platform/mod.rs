pub mod evolution;
pub mod webhook;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use async_trait::async_trait;

/// Suffix of every group chat jid
const GROUP_SUFFIX: &str = "@g.us";

pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

/// Local part of a jid (`5215550001111@s.whatsapp.net` -> `5215550001111`),
/// which is what a chat mention shows after the `@`.
pub fn jid_user(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

/// A message received from the gateway
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Gateway message id, needed to quote or delete it
    pub id: String,
    pub body: String,
    /// Jid of the chat the message arrived on
    pub from: String,
    /// Participant who wrote a group message; `None` in direct chats
    pub author: Option<String>,
    pub chat_id: String,
    pub mentioned_ids: Vec<String>,
    pub from_me: bool,
}

impl InboundMessage {
    pub fn is_group(&self) -> bool {
        is_group_jid(&self.chat_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

/// Snapshot of a chat, valid for one handler invocation
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub is_group: bool,
    pub participants: Vec<Participant>,
}

impl Chat {
    pub fn direct(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_group: false,
            participants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipKind {
    Join,
    Leave,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipNotification {
    pub chat_id: String,
    pub participant: String,
    pub kind: MembershipKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Pairing payload to be rendered as a QR code
    PairingChallenge(String),
    Ready,
    AuthFailure(String),
    Disconnected(String),
}

/// Everything the gateway can tell the bot about
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connection(ConnectionEvent),
    Message(InboundMessage),
    Membership(MembershipNotification),
}

/// Actions the bot can request from the messaging gateway.
///
/// Every call is a single request with no retry; a failure is returned to the
/// caller and ends that handler invocation.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Reply to `message` in its chat, quoting it
    async fn reply(&self, message: &InboundMessage, text: &str, mentions: &[String])
        -> Result<()>;

    async fn send_message(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()>;

    /// Delete `message` for every member (`for_everyone = true`) or only on the
    /// bot's own device. Implementations may refuse the variant their transport
    /// lacks with an error; moderation always deletes for everyone.
    async fn delete_message(&self, message: &InboundMessage, for_everyone: bool) -> Result<()>;

    /// Chat metadata, including participants for groups
    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat>;

    /// Group invite code; `None` when the bot is not allowed to see it
    async fn invite_code(&self, chat_id: &str) -> Result<Option<String>>;

    async fn remove_participants(&self, chat_id: &str, participants: &[String]) -> Result<()>;
}
