use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{is_group_jid, Chat, ChatClient, InboundMessage, Participant};

/// One recorded call against the fake client
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Reply {
        message_id: String,
        text: String,
        mentions: Vec<String>,
    },
    Send {
        chat_id: String,
        text: String,
        mentions: Vec<String>,
    },
    Delete {
        message_id: String,
        for_everyone: bool,
    },
    FetchChat(String),
    InviteCode(String),
    Remove {
        chat_id: String,
        participants: Vec<String>,
    },
}

/// In-memory `ChatClient` that records every call
pub struct FakeClient {
    pub participants: Vec<Participant>,
    pub invite_code: Option<String>,
    /// Makes every action fail, to exercise the error path
    pub fail: bool,
    actions: Mutex<Vec<Action>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
            invite_code: None,
            fail: false,
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_admin(mut self, id: &str) -> Self {
        self.participants.push(Participant {
            id: id.to_string(),
            is_admin: true,
            is_super_admin: false,
        });
        self
    }

    pub fn with_member(mut self, id: &str) -> Self {
        self.participants.push(Participant {
            id: id.to_string(),
            is_admin: false,
            is_super_admin: false,
        });
        self
    }

    pub fn with_invite_code(mut self, code: &str) -> Self {
        self.invite_code = Some(code.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Reply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: Action) -> Result<()> {
        self.actions.lock().unwrap().push(action);
        if self.fail {
            anyhow::bail!("gateway unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn reply(
        &self,
        message: &InboundMessage,
        text: &str,
        mentions: &[String],
    ) -> Result<()> {
        self.record(Action::Reply {
            message_id: message.id.clone(),
            text: text.to_string(),
            mentions: mentions.to_vec(),
        })
    }

    async fn send_message(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()> {
        self.record(Action::Send {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            mentions: mentions.to_vec(),
        })
    }

    async fn delete_message(&self, message: &InboundMessage, for_everyone: bool) -> Result<()> {
        self.record(Action::Delete {
            message_id: message.id.clone(),
            for_everyone,
        })
    }

    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat> {
        self.record(Action::FetchChat(chat_id.to_string()))?;
        if !is_group_jid(chat_id) {
            return Ok(Chat::direct(chat_id));
        }
        Ok(Chat {
            id: chat_id.to_string(),
            is_group: true,
            participants: self.participants.clone(),
        })
    }

    async fn invite_code(&self, chat_id: &str) -> Result<Option<String>> {
        self.record(Action::InviteCode(chat_id.to_string()))?;
        Ok(self.invite_code.clone())
    }

    async fn remove_participants(&self, chat_id: &str, participants: &[String]) -> Result<()> {
        self.record(Action::Remove {
            chat_id: chat_id.to_string(),
            participants: participants.to_vec(),
        })
    }
}

pub const GROUP: &str = "120363040000000000@g.us";
pub const ADMIN: &str = "5215550000001@s.whatsapp.net";
pub const MEMBER: &str = "5215550000002@s.whatsapp.net";

/// A group message written by `author`
pub fn group_message(body: &str, author: &str) -> InboundMessage {
    InboundMessage {
        id: "MSG1".to_string(),
        body: body.to_string(),
        from: GROUP.to_string(),
        author: Some(author.to_string()),
        chat_id: GROUP.to_string(),
        mentioned_ids: Vec::new(),
        from_me: false,
    }
}

/// A direct-chat message from `sender`
pub fn direct_message(body: &str, sender: &str) -> InboundMessage {
    InboundMessage {
        id: "MSG2".to_string(),
        body: body.to_string(),
        from: sender.to_string(),
        author: None,
        chat_id: sender.to_string(),
        mentioned_ids: Vec::new(),
        from_me: false,
    }
}
