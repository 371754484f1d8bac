use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::commands::{self, Command};
use crate::config::Config;
use crate::lifecycle::SessionTracker;
use crate::membership;
use crate::moderation;
use crate::platform::{ChatClient, ClientEvent, InboundMessage, MembershipNotification};

/// What a handler did with one event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Sent by the bot itself, or not a command
    Ignored,
    /// Removed by the link filter
    Moderated,
    Replied,
    Announced,
    /// A command precondition failed; the user was told why
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    OnlyGroups,
    NoInvitePermission,
    NotAdmin,
    MissingMention,
}

impl Rejection {
    pub fn reply_text(self) -> &'static str {
        match self {
            Rejection::OnlyGroups => "❌ Solo grupos",
            Rejection::NoInvitePermission => "❌ No tengo permiso para ver el link",
            Rejection::NotAdmin => "❌ Solo admins pueden usar este comando",
            Rejection::MissingMention => "❌ Menciona a alguien",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OnlyGroups => write!(f, "only available in groups"),
            Rejection::NoInvitePermission => write!(f, "invite code not available"),
            Rejection::NotAdmin => write!(f, "author is not an admin"),
            Rejection::MissingMention => write!(f, "no participant mentioned"),
        }
    }
}

/// Shared, read-only application state
pub struct AppState {
    pub config: Config,
    pub client: Arc<dyn ChatClient>,
}

impl AppState {
    pub fn new(config: Config, client: Arc<dyn ChatClient>) -> Self {
        Self { config, client }
    }

    fn prefix(&self) -> &str {
        &self.config.bot.prefix
    }
}

/// Drive the bot until the gateway side of the event channel closes.
///
/// Connection events are handled inline so the session tracker needs no
/// lock. Messages and membership changes each get their own task, so a slow
/// gateway call only stalls the event that made it.
pub async fn run(state: Arc<AppState>, mut events: mpsc::Receiver<ClientEvent>) -> Result<()> {
    let mut session = SessionTracker::new();

    info!("Event loop started");

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Connection(connection) => {
                session.handle(&connection);
            }
            ClientEvent::Message(message) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let result = handle_message(&state, &message).await;
                    supervise("message", &message.chat_id, result);
                });
            }
            ClientEvent::Membership(notification) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let result = handle_membership(&state, &notification).await;
                    supervise("membership", &notification.chat_id, result);
                });
            }
        }
    }

    info!("Event channel closed, stopping");
    Ok(())
}

/// Log a handler's outcome; the only place handler errors end up.
fn supervise(kind: &str, chat_id: &str, result: Result<Outcome>) {
    match result {
        Ok(Outcome::Rejected(rejection)) => {
            info!("{} in {} rejected: {}", kind, chat_id, rejection);
        }
        Ok(outcome) => {
            debug!("{} in {} handled: {:?}", kind, chat_id, outcome);
        }
        Err(e) => {
            error!("ERROR handling {} in {}: {:#}", kind, chat_id, e);
        }
    }
}

/// Moderation first, then command dispatch.
pub async fn handle_message(state: &AppState, message: &InboundMessage) -> Result<Outcome> {
    if message.from_me {
        return Ok(Outcome::Ignored);
    }

    let client = state.client.as_ref();

    if moderation::enforce_link_filter(client, message)
        .await
        .context("Link filter failed")?
    {
        return Ok(Outcome::Moderated);
    }

    let Some(command) = Command::parse(&message.body, state.prefix()) else {
        return Ok(Outcome::Ignored);
    };

    info!(
        "Command '{}' from {} in {}",
        command.name,
        message.author.as_deref().unwrap_or(&message.from),
        message.chat_id
    );

    commands::dispatch(client, message, &command, state.prefix()).await
}

pub async fn handle_membership(
    state: &AppState,
    notification: &MembershipNotification,
) -> Result<Outcome> {
    membership::announce(state.client.as_ref(), notification, state.prefix()).await
}
