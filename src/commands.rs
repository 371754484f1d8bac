use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::bot::{Outcome, Rejection};
use crate::moderation;
use crate::platform::{ChatClient, InboundMessage};

/// Base URL an invite code is appended to
pub const INVITE_BASE_URL: &str = "https://chat.whatsapp.com/";

pub const PONG_REPLY: &str = "🏓 Pong";
pub const KICKED_REPLY: &str = "👢 Usuario eliminado";
pub const UNKNOWN_REPLY: &str = "❓ Comando no válido";

const RULES: &str = "📜 *REGLAS DEL GRUPO*\n\
                     1. Respeto\n\
                     2. No spam\n\
                     3. No links\n\
                     4. No bots";

/// A prefixed message split into its name and positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Lower-cased; empty when the message is only the prefix
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parse `body` as a command, or `None` when it does not start with `prefix`.
    pub fn parse(body: &str, prefix: &str) -> Option<Self> {
        let rest = body.strip_prefix(prefix)?;
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_lowercase();
        let args = tokens.map(str::to_string).collect();
        Some(Self { name, args })
    }
}

/// Menu listing every command, each with the configured prefix
pub fn help_text(prefix: &str) -> String {
    format!(
        "🤖 *MENÚ*\n\
         {prefix}ping\n\
         {prefix}help\n\
         {prefix}reglas\n\
         {prefix}link\n\
         {prefix}kick @user"
    )
}

pub fn rules_text() -> &'static str {
    RULES
}

/// Route a parsed command to its handler
pub async fn dispatch(
    client: &dyn ChatClient,
    message: &InboundMessage,
    command: &Command,
    prefix: &str,
) -> Result<Outcome> {
    debug!(
        "Dispatching command '{}' ({} args) from {}",
        command.name,
        command.args.len(),
        message.from
    );

    match command.name.as_str() {
        "ping" => reply(client, message, PONG_REPLY).await,
        "help" => reply(client, message, &help_text(prefix)).await,
        "reglas" => reply(client, message, rules_text()).await,
        "link" => link(client, message).await,
        "kick" => kick(client, message).await,
        _ => reply(client, message, UNKNOWN_REPLY).await,
    }
}

async fn reply(client: &dyn ChatClient, message: &InboundMessage, text: &str) -> Result<Outcome> {
    client
        .reply(message, text, &[])
        .await
        .context("Failed to send reply")?;
    Ok(Outcome::Replied)
}

/// Tell the user why the command was refused
async fn reject(
    client: &dyn ChatClient,
    message: &InboundMessage,
    rejection: Rejection,
) -> Result<Outcome> {
    client
        .reply(message, rejection.reply_text(), &[])
        .await
        .context("Failed to send rejection reply")?;
    Ok(Outcome::Rejected(rejection))
}

async fn link(client: &dyn ChatClient, message: &InboundMessage) -> Result<Outcome> {
    if !message.is_group() {
        return reject(client, message, Rejection::OnlyGroups).await;
    }

    let code = client
        .invite_code(&message.chat_id)
        .await
        .context("Failed to fetch invite code")?;

    match code {
        Some(code) if !code.is_empty() => {
            reply(client, message, &format!("🔗 {INVITE_BASE_URL}{code}")).await
        }
        _ => reject(client, message, Rejection::NoInvitePermission).await,
    }
}

async fn kick(client: &dyn ChatClient, message: &InboundMessage) -> Result<Outcome> {
    let chat = client
        .fetch_chat(&message.chat_id)
        .await
        .context("Failed to fetch chat")?;

    if !chat.is_group {
        return reject(client, message, Rejection::OnlyGroups).await;
    }

    let author = message.author.as_deref().unwrap_or_default();
    if !moderation::is_admin(&chat.participants, author) {
        return reject(client, message, Rejection::NotAdmin).await;
    }

    let Some(target) = message.mentioned_ids.first() else {
        return reject(client, message, Rejection::MissingMention).await;
    };

    info!("Removing {} from {} on behalf of {}", target, chat.id, author);
    client
        .remove_participants(&chat.id, std::slice::from_ref(target))
        .await
        .with_context(|| format!("Failed to remove {} from {}", target, chat.id))?;

    reply(client, message, KICKED_REPLY).await
}
