use anyhow::{Context, Result};
use tracing::info;

use crate::platform::{ChatClient, InboundMessage, Participant};

/// Any message containing this is treated as a group invite link
pub const GROUP_LINK_MARKER: &str = "https://chat.whatsapp.com";

pub const LINK_BLOCKED_REPLY: &str = "🚫 Links no permitidos";

/// Plain substring match; quoted or partial links are flagged too.
pub fn contains_group_link(body: &str) -> bool {
    body.contains(GROUP_LINK_MARKER)
}

/// True when `author` is one of the admins or super-admins in `participants`.
pub fn is_admin(participants: &[Participant], author: &str) -> bool {
    participants
        .iter()
        .filter(|p| p.is_admin || p.is_super_admin)
        .any(|p| p.id == author)
}

/// Delete a group message carrying an invite link and warn its author.
///
/// Returns `true` when the message was moderated away and must not be
/// dispatched as a command.
pub async fn enforce_link_filter(client: &dyn ChatClient, message: &InboundMessage) -> Result<bool> {
    if !message.is_group() || !contains_group_link(&message.body) {
        return Ok(false);
    }

    info!(
        "Deleting group link from {} in {}",
        message.author.as_deref().unwrap_or(&message.from),
        message.chat_id
    );

    client
        .delete_message(message, true)
        .await
        .context("Failed to delete message with group link")?;
    client
        .reply(message, LINK_BLOCKED_REPLY, &[])
        .await
        .context("Failed to send link warning")?;

    Ok(true)
}
