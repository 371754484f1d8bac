use anyhow::{Context, Result};
use tracing::info;

use crate::bot::Outcome;
use crate::platform::{jid_user, ChatClient, MembershipKind, MembershipNotification};

pub fn welcome_text(participant: &str, prefix: &str) -> String {
    format!(
        "👋 Bienvenido @{}!\nUsa *{}help* para ver comandos",
        jid_user(participant),
        prefix
    )
}

pub fn farewell_text(participant: &str) -> String {
    format!("😢 @{} salió del grupo", jid_user(participant))
}

/// Announce a join or leave in the chat it happened in, mentioning the member.
pub async fn announce(
    client: &dyn ChatClient,
    notification: &MembershipNotification,
    prefix: &str,
) -> Result<Outcome> {
    let text = match notification.kind {
        MembershipKind::Join => welcome_text(&notification.participant, prefix),
        MembershipKind::Leave => farewell_text(&notification.participant),
    };

    info!(
        "Announcing {:?} of {} in {}",
        notification.kind, notification.participant, notification.chat_id
    );

    client
        .send_message(
            &notification.chat_id,
            &text,
            std::slice::from_ref(&notification.participant),
        )
        .await
        .with_context(|| format!("Failed to announce in {}", notification.chat_id))?;

    Ok(Outcome::Announced)
}
