//! `ChatClient` backed by an Evolution API gateway.
//!
//! Evolution API runs the WhatsApp Web multi-device session (pairing, session
//! files, reconnects) and exposes it as REST endpoints plus webhooks. Actions
//! go out through [`EvolutionClient`]; events come back through
//! [`super::webhook`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{is_group_jid, Chat, ChatClient, ClientEvent, ConnectionEvent, InboundMessage, Participant};
use crate::config::EvolutionConfig;

/// Webhook events the gateway is asked to deliver
const WEBHOOK_EVENTS: [&str; 5] = [
    "MESSAGES_UPSERT",
    "GROUP_PARTICIPANTS_UPDATE",
    "QRCODE_UPDATED",
    "CONNECTION_UPDATE",
    "LOGOUT_INSTANCE",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageKey<'a> {
    id: &'a str,
    remote_jid: &'a str,
    from_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    participant: Option<&'a str>,
}

impl<'a> MessageKey<'a> {
    fn of(message: &'a InboundMessage) -> Self {
        Self {
            id: &message.id,
            remote_jid: &message.chat_id,
            from_me: message.from_me,
            participant: message.author.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Quoted<'a> {
    key: MessageKey<'a>,
    message: QuotedBody<'a>,
}

#[derive(Debug, Serialize)]
struct QuotedBody<'a> {
    conversation: &'a str,
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "no_mentions")]
    mentioned: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    quoted: Option<Quoted<'a>>,
}

fn no_mentions(mentions: &&[String]) -> bool {
    mentions.is_empty()
}

#[derive(Debug, Serialize)]
struct UpdateParticipantRequest<'a> {
    action: &'a str,
    participants: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GroupInfo {
    id: String,
    #[serde(default)]
    participants: Vec<RawParticipant>,
}

#[derive(Debug, Deserialize)]
struct RawParticipant {
    id: String,
    /// `"admin"`, `"superadmin"` or null
    #[serde(default)]
    admin: Option<String>,
}

impl From<RawParticipant> for Participant {
    fn from(raw: RawParticipant) -> Self {
        let role = raw.admin.as_deref().unwrap_or_default();
        Participant {
            id: raw.id,
            is_admin: role == "admin",
            is_super_admin: role == "superadmin",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteCodeResponse {
    #[serde(default)]
    invite_code: Option<String>,
}

pub struct EvolutionClient {
    client: reqwest::Client,
    config: EvolutionConfig,
}

impl EvolutionClient {
    pub fn new(config: EvolutionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// `{api_url}/{path}/{instance}`
    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path,
            self.config.instance_name
        )
    }

    /// Webhook registration shared by instance create and `webhook/set`
    fn webhook_settings(&self) -> Value {
        serde_json::json!({
            "enabled": true,
            "url": self.config.webhook_url,
            "byEvents": false,
            "base64": false,
            "events": WEBHOOK_EVENTS,
        })
    }

    /// Create the gateway instance (or reconnect an existing one) and report
    /// the resulting pairing challenge or ready state as events.
    pub async fn bootstrap(&self, events: &mpsc::Sender<ClientEvent>) -> Result<()> {
        let qr = match self.create_instance().await? {
            Some(created) => qr_payload(&created),
            None => {
                // An existing instance may point at an old URL or event set
                self.set_webhook().await?;
                self.connect_instance().await?
            }
        };

        if let Some(code) = qr {
            events
                .send(ClientEvent::Connection(ConnectionEvent::PairingChallenge(code)))
                .await
                .context("Event loop closed during bootstrap")?;
        }

        if self.connection_state().await? == "open" {
            events
                .send(ClientEvent::Connection(ConnectionEvent::Ready))
                .await
                .context("Event loop closed during bootstrap")?;
        }

        Ok(())
    }

    /// `Ok(None)` when the instance already exists
    async fn create_instance(&self) -> Result<Option<Value>> {
        let url = format!(
            "{}/instance/create",
            self.config.api_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "instanceName": self.config.instance_name,
            "integration": "WHATSAPP-BAILEYS",
            "qrcode": true,
            "token": self.config.webhook_token(),
            "webhook": self.webhook_settings(),
        });

        debug!("Creating Evolution instance: {}", url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send instance create request")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read instance create response")?;

        if !status.is_success() {
            if text.contains("already") || text.contains("exists") {
                info!(
                    "Evolution instance '{}' already exists, connecting",
                    self.config.instance_name
                );
                return Ok(None);
            }
            anyhow::bail!("Evolution API error creating instance ({}): {}", status, text);
        }

        let value: Value =
            serde_json::from_str(&text).context("Failed to parse instance create response")?;
        info!("Created Evolution instance '{}'", self.config.instance_name);
        Ok(Some(value))
    }

    async fn set_webhook(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url("webhook/set"))
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({ "webhook": self.webhook_settings() }))
            .send()
            .await
            .context("Failed to send webhook set request")?;
        check(response, "registering webhook").await?;
        info!("Registered webhook {}", self.config.webhook_url);
        Ok(())
    }

    async fn connect_instance(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url("instance/connect"))
            .header("apikey", &self.config.api_key)
            .send()
            .await
            .context("Failed to send instance connect request")?;
        let value: Value = check(response, "connecting instance")
            .await?
            .json()
            .await
            .context("Failed to parse instance connect response")?;
        Ok(qr_payload(&value))
    }

    async fn connection_state(&self) -> Result<String> {
        let response = self
            .client
            .get(self.url("instance/connectionState"))
            .header("apikey", &self.config.api_key)
            .send()
            .await
            .context("Failed to send connection state request")?;
        let value: Value = check(response, "reading connection state")
            .await?
            .json()
            .await
            .context("Failed to parse connection state response")?;
        Ok(value["instance"]["state"]
            .as_str()
            .or_else(|| value["state"].as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn send_text(&self, request: &SendTextRequest<'_>) -> Result<()> {
        let response = self
            .client
            .post(self.url("message/sendText"))
            .header("apikey", &self.config.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send message request")?;
        check(response, "sending text").await?;
        Ok(())
    }
}

/// Turn a non-success response into an error carrying the response body
async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Evolution API error {} ({}): {}", action, status, body);
    }
    Ok(response)
}

/// Raw QR payload from a create (`qrcode.code`) or connect (`code`) response
fn qr_payload(value: &Value) -> Option<String> {
    value["qrcode"]["code"]
        .as_str()
        .or_else(|| value["code"].as_str())
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ChatClient for EvolutionClient {
    async fn reply(
        &self,
        message: &InboundMessage,
        text: &str,
        mentions: &[String],
    ) -> Result<()> {
        self.send_text(&SendTextRequest {
            number: &message.chat_id,
            text,
            mentioned: mentions,
            quoted: Some(Quoted {
                key: MessageKey::of(message),
                message: QuotedBody {
                    conversation: &message.body,
                },
            }),
        })
        .await
    }

    async fn send_message(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()> {
        self.send_text(&SendTextRequest {
            number: chat_id,
            text,
            mentioned: mentions,
            quoted: None,
        })
        .await
    }

    /// Only `for_everyone = true` is supported; the gateway has no delete-for-me.
    async fn delete_message(&self, message: &InboundMessage, for_everyone: bool) -> Result<()> {
        if !for_everyone {
            anyhow::bail!("Evolution API can only delete messages for everyone");
        }
        let response = self
            .client
            .delete(self.url("chat/deleteMessageForEveryone"))
            .header("apikey", &self.config.api_key)
            .json(&MessageKey::of(message))
            .send()
            .await
            .context("Failed to send delete request")?;
        check(response, "deleting message").await?;
        Ok(())
    }

    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat> {
        if !is_group_jid(chat_id) {
            return Ok(Chat::direct(chat_id));
        }

        let response = self
            .client
            .get(self.url("group/findGroupInfos"))
            .header("apikey", &self.config.api_key)
            .query(&[("groupJid", chat_id)])
            .send()
            .await
            .context("Failed to send group info request")?;
        let info: GroupInfo = check(response, "fetching group info")
            .await?
            .json()
            .await
            .context("Failed to parse group info")?;

        Ok(group_chat(info))
    }

    async fn invite_code(&self, chat_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url("group/inviteCode"))
            .header("apikey", &self.config.api_key)
            .query(&[("groupJid", chat_id)])
            .send()
            .await
            .context("Failed to send invite code request")?;

        // The gateway refuses with a 4xx when the bot is not a group admin
        if response.status().is_client_error() {
            warn!(
                "Invite code for {} not available ({})",
                chat_id,
                response.status()
            );
            return Ok(None);
        }

        let body: InviteCodeResponse = check(response, "fetching invite code")
            .await?
            .json()
            .await
            .context("Failed to parse invite code response")?;
        Ok(body.invite_code.filter(|code| !code.is_empty()))
    }

    async fn remove_participants(&self, chat_id: &str, participants: &[String]) -> Result<()> {
        let response = self
            .client
            .post(self.url("group/updateParticipant"))
            .header("apikey", &self.config.api_key)
            .query(&[("groupJid", chat_id)])
            .json(&UpdateParticipantRequest {
                action: "remove",
                participants,
            })
            .send()
            .await
            .context("Failed to send participant update request")?;
        check(response, "removing participants").await?;
        Ok(())
    }
}

fn group_chat(info: GroupInfo) -> Chat {
    Chat {
        is_group: is_group_jid(&info.id),
        id: info.id,
        participants: info.participants.into_iter().map(Participant::from).collect(),
    }
}
