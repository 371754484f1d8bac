//! Receiver for the events an Evolution API gateway posts to the bot.

use anyhow::{Context, Result};
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ClientEvent, ConnectionEvent, InboundMessage, MembershipKind, MembershipNotification};

/// Baileys disconnect status meaning the session was logged out
const LOGGED_OUT_STATUS: i64 = 401;

#[derive(Clone)]
pub struct WebhookState {
    instance_name: String,
    /// Expected `apikey` of every payload; empty refuses everything
    token: String,
    events: mpsc::Sender<ClientEvent>,
}

impl WebhookState {
    pub fn new(instance_name: &str, token: &str, events: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            instance_name: instance_name.to_string(),
            token: token.to_string(),
            events,
        }
    }

    fn authorized(&self, payload: &Value) -> bool {
        !self.token.is_empty() && payload["apikey"].as_str() == Some(self.token.as_str())
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(receive))
        .with_state(state)
}

pub async fn serve(bind: &str, state: WebhookState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind webhook receiver to {bind}"))?;

    info!("Webhook receiver listening on {}", bind);

    axum::serve(listener, router(state))
        .await
        .context("Webhook server error")?;

    Ok(())
}

/// Always answers 200 so the gateway never redelivers; bad or unauthenticated
/// payloads are dropped.
async fn receive(State(state): State<WebhookState>, body: Bytes) -> StatusCode {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Ignoring malformed webhook payload: {}", e);
            return StatusCode::OK;
        }
    };

    if !state.authorized(&payload) {
        warn!(
            "Dropping webhook '{}' without a valid apikey",
            payload["event"].as_str().unwrap_or_default()
        );
        return StatusCode::OK;
    }

    if let Some(instance) = payload["instance"].as_str() {
        if instance != state.instance_name {
            debug!("Ignoring webhook for instance '{}'", instance);
            return StatusCode::OK;
        }
    }

    for event in translate(&payload) {
        if state.events.send(event).await.is_err() {
            warn!("Event loop closed, dropping webhook event");
            break;
        }
    }

    StatusCode::OK
}

/// Map one gateway payload to zero or more client events.
pub fn translate(payload: &Value) -> Vec<ClientEvent> {
    let event = payload["event"].as_str().unwrap_or_default();
    let data = &payload["data"];

    match event {
        "messages.upsert" => records(data)
            .filter_map(parse_message)
            .map(ClientEvent::Message)
            .collect(),
        "group-participants.update" => parse_membership(data)
            .into_iter()
            .map(ClientEvent::Membership)
            .collect(),
        "qrcode.updated" => data["qrcode"]["code"]
            .as_str()
            .filter(|code| !code.is_empty())
            .map(|code| {
                ClientEvent::Connection(ConnectionEvent::PairingChallenge(code.to_string()))
            })
            .into_iter()
            .collect(),
        "connection.update" => parse_connection(data)
            .map(ClientEvent::Connection)
            .into_iter()
            .collect(),
        "logout.instance" => vec![ClientEvent::Connection(ConnectionEvent::AuthFailure(
            "session logged out".to_string(),
        ))],
        other => {
            debug!("Ignoring webhook event '{}'", other);
            Vec::new()
        }
    }
}

/// `data` is a single record or an array of them depending on gateway version
fn records(data: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match data.as_array() {
        Some(items) => Box::new(items.iter()),
        None => Box::new(std::iter::once(data)),
    }
}

fn parse_message(record: &Value) -> Option<InboundMessage> {
    let key = &record["key"];
    let chat_id = key["remoteJid"].as_str()?.to_string();
    let id = key["id"].as_str()?.to_string();

    let message = &record["message"];
    let extended = &message["extendedTextMessage"];
    let body = message["conversation"]
        .as_str()
        .or_else(|| extended["text"].as_str())?
        .to_string();

    let mentioned = extended["contextInfo"]["mentionedJid"]
        .as_array()
        .or_else(|| record["contextInfo"]["mentionedJid"].as_array());
    let mentioned_ids = mentioned
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let author = key["participant"]
        .as_str()
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    Some(InboundMessage {
        id,
        body,
        from: chat_id.clone(),
        author,
        chat_id,
        mentioned_ids,
        from_me: key["fromMe"].as_bool().unwrap_or(false),
    })
}

fn parse_membership(data: &Value) -> Vec<MembershipNotification> {
    let kind = match data["action"].as_str() {
        Some("add") => MembershipKind::Join,
        Some("remove") => MembershipKind::Leave,
        _ => return Vec::new(),
    };
    let Some(chat_id) = data["id"].as_str() else {
        return Vec::new();
    };

    data["participants"]
        .as_array()
        .map(|participants| {
            participants
                .iter()
                // Newer gateways send objects instead of bare jids
                .filter_map(|p| p.as_str().or_else(|| p["id"].as_str()))
                .map(|participant| MembershipNotification {
                    chat_id: chat_id.to_string(),
                    participant: participant.to_string(),
                    kind,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_connection(data: &Value) -> Option<ConnectionEvent> {
    match data["state"].as_str()? {
        "open" => Some(ConnectionEvent::Ready),
        "close" => {
            let status = data["statusReason"].as_i64();
            if status == Some(LOGGED_OUT_STATUS) {
                Some(ConnectionEvent::AuthFailure(format!(
                    "status {LOGGED_OUT_STATUS}"
                )))
            } else {
                let reason = status
                    .map(|s| format!("status {s}"))
                    .unwrap_or_else(|| "unknown".to_string());
                Some(ConnectionEvent::Disconnected(reason))
            }
        }
        _ => None,
    }
}
