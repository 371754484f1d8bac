//! Connection status as reported by the gateway.
//!
//! Purely observational: the tracker logs what the gateway says and never
//! asks it to reconnect or re-pair.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use qrcode::render::unicode;
use qrcode::QrCode;
use tracing::{debug, error, info, warn};

use crate::platform::ConnectionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    PairingRequested,
    Ready,
    AuthFailed,
    Disconnected,
}

pub struct SessionTracker {
    state: SessionState,
    since: DateTime<Utc>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            since: Utc::now(),
        }
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a connection event and log it for the operator.
    pub fn handle(&mut self, event: &ConnectionEvent) -> SessionState {
        match event {
            ConnectionEvent::PairingChallenge(payload) => {
                if self.state == SessionState::PairingRequested {
                    debug!("Pairing QR code refreshed");
                }
                match render_qr(payload) {
                    Ok(qr) => println!("{qr}"),
                    Err(e) => error!("{:#}", e),
                }
                info!("📲 Escanea el QR en tu WhatsApp");
                self.transition(SessionState::PairingRequested);
            }
            ConnectionEvent::Ready => {
                self.transition(SessionState::Ready);
                info!("🤖 Bot conectado y listo!");
            }
            ConnectionEvent::AuthFailure(reason) => {
                self.transition(SessionState::AuthFailed);
                warn!(
                    "❌ Fallo de autenticación, vuelve a escanear el QR ({})",
                    reason
                );
            }
            ConnectionEvent::Disconnected(reason) => {
                if self.state != SessionState::Ready {
                    debug!("Disconnect reported while {:?}", self.state);
                }
                self.transition(SessionState::Disconnected);
                warn!("⚠️ Bot desconectado: {}", reason);
            }
        }
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        if next == self.state {
            return;
        }
        let now = Utc::now();
        debug!(
            "Session {:?} -> {:?} after {}s",
            self.state,
            next,
            (now - self.since).num_seconds()
        );
        self.state = next;
        self.since = now;
    }
}

/// Render a pairing payload as a QR code made of terminal block characters.
pub fn render_qr(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| anyhow!("Failed to encode pairing QR code: {:?}", e))?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}
