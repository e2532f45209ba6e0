//! Client-Konfiguration
//!
//! Zentrale Einstellungen für Signaling, Verhandlung und Streaming.
//! Defaults entsprechen dem lokalen Entwicklungs-Backend.

use serde::Deserialize;
use std::time::Duration;
use webrtc::ice_transport::ice_server::RTCIceServer;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Basis-URL des Backends
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Poll-Intervall für eingehende Signaling-Nachrichten
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Intervall des Health-Checks für hängende Verhandlungen
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 5000;

/// Label des Data Channels
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "chat";

/// Standard-Umgebung für den Realtime-Chat
pub const DEFAULT_ENVIRONMENT: &str = "Everyday Conversations";

// ============================================================================
// CLIENT CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub health_check_interval_ms: u64,
    /// STUN/TURN URLs, ohne Credentials
    pub ice_urls: Vec<String>,
    pub data_channel_label: String,
    pub environment: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            ice_urls: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
            ],
            data_channel_label: DEFAULT_DATA_CHANNEL_LABEL.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Lädt die Defaults und überschreibt sie mit Umgebungsvariablen
    ///
    /// - `CONVERSE_BASE_URL`
    /// - `CONVERSE_POLL_MS`
    /// - `CONVERSE_HEALTH_MS`
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("CONVERSE_BASE_URL") {
            self.base_url = url.trim_end_matches('/').to_string();
        }

        for (key, slot) in [
            ("CONVERSE_POLL_MS", &mut self.poll_interval_ms),
            ("CONVERSE_HEALTH_MS", &mut self.health_check_interval_ms),
        ] {
            if let Some(raw) = lookup(key) {
                match raw.parse::<u64>() {
                    Ok(ms) if ms > 0 => *slot = ms,
                    _ => tracing::warn!("Ignoring invalid {}={:?}", key, raw),
                }
            }
        }

        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// ICE-Server für die RTCConfiguration
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        if self.ice_urls.is_empty() {
            return Vec::new();
        }
        vec![RTCIceServer {
            urls: self.ice_urls.clone(),
            ..Default::default()
        }]
    }
}
