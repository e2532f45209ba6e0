//! HTTP Client für den Signaling-Koordinator
//!
//! Verwaltet die Request/Response-Kommunikation mit `/webrtc/*`:
//! - Signaling-Nachrichten pushen
//! - Ausstehende Nachrichten einer Konversation pullen
//! - Session-Token anfordern und Status abfragen
//!
//! Der Client kennt keine Peer-Connection-Semantik.

use super::messages::*;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("Invalid coordinator URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Signaling request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Coordinator returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Signaling link closed")]
    Closed,
}

// ============================================================================
// TRANSPORT TRAIT
// ============================================================================

/// Transportweg für Signaling-Nachrichten
///
/// `push` liefert eine lokal erzeugte Nachricht aus, `pull` holt alle
/// ausstehenden Nachrichten einer Konversation in Koordinator-Reihenfolge.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn push(&self, message: &SignalingMessage) -> Result<(), SignalingError>;

    async fn pull(&self, conversation_id: &str) -> Result<Vec<SignalingMessage>, SignalingError>;
}

// ============================================================================
// HTTP SIGNALING CLIENT
// ============================================================================

/// reqwest-basierter Client für den Koordinator
#[derive(Debug, Clone)]
pub struct HttpSignalingClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpSignalingClient {
    pub fn new(base_url: &str) -> Result<Self, SignalingError> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Verwendet einen bestehenden reqwest Client (geteilter Connection-Pool)
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, SignalingError> {
        // Trailing Slash, damit join() den Pfad anhängt statt ersetzt
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            base_url: Url::parse(&base)?,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SignalingError> {
        Ok(self.base_url.join(path)?)
    }

    /// Fordert ein Session-Credential für eine Konversation an
    pub async fn request_token(&self, conversation_id: &str) -> Result<SessionToken, SignalingError> {
        let response = self
            .http
            .post(self.endpoint("webrtc/token")?)
            .json(&TokenRequest { conversation_id })
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json::<SessionToken>().await?)
    }

    /// Liveness-Abfrage, best effort: jeder Fehler ergibt `false`
    pub async fn status(&self, token: &str) -> bool {
        let url = match self.endpoint("webrtc/status") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Status check skipped: {}", e);
                return false;
            }
        };

        let result = async {
            let response = self.http.get(url).query(&[("token", token)]).send().await?;
            let response = check_status(response).await?;
            Ok::<_, SignalingError>(response.json::<StatusResponse>().await?)
        }
        .await;

        match result {
            Ok(status) => status.connected,
            Err(e) => {
                tracing::debug!("Status check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl SignalingTransport for HttpSignalingClient {
    async fn push(&self, message: &SignalingMessage) -> Result<(), SignalingError> {
        tracing::debug!(
            "Pushing {} for conversation {}",
            message.kind(),
            message.conversation_id()
        );

        let response = self
            .http
            .post(self.endpoint("webrtc/signaling")?)
            .json(message)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn pull(&self, conversation_id: &str) -> Result<Vec<SignalingMessage>, SignalingError> {
        let response = self
            .http
            .get(self.endpoint("webrtc/signaling")?)
            .query(&[("conversationId", conversation_id)])
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json::<Vec<SignalingMessage>>().await?)
    }
}

/// Wandelt einen Nicht-2xx-Status in einen Fehler mit Body um
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SignalingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SignalingError::Status {
        status: status.as_u16(),
        body,
    })
}
