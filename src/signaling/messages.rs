//! Message Types für das Signaling-Protokoll
//!
//! Diese Strukturen spiegeln die JSON-Payloads des Koordinators unter
//! `/webrtc/*` wider und ermöglichen typsichere Kommunikation.

use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

// ============================================================================
// SIGNALING ENVELOPES
// ============================================================================

/// Eine Signaling-Nachricht, immer an eine Konversation gebunden
///
/// Wird vom Koordinator geliefert oder lokal vom Negotiator erzeugt und
/// genau einmal konsumiert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    /// SDP Offer
    Offer {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        sdp: String,
    },

    /// SDP Answer
    Answer {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        sdp: String,
    },

    /// ICE Candidate im Browser-Format (`candidate`, `sdpMid`, ...)
    IceCandidate {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        candidate: RTCIceCandidateInit,
    },

    /// Fehler vom Gegenüber oder Koordinator
    Error {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        reason: String,
    },
}

impl SignalingMessage {
    pub fn offer(conversation_id: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self::Offer {
            conversation_id: conversation_id.into(),
            sdp: sdp.into(),
        }
    }

    pub fn answer(conversation_id: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self::Answer {
            conversation_id: conversation_id.into(),
            sdp: sdp.into(),
        }
    }

    pub fn ice_candidate(conversation_id: impl Into<String>, candidate: RTCIceCandidateInit) -> Self {
        Self::IceCandidate {
            conversation_id: conversation_id.into(),
            candidate,
        }
    }

    pub fn error(conversation_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Error {
            conversation_id: conversation_id.into(),
            reason: reason.into(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Offer {
                conversation_id, ..
            }
            | Self::Answer {
                conversation_id, ..
            }
            | Self::IceCandidate {
                conversation_id, ..
            }
            | Self::Error {
                conversation_id, ..
            } => conversation_id,
        }
    }

    /// Wire-Name des `type`-Felds, für Logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::Error { .. } => "error",
        }
    }
}

// ============================================================================
// SESSION CREDENTIALS
// ============================================================================

/// Request für `POST /webrtc/token`
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    #[serde(rename = "conversationId")]
    pub conversation_id: &'a str,
}

/// Session-Credential vom Koordinator
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionToken {
    pub token: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Antwort von `GET /webrtc/status`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub connected: bool,
}
