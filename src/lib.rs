//! Converse Link - Echtzeit-Schicht des Konversations-Clients
//!
//! Client-seitige Bausteine für:
//! - HTTP-Signaling mit Polling (Offer, Answer, ICE)
//! - WebRTC-Verhandlung inklusive Glare und Health-Check
//! - JSON-Nachrichten über den Data Channel
//! - Server-Sent-Events über POST-fähige Streams (Realtime-Chat)

pub mod config;
pub mod negotiation;
pub mod signaling;
pub mod streaming;

pub use config::ClientConfig;
pub use negotiation::{
    ConnectionState, DataChannelMessenger, LocalStream, NegotiatorEvent,
    PeerConnectionNegotiator, Role,
};
pub use signaling::{
    HttpSignalingClient, SignalingError, SignalingMessage, SignalingPoller, SignalingTransport,
};
pub use streaming::{
    ChatChunk, ChatSender, ChatStream, ChatTurn, RealtimeChatClient, StreamError, StreamEvent,
    StreamingEventReader,
};

use tracing_subscriber::EnvFilter;

// ============================================================================
// LOGGING
// ============================================================================

/// Standard-Direktiven zusätzlich zu `RUST_LOG`
const LOG_DIRECTIVES: [&str; 2] = ["converse_link=debug", "webrtc=warn"];

/// Installiert den globalen Tracing-Subscriber
///
/// Mehrfacher Aufruf ist harmlos; ein bereits gesetzter Subscriber bleibt.
pub fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    for directive in LOG_DIRECTIVES {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Invalid log directive '{}': {}", directive, e),
        }
    }

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!("Logging initialized");
    }
}
