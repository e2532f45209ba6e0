//! Negotiation Module - WebRTC Session-Aufbau
//!
//! Dieses Modul verwaltet:
//! - Den Verhandlungs-Automaten (Offer/Answer, Glare, ICE)
//! - Die RTCPeerConnection als Actor-Task
//! - JSON-Nachrichten über den Data Channel

mod channel;
mod engine;
mod state;

pub use channel::{decode_frame, DataChannelMessenger, MessengerError};
pub use engine::{LocalStream, NegotiatorError, NegotiatorEvent, PeerConnectionNegotiator};
pub use state::{
    Action, ConnectionState, Event, Ignored, Negotiation, PeerSession, Role, Side, Step,
};
