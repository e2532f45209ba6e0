//! Signaling Module - HTTP Client für den Koordinator
//!
//! Dieses Modul verwaltet die Kommunikation mit dem Signaling-Koordinator:
//! - Nachrichten per Request pushen
//! - Ausstehende Nachrichten periodisch pullen (Poller)
//! - Session-Token und Status-Abfrage
//!

mod client;
mod messages;
mod poller;

pub use client::{HttpSignalingClient, SignalingError, SignalingTransport};
pub use messages::*;
pub use poller::SignalingPoller;
