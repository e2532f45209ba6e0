//! Streaming Module - Server-Sent-Events über beliebige HTTP-Methoden
//!
//! Dieses Modul verwaltet:
//! - Das Framing (UTF-8, `\n\n`, `data: `)
//! - Den Lese-Task mit Open/Message/Closed/Error
//! - Den Realtime-Chat als Anwendung darauf

mod chat;
mod framing;
mod reader;

pub use chat::{ChatChunk, ChatError, ChatSender, ChatStream, ChatTurn, RealtimeChatClient};
pub use framing::{parse_event, EventFramer, DATA_PREFIX, EVENT_DELIMITER};
pub use reader::{StreamError, StreamEvent, StreamingEventReader};
