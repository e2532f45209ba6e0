//! Realtime-Chat Client
//!
//! Ablauf wie im Backend vorgesehen:
//! 1. `POST /realtime-chat` mit Text, Kontext und Umgebung
//! 2. `GET /realtime-chat` als Event-Stream, bis ein Chunk `done: true` trägt

use super::reader::{StreamError, StreamEvent, StreamingEventReader};
use crate::config::ClientConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Urheber eines Kontext-Beitrags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Ai,
}

/// Ein vorheriger Beitrag als Kontext für das Modell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub sender: ChatSender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::User,
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::Ai,
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    text: &'a str,
    context: &'a [ChatTurn],
    environment: &'a str,
}

/// Ein Stück der gestreamten Antwort
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub text: Option<String>,
    /// Ende des Turns
    #[serde(default)]
    pub done: bool,
    /// Alle weiteren Felder unverändert
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct RealtimeChatClient {
    http: reqwest::Client,
    endpoint: String,
    environment: String,
}

impl RealtimeChatClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: format!("{}/realtime-chat", config.base_url.trim_end_matches('/')),
            environment: config.environment.clone(),
        }
    }

    /// Sendet eine Nachricht und öffnet den Antwort-Stream
    ///
    /// `environment` fällt auf die konfigurierte Umgebung zurück.
    pub async fn send_message(
        &self,
        text: &str,
        context: &[ChatTurn],
        environment: Option<&str>,
    ) -> Result<ChatStream, ChatError> {
        let environment = environment.unwrap_or(&self.environment);
        tracing::info!("Sending realtime message with environment: {}", environment);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&ChatRequest {
                text,
                context,
                environment,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Cache-Buster, damit kein Proxy eine alte Antwort liefert
        let request = self
            .http
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .query(&[("_", Utc::now().timestamp_millis())]);

        let (reader, events) = StreamingEventReader::open(request);
        Ok(ChatStream::new(reader, events))
    }
}

// ============================================================================
// CHAT STREAM
// ============================================================================

/// Antwort-Stream eines Turns
#[derive(Debug)]
pub struct ChatStream {
    reader: StreamingEventReader,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    finished: bool,
}

impl ChatStream {
    pub fn new(
        reader: StreamingEventReader,
        events: mpsc::UnboundedReceiver<StreamEvent>,
    ) -> Self {
        Self {
            reader,
            events,
            finished: false,
        }
    }

    /// Nächster Chunk; `None` nach `done`, Streamende oder `close()`
    ///
    /// Nicht parsebare Payloads werden geloggt und übersprungen.
    pub async fn next_chunk(&mut self) -> Option<Result<ChatChunk, StreamError>> {
        while !self.finished {
            let Some(event) = self.events.recv().await else {
                self.finished = true;
                break;
            };

            match event {
                StreamEvent::Open { status } => tracing::debug!("Chat stream open ({})", status),
                StreamEvent::Message(data) => match serde_json::from_str::<ChatChunk>(&data) {
                    Ok(chunk) => {
                        if chunk.done {
                            self.close();
                        }
                        return Some(Ok(chunk));
                    }
                    Err(e) => tracing::warn!("Dropping unparseable chat payload: {}", e),
                },
                StreamEvent::Closed => self.finished = true,
                StreamEvent::Error(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }

    /// Schließt den Stream vorzeitig; idempotent
    pub fn close(&mut self) {
        self.finished = true;
        self.reader.close();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;

    fn stream_of(chunks: Vec<&'static str>) -> ChatStream {
        let body = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, io::Error>(c.as_bytes())),
        );
        let (reader, events) = StreamingEventReader::from_stream(body);
        ChatStream::new(reader, events)
    }

    #[test]
    fn test_request_body() {
        let context = vec![ChatTurn {
            sender: ChatSender::Ai,
            text: "Welcome!".to_string(),
            timestamp: None,
        }];
        let body = serde_json::to_value(ChatRequest {
            text: "Hello",
            context: &context,
            environment: "Business English",
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "text": "Hello",
                "context": [{"sender": "ai", "text": "Welcome!"}],
                "environment": "Business English"
            })
        );
    }

    #[test]
    fn test_chunk_keeps_extra_fields() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"text":"Hi","audio":"UklGR","done":false}"#).unwrap();
        assert_eq!(chunk.text.as_deref(), Some("Hi"));
        assert!(!chunk.done);
        assert_eq!(chunk.extra.get("audio"), Some(&json!("UklGR")));
    }

    #[tokio::test]
    async fn test_done_closes_stream() {
        let mut stream = stream_of(vec![
            "data: {\"text\":\"Hel\"}\n\ndata: {\"text\":\"lo\"}\n\n",
            "data: {\"done\":true}\n\ndata: {\"text\":\"after\"}\n\n",
        ]);

        let first = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.text.as_deref(), Some("Hel"));
        let second = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(second.text.as_deref(), Some("lo"));
        let last = stream.next_chunk().await.unwrap().unwrap();
        assert!(last.done);

        assert!(stream.is_finished());
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_skipped() {
        let mut stream = stream_of(vec!["data: {oops\n\ndata: {\"text\":\"ok\"}\n\n"]);

        let chunk = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk.text.as_deref(), Some("ok"));
        assert!(stream.next_chunk().await.is_none());
        assert!(stream.is_finished());
    }

    #[tokio::test]
    async fn test_explicit_close() {
        let mut stream = stream_of(vec!["data: {\"text\":\"a\"}\n\n"]);
        stream.close();
        stream.close();
        assert!(stream.next_chunk().await.is_none());
    }
}
