//! Streaming Event Reader
//!
//! Liest einen HTTP-Body (auch von POST-Requests, was EventSource nicht
//! kann) und liefert die rekonstruierten Events über einen Channel:
//! - `Open` nach erfolgreichem Status
//! - `Message` pro `data:`-Payload, in Stream-Reihenfolge
//! - genau einmal `Closed` (Streamende) oder `Error` (Transportfehler)
//!
//! Nach `close()` wird nichts mehr zugestellt.

use super::framing::EventFramer;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("HTTP error {0}")]
    Status(u16),

    #[error("Stream request failed: {0}")]
    Request(String),

    #[error("Stream read failed: {0}")]
    Body(String),
}

// ============================================================================
// STREAM EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Response-Header empfangen, Status 2xx
    Open { status: u16 },
    /// Payload eines Events, Präfix entfernt
    Message(String),
    /// Server hat den Stream beendet
    Closed,
    /// Transportfehler; danach kommt nichts mehr
    Error(StreamError),
}

// ============================================================================
// READER
// ============================================================================

/// Handle auf einen laufenden Lese-Task
///
/// Droppen des Handles bricht den Stream ebenfalls ab.
#[derive(Debug)]
pub struct StreamingEventReader {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamingEventReader {
    /// Sendet `request` und liest den Response-Body als Event-Stream
    pub fn open(
        request: reqwest::RequestBuilder,
    ) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let response = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                response = request.send() => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Failed to open event stream: {}", e);
                    emit(&tx, &token, StreamEvent::Error(StreamError::Request(e.to_string())));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                tracing::error!("Event stream rejected with status {}", status);
                emit(&tx, &token, StreamEvent::Error(StreamError::Status(status.as_u16())));
                return;
            }

            if !emit(&tx, &token, StreamEvent::Open { status: status.as_u16() }) {
                return;
            }
            read_body(response.bytes_stream(), &tx, &token).await;
        });

        (Self { cancel, task }, rx)
    }

    /// Liest einen bereits geöffneten Body
    pub fn from_stream<S, B, E>(body: S) -> (Self, mpsc::UnboundedReceiver<StreamEvent>)
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            read_body(body, &tx, &token).await;
        });

        (Self { cancel, task }, rx)
    }

    /// Bricht das Lesen ab; mehrfacher Aufruf ist harmlos
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Closing event stream");
            self.cancel.cancel();
        }
        self.task.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for StreamingEventReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Stellt ein Event zu, solange weder abgebrochen noch der Empfänger weg ist
fn emit(
    tx: &mpsc::UnboundedSender<StreamEvent>,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tx.send(event).is_ok()
}

async fn read_body<S, B, E>(
    body: S,
    tx: &mpsc::UnboundedSender<StreamEvent>,
    cancel: &CancellationToken,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = Box::pin(body);
    let mut framer = EventFramer::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for payload in framer.feed(chunk.as_ref()) {
                    if !emit(tx, cancel, StreamEvent::Message(payload)) {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                tracing::error!("Event stream read failed: {}", e);
                emit(tx, cancel, StreamEvent::Error(StreamError::Body(e.to_string())));
                return;
            }
            None => {
                for payload in framer.finish() {
                    if !emit(tx, cancel, StreamEvent::Message(payload)) {
                        return;
                    }
                }
                tracing::debug!("Event stream ended");
                emit(tx, cancel, StreamEvent::Closed);
                return;
            }
        }
    }
}
