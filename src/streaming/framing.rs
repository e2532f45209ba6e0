//! Event-Framing für Server-Sent-Events
//!
//! Rekonstruiert `data:`-Payloads aus beliebig zerstückelten Bytes:
//! - Zustandsbehafteter UTF-8-Decoder (Zeichen über Chunk-Grenzen hinweg)
//! - Events getrennt durch eine Leerzeile (`\n\n`)
//! - Nur Zeilen mit `data: `-Präfix sind Payload

use encoding_rs::{CoderResult, Decoder, UTF_8};

/// Trenner zwischen zwei Events
pub const EVENT_DELIMITER: &[u8; 2] = b"\n\n";

/// Präfix einer Payload-Zeile
pub const DATA_PREFIX: &str = "data: ";

/// Puffer plus Decoder, exklusiv für einen Reader
pub struct EventFramer {
    decoder: Decoder,
    buffer: String,
    /// Ab hier wurde noch nicht nach einem Trenner gesucht
    scan_from: usize,
}

impl Default for EventFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFramer {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder(),
            buffer: String::new(),
            scan_from: 0,
        }
    }

    /// Dekodiert einen Chunk und gibt alle nun vollständigen Payloads zurück
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk, false);
        self.drain_events()
    }

    /// Streamende: Decoder leeren; ein unvollständiges letztes Event
    /// wird verworfen
    pub fn finish(&mut self) -> Vec<String> {
        self.decode(&[], true);
        let events = self.drain_events();
        if !self.buffer.trim().is_empty() {
            tracing::debug!(
                "Discarding {} bytes of unterminated event",
                self.buffer.len()
            );
        }
        self.reset();
        events
    }

    pub fn reset(&mut self) {
        self.decoder = UTF_8.new_decoder();
        self.buffer.clear();
        self.scan_from = 0;
    }

    /// Noch nicht abgeschlossener Rest
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn decode(&mut self, mut input: &[u8], last: bool) {
        let estimate = self
            .decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len() * 3 + 4);
        self.buffer.reserve(estimate);

        loop {
            let (result, read, _) = self.decoder.decode_to_string(input, &mut self.buffer, last);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => self.buffer.reserve(input.len() * 3 + 4),
            }
        }
    }

    fn drain_events(&mut self) -> Vec<String> {
        let mut events = Vec::new();

        // Trenner kann über die alte Grenze reichen
        let mut start = self.scan_from.saturating_sub(1);
        while let Some(offset) = self.buffer.as_bytes()[start..]
            .windows(EVENT_DELIMITER.len())
            .position(|w| w == EVENT_DELIMITER)
        {
            let end = start + offset;
            // `\n` ist ASCII, `end` liegt immer auf einer Zeichengrenze
            if let Some(payload) = parse_event(&self.buffer[..end]) {
                events.push(payload);
            }
            self.buffer.drain(..end + EVENT_DELIMITER.len());
            start = 0;
        }

        self.scan_from = self.buffer.len();
        events
    }
}

impl std::fmt::Debug for EventFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFramer")
            .field("pending_bytes", &self.buffer.len())
            .finish()
    }
}

/// Extrahiert die Payload eines Events
///
/// Mehrere `data:`-Zeilen werden mit `\n` verbunden; Kommentare und andere
/// Felder werden ignoriert. `None`, wenn das Event keine Payload trägt.
pub fn parse_event(segment: &str) -> Option<String> {
    let mut data: Option<String> = None;

    for line in segment.split('\n') {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        match &mut data {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(payload);
            }
            None => data = Some(payload.to_string()),
        }
    }

    data
}
