//! Signaling-Poller
//!
//! Ein Task pro Konversation:
//! - Ausgehende Nachrichten über eine Outbox pushen (Reihenfolge bleibt erhalten)
//! - Eingehende Nachrichten im festen Intervall pullen und weiterleiten
//! - Fehlgeschlagene Pushes/Pulls loggen und beim nächsten Tick wiederholen

use super::client::{SignalingError, SignalingTransport};
use super::messages::SignalingMessage;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle auf den laufenden Poll-Task
#[derive(Debug)]
pub struct SignalingPoller {
    conversation_id: String,
    outbound: mpsc::UnboundedSender<SignalingMessage>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SignalingPoller {
    /// Startet den Poll-Task
    ///
    /// Eingehende Nachrichten der Konversation landen in `inbound`, in der
    /// Reihenfolge, in der der Koordinator sie pro Batch liefert. Der Task
    /// endet, sobald `cancel` ausgelöst wird oder `inbound` geschlossen ist.
    pub fn spawn(
        transport: Arc<dyn SignalingTransport>,
        conversation_id: String,
        interval: Duration,
        inbound: mpsc::UnboundedSender<SignalingMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            transport,
            conversation_id.clone(),
            interval,
            inbound,
            outbound_rx,
            cancel.clone(),
        ));

        Self {
            conversation_id,
            outbound,
            cancel,
            task,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Reiht eine Nachricht in die Outbox ein
    pub fn send(&self, message: SignalingMessage) -> Result<(), SignalingError> {
        if self.cancel.is_cancelled() {
            return Err(SignalingError::Closed);
        }
        self.outbound
            .send(message)
            .map_err(|_| SignalingError::Closed)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Stoppt den Task; mehrfacher Aufruf ist harmlos
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn run(
    transport: Arc<dyn SignalingTransport>,
    conversation_id: String,
    interval: Duration,
    inbound: mpsc::UnboundedSender<SignalingMessage>,
    mut outbound_rx: mpsc::UnboundedReceiver<SignalingMessage>,
    cancel: CancellationToken,
) {
    // Erster Pull nach einem vollen Intervall
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outbox: VecDeque<SignalingMessage> = VecDeque::new();

    tracing::debug!("Signaling poller started for {}", conversation_id);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            message = outbound_rx.recv() => {
                let Some(message) = message else { break };
                outbox.push_back(message);
                flush(transport.as_ref(), &mut outbox, &cancel).await;
            }

            _ = ticker.tick() => {
                flush(transport.as_ref(), &mut outbox, &cancel).await;

                let batch = tokio::select! {
                    _ = cancel.cancelled() => break,
                    batch = transport.pull(&conversation_id) => batch,
                };

                match batch {
                    Ok(batch) => {
                        for message in batch {
                            if message.conversation_id() != conversation_id {
                                tracing::debug!(
                                    "Skipping {} for foreign conversation {}",
                                    message.kind(),
                                    message.conversation_id()
                                );
                                continue;
                            }
                            if inbound.send(message).is_err() {
                                tracing::debug!("Signaling receiver dropped, stopping poller");
                                return;
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Signaling poll failed, retrying next tick: {}", e),
                }
            }
        }
    }

    if !outbox.is_empty() {
        tracing::debug!("Discarding {} unsent signaling messages", outbox.len());
    }
    tracing::debug!("Signaling poller stopped for {}", conversation_id);
}

/// Pusht die Outbox von vorne; bricht beim ersten Fehler ab
async fn flush(
    transport: &dyn SignalingTransport,
    outbox: &mut VecDeque<SignalingMessage>,
    cancel: &CancellationToken,
) {
    while let Some(message) = outbox.front() {
        if cancel.is_cancelled() {
            return;
        }
        match transport.push(message).await {
            Ok(()) => {
                outbox.pop_front();
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to push {} ({} queued), retrying next tick: {}",
                    message.kind(),
                    outbox.len(),
                    e
                );
                return;
            }
        }
    }
}
