//! WebRTC Negotiation Engine
//!
//! Ein Actor-Task pro Konversation besitzt die `PeerSession` und die
//! RTCPeerConnection. Alle Eingänge (API-Aufrufe, gepollte Signaling-
//! Nachrichten, WebRTC-Callbacks, Health-Check) laufen seriell über
//! dieselbe Queue, Übergänge berechnet `PeerSession::step`.

use super::channel::DataChannelMessenger;
use super::state::{Action, ConnectionState, Event, Ignored, PeerSession};
use crate::config::ClientConfig;
use crate::signaling::{SignalingError, SignalingMessage, SignalingPoller, SignalingTransport};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum NegotiatorError {
    #[error("WebRTC error: {0}")]
    WebRTC(String),

    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    #[error("No peer connection")]
    NoPeerConnection,

    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),
}

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Events die vom Negotiator ausgelöst werden
#[derive(Debug, Clone)]
pub enum NegotiatorEvent {
    StateChanged(ConnectionState),
    /// Transport verbunden; Label des Data Channels, falls schon vorhanden
    Connected { data_channel: Option<String> },
    Disconnected,
    /// Data Channel offen, `send_data` ist ab jetzt möglich
    ///
    /// Auf der antwortenden Seite kommt der Channel erst nach `Connected`.
    DataChannelOpen { label: String },
    /// Eingehende JSON-Nachricht vom Data Channel
    Message(Value),
}

/// Lokale Medienquelle: ausgehende Tracks
#[derive(Clone, Default)]
pub struct LocalStream {
    tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl LocalStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        self.tracks.push(track);
        self
    }

    /// Mono-Opus-Track (48kHz), Samples schreibt der Aufrufer
    pub fn opus_audio(stream_id: &str) -> (Self, Arc<TrackLocalStaticRTP>) {
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: 48000,
                channels: 1,
                ..Default::default()
            },
            "audio".to_string(),
            stream_id.to_string(),
        ));

        let stream =
            Self::new().with_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>);
        (stream, track)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl std::fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStream")
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Generation der Peer Connection; Callbacks verworfener Connections
/// werden daran erkannt und ignoriert.
type Generation = u64;

enum Command {
    Initiate(oneshot::Sender<bool>),
    AddLocalStream(LocalStream, oneshot::Sender<bool>),
    Signaling(SignalingMessage),
    Transport(Generation, RTCPeerConnectionState),
    LocalCandidate(Generation, RTCIceCandidateInit),
    RemoteDataChannel(Generation, Arc<RTCDataChannel>),
    DataChannelOpen(Generation, String),
    DataMessage(Value),
    SendData(Value, oneshot::Sender<bool>),
    Close(oneshot::Sender<()>),
}

// ============================================================================
// NEGOTIATOR HANDLE
// ============================================================================

/// Handle auf den Negotiator einer Konversation
///
/// Der Besitzer ist für `close()` verantwortlich. Werden alle Handles
/// gedroppt, schließt sich die Session ebenfalls.
pub struct PeerConnectionNegotiator {
    conversation_id: String,
    commands: mpsc::UnboundedSender<Command>,
    session: Arc<RwLock<PeerSession>>,
    event_tx: broadcast::Sender<NegotiatorEvent>,
}

impl PeerConnectionNegotiator {
    /// Startet Actor, Signaling-Poller und Health-Check
    pub fn spawn(
        config: &ClientConfig,
        transport: Arc<dyn SignalingTransport>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let conversation_id = conversation_id.into();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(100);
        let cancel = CancellationToken::new();

        let poller = SignalingPoller::spawn(
            transport,
            conversation_id.clone(),
            config.poll_interval(),
            signal_tx,
            cancel.clone(),
        );

        let session = Arc::new(RwLock::new(PeerSession::new(conversation_id.clone())));

        let actor = Actor {
            conversation_id: conversation_id.clone(),
            session: PeerSession::new(conversation_id.clone()),
            shared: Arc::clone(&session),
            ice_servers: config.ice_servers(),
            data_channel_label: config.data_channel_label.clone(),
            poller,
            commands: commands.downgrade(),
            event_tx: event_tx.clone(),
            cancel,
            pc: None,
            generation: 0,
            messenger: None,
            local_tracks: Vec::new(),
        };

        let span = tracing::info_span!(
            "negotiator",
            conversation = %conversation_id,
            instance = %Uuid::new_v4()
        );
        tokio::spawn(
            actor
                .run(commands_rx, signal_rx, config.health_check_interval())
                .instrument(span),
        );

        Self {
            conversation_id,
            commands,
            session,
            event_tx,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<NegotiatorEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot des aktuellen Verhandlungszustands
    pub fn session(&self) -> PeerSession {
        self.session.read().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.read().connection_state()
    }

    /// Startet (oder erneuert) das eigene Offer
    ///
    /// Gibt `false` zurück, wenn das Offer nicht erzeugt werden konnte oder
    /// die Session geschlossen ist. Fehler werden nur geloggt.
    pub async fn initiate_connection(&self) -> bool {
        self.request(Command::Initiate).await.unwrap_or(false)
    }

    /// Hängt die Tracks an und startet die Verhandlung, falls noch keine läuft
    pub async fn add_local_stream(&self, stream: LocalStream) -> bool {
        self.request(|reply| Command::AddLocalStream(stream, reply))
            .await
            .unwrap_or(false)
    }

    /// Verarbeitet eine Signaling-Nachricht, als käme sie vom Poller
    ///
    /// Doppelte Zustellung wird nicht dedupliziert.
    pub fn process_signaling_message(&self, message: SignalingMessage) {
        let _ = self.commands.send(Command::Signaling(message));
    }

    /// Sendet `payload` als JSON über den Data Channel
    ///
    /// Nur wenn der Channel offen ist; sonst `false` ohne Pufferung.
    pub async fn send_data<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to encode data channel payload: {}", e);
                return false;
            }
        };
        self.request(|reply| Command::SendData(value, reply))
            .await
            .unwrap_or(false)
    }

    /// Schließt Data Channel, Peer Connection und Timer; idempotent
    pub async fn close(&self) {
        let _ = self.request(Command::Close).await;
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).ok()?;
        rx.await.ok()
    }
}

impl std::fmt::Debug for PeerConnectionNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnectionNegotiator")
            .field("conversation_id", &self.conversation_id)
            .field("session", &*self.session.read())
            .finish()
    }
}

// ============================================================================
// ACTOR
// ============================================================================

struct Actor {
    conversation_id: String,
    session: PeerSession,
    shared: Arc<RwLock<PeerSession>>,
    ice_servers: Vec<RTCIceServer>,
    data_channel_label: String,
    poller: SignalingPoller,
    commands: mpsc::WeakUnboundedSender<Command>,
    event_tx: broadcast::Sender<NegotiatorEvent>,
    cancel: CancellationToken,
    pc: Option<Arc<RTCPeerConnection>>,
    generation: Generation,
    messenger: Option<DataChannelMessenger>,
    local_tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands_rx: mpsc::UnboundedReceiver<Command>,
        mut signal_rx: mpsc::UnboundedReceiver<SignalingMessage>,
        health_period: Duration,
    ) {
        tracing::info!("Negotiator started");

        let mut health = tokio::time::interval_at(Instant::now() + health_period, health_period);
        let mut health_active = true;

        loop {
            tokio::select! {
                biased;

                command = commands_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::debug!("All negotiator handles dropped");
                        self.dispatch(Event::Close).await;
                    }
                },

                Some(message) = signal_rx.recv() => self.handle_signaling(message).await,

                _ = health.tick(), if health_active => {
                    self.dispatch(Event::HealthCheck).await;
                }
            }

            if self.session.is_closed() {
                break;
            }
            // Nach erfolgreicher Verbindung keine Retries mehr, nach
            // Verbindungsverlust wieder ab einer vollen Periode
            let connected = self.session.connection_state() == ConnectionState::Connected;
            if connected && health_active {
                health_active = false;
            } else if !connected && !health_active {
                tracing::debug!("Connection lost, re-arming health check");
                health.reset();
                health_active = true;
            }
        }

        tracing::info!("Negotiator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initiate(reply) => {
                let ok = self.dispatch(Event::Initiate).await;
                let _ = reply.send(ok && !self.session.is_closed());
            }

            Command::AddLocalStream(stream, reply) => {
                let ok = self.add_local_stream(stream).await;
                let _ = reply.send(ok);
            }

            Command::Signaling(message) => self.handle_signaling(message).await,

            Command::Transport(generation, state) => {
                if generation != self.generation {
                    tracing::trace!("Ignoring state {:?} of discarded connection", state);
                    return;
                }
                tracing::info!("Peer connection state: {:?}", state);
                self.dispatch(Event::Transport(state)).await;
            }

            Command::LocalCandidate(generation, candidate) => {
                if generation != self.generation || self.session.is_closed() {
                    return;
                }
                let message = SignalingMessage::ice_candidate(&self.conversation_id, candidate);
                if let Err(e) = self.poller.send(message) {
                    tracing::warn!("Failed to queue local ICE candidate: {}", e);
                }
            }

            Command::RemoteDataChannel(generation, channel) => {
                if generation != self.generation || self.session.is_closed() {
                    return;
                }
                tracing::info!("Remote data channel '{}' announced", channel.label());
                self.messenger = Some(DataChannelMessenger::attach(
                    channel,
                    self.open_notifier(),
                    self.forwarder(),
                ));
            }

            Command::DataChannelOpen(generation, label) => {
                if generation != self.generation || self.session.is_closed() {
                    return;
                }
                let _ = self.event_tx.send(NegotiatorEvent::DataChannelOpen { label });
            }

            Command::DataMessage(value) => {
                if !self.session.is_closed() {
                    let _ = self.event_tx.send(NegotiatorEvent::Message(value));
                }
            }

            Command::SendData(value, reply) => {
                let ok = self.send_data(&value).await;
                let _ = reply.send(ok);
            }

            Command::Close(reply) => {
                self.dispatch(Event::Close).await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_signaling(&mut self, message: SignalingMessage) {
        tracing::debug!("Received {}", message.kind());

        let event = match message {
            SignalingMessage::Offer { sdp, .. } => Event::OfferReceived { sdp },
            SignalingMessage::Answer { sdp, .. } => Event::AnswerReceived { sdp },
            SignalingMessage::IceCandidate { candidate, .. } => {
                Event::CandidateReceived { candidate }
            }
            SignalingMessage::Error { reason, .. } => Event::RemoteError { reason },
        };

        self.dispatch(event).await;
    }

    async fn add_local_stream(&mut self, stream: LocalStream) -> bool {
        if self.session.is_closed() {
            return false;
        }
        if stream.is_empty() {
            tracing::debug!("Local stream without tracks");
        } else {
            tracing::info!("Adding local stream with {} track(s)", stream.len());
        }

        let mut ok = true;
        for track in stream.tracks {
            if let Some(pc) = &self.pc {
                if let Err(e) = pc.add_track(Arc::clone(&track)).await {
                    tracing::warn!("Failed to add local track: {}", e);
                    ok = false;
                    continue;
                }
            }
            self.local_tracks.push(track);
        }

        self.dispatch(Event::LocalStreamAdded).await && ok
    }

    async fn send_data(&self, value: &Value) -> bool {
        let messenger = match &self.messenger {
            Some(messenger) if messenger.is_open() && !self.session.is_closed() => messenger,
            _ => {
                tracing::debug!("Data channel not open, dropping outbound payload");
                return false;
            }
        };

        match messenger.send(value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send data: {}", e);
                false
            }
        }
    }

    // ========================================================================
    // STATE MACHINE
    // ========================================================================

    /// Führt einen Übergang aus; `false` wenn eine Aktion fehlschlug
    async fn dispatch(&mut self, event: Event) -> bool {
        let actions = self.advance(&event);

        for action in actions {
            let resets_negotiation = matches!(
                action,
                Action::CreateDataChannel
                    | Action::SendOffer
                    | Action::DiscardLocalOffer
                    | Action::SendAnswer { .. }
                    | Action::ApplyAnswer { .. }
            );

            if let Err(e) = self.execute(action).await {
                if resets_negotiation {
                    tracing::warn!("Negotiation step failed, awaiting retry: {}", e);
                    self.advance(&Event::DescriptionFailed);
                    return false;
                }
                tracing::warn!("Negotiation step failed: {}", e);
            }
        }

        true
    }

    /// Berechnet den Übergang, übernimmt den Folgezustand und meldet Änderungen
    fn advance(&mut self, event: &Event) -> Vec<Action> {
        let step = self.session.step(event);

        match &step.ignored {
            Some(Ignored::UnexpectedAnswer) => {
                tracing::warn!("Rejecting out-of-order answer");
            }
            Some(Ignored::EarlyCandidate) => {
                tracing::warn!("Dropping ICE candidate received before both descriptions");
            }
            Some(Ignored::RemoteError(reason)) => {
                tracing::warn!("Remote signaling error: {}", reason);
            }
            Some(Ignored::InProgress) => tracing::debug!("Negotiation already in progress"),
            Some(Ignored::SessionClosed) => tracing::debug!("Session closed, ignoring {:?}", event),
            Some(Ignored::NothingToDo) | None => {}
        }

        let previous = self.session.connection_state();
        self.session = step.next;
        *self.shared.write() = self.session.clone();

        let current = self.session.connection_state();
        if current != previous {
            let _ = self.event_tx.send(NegotiatorEvent::StateChanged(current));
        }

        step.actions
    }

    async fn execute(&mut self, action: Action) -> Result<(), NegotiatorError> {
        match action {
            Action::CreateDataChannel => {
                if self.messenger.is_some() {
                    return Ok(());
                }
                let pc = self.ensure_peer_connection().await?;
                let channel = pc
                    .create_data_channel(&self.data_channel_label, None)
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;
                self.messenger = Some(DataChannelMessenger::attach(
                    channel,
                    self.open_notifier(),
                    self.forwarder(),
                ));
            }

            Action::SendOffer => {
                let pc = self.ensure_peer_connection().await?;

                let offer = pc
                    .create_offer(None)
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

                pc.set_local_description(offer.clone())
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

                self.poller
                    .send(SignalingMessage::offer(&self.conversation_id, offer.sdp))?;
                tracing::info!("Sent offer");
            }

            Action::DiscardLocalOffer => {
                tracing::info!("Glare: discarding local offer in favour of remote offer");
                self.teardown_peer_connection().await;
            }

            Action::SendAnswer { offer_sdp } => {
                let pc = self.ensure_peer_connection().await?;

                let offer = RTCSessionDescription::offer(offer_sdp)
                    .map_err(|e| NegotiatorError::InvalidSdp(e.to_string()))?;

                pc.set_remote_description(offer)
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

                let answer = pc
                    .create_answer(None)
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

                pc.set_local_description(answer.clone())
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

                self.poller
                    .send(SignalingMessage::answer(&self.conversation_id, answer.sdp))?;
                tracing::info!("Sent answer");
            }

            Action::ApplyAnswer { sdp } => {
                let pc = self.pc.clone().ok_or(NegotiatorError::NoPeerConnection)?;

                let answer = RTCSessionDescription::answer(sdp)
                    .map_err(|e| NegotiatorError::InvalidSdp(e.to_string()))?;

                pc.set_remote_description(answer)
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;
                tracing::info!("Applied answer");
            }

            Action::ApplyCandidate { candidate } => {
                let pc = self.pc.clone().ok_or(NegotiatorError::NoPeerConnection)?;
                pc.add_ice_candidate(candidate)
                    .await
                    .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;
            }

            Action::NotifyConnected => {
                let data_channel = self.messenger.as_ref().map(|m| m.label().to_string());
                let _ = self
                    .event_tx
                    .send(NegotiatorEvent::Connected { data_channel });
            }

            Action::NotifyDisconnected => {
                let _ = self.event_tx.send(NegotiatorEvent::Disconnected);
            }

            Action::Shutdown => {
                tracing::info!("Closing session");
                self.cancel.cancel();
                self.teardown_peer_connection().await;
            }
        }

        Ok(())
    }

    // ========================================================================
    // PEER CONNECTION
    // ========================================================================

    /// Erstellt die Peer Connection bei Bedarf, inklusive lokaler Tracks
    async fn ensure_peer_connection(&mut self) -> Result<Arc<RTCPeerConnection>, NegotiatorError> {
        if let Some(pc) = &self.pc {
            return Ok(Arc::clone(pc));
        }

        // Media Engine mit Standard-Codecs
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?,
        );

        for track in &self.local_tracks {
            pc.add_track(Arc::clone(track))
                .await
                .map_err(|e| NegotiatorError::WebRTC(e.to_string()))?;
        }

        self.generation += 1;
        self.register_handlers(&pc, self.generation);
        self.pc = Some(Arc::clone(&pc));

        Ok(pc)
    }

    /// Leitet WebRTC-Callbacks als Commands in die eigene Queue
    fn register_handlers(&self, pc: &RTCPeerConnection, generation: Generation) {
        let commands = self.commands.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::Transport(generation, s));
            }
            Box::pin(async {})
        }));

        let commands = self.commands.clone();
        pc.on_ice_candidate(Box::new(move |candidate| {
            if let Some(c) = candidate {
                match c.to_json() {
                    Ok(init) => {
                        if let Some(tx) = commands.upgrade() {
                            let _ = tx.send(Command::LocalCandidate(generation, init));
                        }
                    }
                    Err(e) => tracing::warn!("Failed to serialize local candidate: {}", e),
                }
            }
            Box::pin(async {})
        }));

        let commands = self.commands.clone();
        pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::RemoteDataChannel(generation, channel));
            }
            Box::pin(async {})
        }));
    }

    /// Schließt erst den Data Channel, dann die Peer Connection
    async fn teardown_peer_connection(&mut self) {
        // Callbacks der alten Connection ab hier ignorieren
        self.generation += 1;

        if let Some(messenger) = self.messenger.take() {
            messenger.close().await;
        }
        if let Some(pc) = self.pc.take() {
            if let Err(e) = pc.close().await {
                tracing::debug!("Peer connection close failed: {}", e);
            }
        }
    }

    /// Meldet das Öffnen des Channels der aktuellen Connection
    fn open_notifier(&self) -> impl FnOnce(String) + Send + Sync + 'static {
        let commands = self.commands.clone();
        let generation = self.generation;
        move |label| {
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::DataChannelOpen(generation, label));
            }
        }
    }

    /// Callback für den Messenger: Nachrichten laufen durch die Queue
    fn forwarder(&self) -> impl Fn(Value) + Send + Sync + 'static {
        let commands = self.commands.clone();
        move |value| {
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::DataMessage(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_stream_tracks() {
        let empty = LocalStream::new();
        assert!(empty.is_empty());

        let (stream, track) = LocalStream::opus_audio("mic");
        assert_eq!(stream.len(), 1);
        assert_eq!(track.stream_id(), "mic");
        assert_eq!(track.codec().mime_type, "audio/opus");

        let stream = stream.with_track(track);
        assert_eq!(stream.len(), 2);
    }
}
