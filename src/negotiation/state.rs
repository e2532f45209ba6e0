//! Verhandlungs-Zustand
//!
//! `PeerSession` hält den gesamten Zustand einer Konversation. Übergänge
//! laufen ausschließlich über [`PeerSession::step`], eine reine Funktion:
//! sie liefert den Folgezustand und die auszuführenden Aktionen, führt aber
//! selbst nichts aus. Die Engine setzt die Aktionen gegen WebRTC um.

use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

// ============================================================================
// STATE TYPES
// ============================================================================

/// Welche Seite das Offer erzeugt hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unset,
    Initiator,
    Responder,
}

/// Erreichbarkeit des darunterliegenden Transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Seite einer abgeschlossenen Offer/Answer-Runde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Initiator,
    Responder,
}

/// Fortschritt des SDP-Austauschs
///
/// Ersetzt die Flag-Kombination aus Rolle, lokaler und entfernter
/// Description; ungültige Kombinationen sind nicht darstellbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Keine Description gesetzt
    Idle,
    /// Lokales Offer gesetzt und versendet, Answer steht aus
    AwaitingAnswer,
    /// Beide Descriptions gesetzt
    Stable(Side),
}

// ============================================================================
// EVENTS & ACTIONS
// ============================================================================

/// Eingänge des Automaten: lokale Absicht oder eingehende Nachricht
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Expliziter `initiate_connection()`-Aufruf
    Initiate,
    /// Lokaler Stream hinzugefügt (Tracks sind bereits angehängt)
    LocalStreamAdded,
    OfferReceived { sdp: String },
    AnswerReceived { sdp: String },
    CandidateReceived { candidate: RTCIceCandidateInit },
    RemoteError { reason: String },
    /// Zustandswechsel der RTCPeerConnection
    Transport(RTCPeerConnectionState),
    /// Eine Description konnte nicht erzeugt oder angewendet werden
    DescriptionFailed,
    HealthCheck,
    Close,
}

/// Von der Engine auszuführende Schritte, in Reihenfolge
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Data Channel anlegen, falls noch keiner existiert
    CreateDataChannel,
    /// Offer erzeugen, lokal setzen und versenden
    SendOffer,
    /// Eigenes Offer verwerfen (Glare)
    DiscardLocalOffer,
    /// Remote Offer setzen, Answer erzeugen, lokal setzen und versenden
    SendAnswer { offer_sdp: String },
    ApplyAnswer { sdp: String },
    ApplyCandidate { candidate: RTCIceCandidateInit },
    NotifyConnected,
    NotifyDisconnected,
    /// Data Channel, Peer Connection und Timer schließen
    Shutdown,
}

/// Grund, warum ein Event ohne Wirkung blieb
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    /// Answer ohne eigenes ausstehendes Offer
    UnexpectedAnswer,
    /// Candidate vor beiden Descriptions, wird verworfen
    EarlyCandidate,
    /// Verhandlung läuft bereits
    InProgress,
    /// Fehler vom Gegenüber, nur geloggt
    RemoteError(String),
    SessionClosed,
    NothingToDo,
}

/// Ergebnis eines Übergangs
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: PeerSession,
    pub actions: Vec<Action>,
    pub ignored: Option<Ignored>,
}

impl Step {
    fn apply(next: PeerSession, actions: Vec<Action>) -> Self {
        Self {
            next,
            actions,
            ignored: None,
        }
    }

    fn ignore(current: &PeerSession, reason: Ignored) -> Self {
        Self {
            next: current.clone(),
            actions: Vec::new(),
            ignored: Some(reason),
        }
    }
}

// ============================================================================
// PEER SESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSession {
    conversation_id: String,
    negotiation: Negotiation,
    connection_state: ConnectionState,
    dropped_candidates: usize,
}

impl PeerSession {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            negotiation: Negotiation::Idle,
            connection_state: ConnectionState::New,
            dropped_candidates: 0,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn negotiation(&self) -> Negotiation {
        self.negotiation
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn role(&self) -> Role {
        match self.negotiation {
            Negotiation::Idle => Role::Unset,
            Negotiation::AwaitingAnswer | Negotiation::Stable(Side::Initiator) => Role::Initiator,
            Negotiation::Stable(Side::Responder) => Role::Responder,
        }
    }

    pub fn local_description_set(&self) -> bool {
        !matches!(self.negotiation, Negotiation::Idle)
    }

    pub fn remote_description_set(&self) -> bool {
        matches!(self.negotiation, Negotiation::Stable(_))
    }

    /// Anzahl verworfener Candidates (vor beiden Descriptions eingetroffen)
    pub fn dropped_candidates(&self) -> usize {
        self.dropped_candidates
    }

    pub fn is_closed(&self) -> bool {
        self.connection_state == ConnectionState::Closed
    }

    /// Berechnet den Übergang für `event`
    pub fn step(&self, event: &Event) -> Step {
        if self.is_closed() {
            return Step::ignore(self, Ignored::SessionClosed);
        }

        let mut next = self.clone();

        match event {
            Event::Initiate | Event::LocalStreamAdded => {
                let explicit = matches!(event, Event::Initiate);
                match self.negotiation {
                    Negotiation::Idle => {
                        next.negotiation = Negotiation::AwaitingAnswer;
                        next.connection_state = ConnectionState::Connecting;
                        Step::apply(next, vec![Action::CreateDataChannel, Action::SendOffer])
                    }
                    // Neues Offer ersetzt das ausstehende
                    Negotiation::AwaitingAnswer if explicit => {
                        Step::apply(next, vec![Action::SendOffer])
                    }
                    Negotiation::AwaitingAnswer => Step::ignore(self, Ignored::InProgress),
                    // Renegotiation nach bestehender Verbindung
                    Negotiation::Stable(_)
                        if self.connection_state == ConnectionState::Connected =>
                    {
                        next.negotiation = Negotiation::AwaitingAnswer;
                        Step::apply(next, vec![Action::SendOffer])
                    }
                    Negotiation::Stable(_) => Step::ignore(self, Ignored::InProgress),
                }
            }

            Event::OfferReceived { sdp } => {
                let glare = self.negotiation == Negotiation::AwaitingAnswer;
                let mut actions = Vec::with_capacity(3);
                // Glare: die Seite mit lokalem Offer gibt nach
                if glare {
                    actions.push(Action::DiscardLocalOffer);
                }
                // Verwerfen baut den Transport ab, eine Verbindung ist weg
                if glare && self.connection_state == ConnectionState::Connected {
                    actions.push(Action::NotifyDisconnected);
                }
                actions.push(Action::SendAnswer {
                    offer_sdp: sdp.clone(),
                });

                next.negotiation = Negotiation::Stable(Side::Responder);
                if glare || self.connection_state != ConnectionState::Connected {
                    next.connection_state = ConnectionState::Connecting;
                }
                Step::apply(next, actions)
            }

            Event::AnswerReceived { sdp } => match self.negotiation {
                Negotiation::AwaitingAnswer => {
                    next.negotiation = Negotiation::Stable(Side::Initiator);
                    Step::apply(next, vec![Action::ApplyAnswer { sdp: sdp.clone() }])
                }
                _ => Step::ignore(self, Ignored::UnexpectedAnswer),
            },

            Event::CandidateReceived { candidate } => match self.negotiation {
                Negotiation::Stable(_) => Step::apply(
                    next,
                    vec![Action::ApplyCandidate {
                        candidate: candidate.clone(),
                    }],
                ),
                _ => {
                    next.dropped_candidates += 1;
                    Step {
                        next,
                        actions: Vec::new(),
                        ignored: Some(Ignored::EarlyCandidate),
                    }
                }
            },

            Event::RemoteError { reason } => {
                Step::ignore(self, Ignored::RemoteError(reason.clone()))
            }

            Event::Transport(state) => self.transport_step(next, *state),

            Event::DescriptionFailed => {
                next.negotiation = match self.negotiation {
                    // Answer abgelehnt: eigenes Offer steht weiter aus
                    Negotiation::Stable(Side::Initiator) => Negotiation::AwaitingAnswer,
                    _ => Negotiation::Idle,
                };
                Step::apply(next, Vec::new())
            }

            Event::HealthCheck => {
                if self.connection_state == ConnectionState::Connecting
                    && !self.remote_description_set()
                {
                    let mut actions = Vec::with_capacity(2);
                    if self.negotiation == Negotiation::Idle {
                        actions.push(Action::CreateDataChannel);
                    }
                    actions.push(Action::SendOffer);
                    next.negotiation = Negotiation::AwaitingAnswer;
                    Step::apply(next, actions)
                } else {
                    Step::ignore(self, Ignored::NothingToDo)
                }
            }

            Event::Close => {
                next.connection_state = ConnectionState::Closed;
                Step::apply(next, vec![Action::Shutdown])
            }
        }
    }

    fn transport_step(&self, mut next: PeerSession, state: RTCPeerConnectionState) -> Step {
        match state {
            RTCPeerConnectionState::Connected => {
                if self.connection_state == ConnectionState::Connected {
                    return Step::ignore(self, Ignored::NothingToDo);
                }
                next.connection_state = ConnectionState::Connected;
                Step::apply(next, vec![Action::NotifyConnected])
            }
            RTCPeerConnectionState::Disconnected
            | RTCPeerConnectionState::Failed
            | RTCPeerConnectionState::Closed => {
                let target = if state == RTCPeerConnectionState::Failed {
                    ConnectionState::Failed
                } else {
                    ConnectionState::Disconnected
                };
                let already_down = matches!(
                    self.connection_state,
                    ConnectionState::Disconnected | ConnectionState::Failed
                );
                next.connection_state = target;
                if already_down {
                    Step::apply(next, Vec::new())
                } else {
                    Step::apply(next, vec![Action::NotifyDisconnected])
                }
            }
            _ => Step::ignore(self, Ignored::NothingToDo),
        }
    }
}
