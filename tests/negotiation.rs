//! Zwei echte Negotiators über einen In-Memory-Koordinator

use async_trait::async_trait;
use converse_link::negotiation::{Negotiation, Side};
use converse_link::{
    ClientConfig, ConnectionState, LocalStream, NegotiatorEvent, PeerConnectionNegotiator, Role,
    SignalingError, SignalingMessage, SignalingTransport,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

type Queue = Arc<Mutex<Vec<SignalingMessage>>>;

/// Eine Seite des Koordinators: Pushes landen in der Inbox der Gegenseite
#[derive(Default)]
struct Endpoint {
    inbox: Queue,
    peer_inbox: Queue,
    sent: Queue,
    /// Zurückgehaltene Zustellung, bis `release()`
    holding: AtomicBool,
    held: Queue,
}

impl Endpoint {
    fn pair() -> (Arc<Self>, Arc<Self>) {
        let a_inbox = Queue::default();
        let b_inbox = Queue::default();
        let a = Endpoint {
            inbox: Arc::clone(&a_inbox),
            peer_inbox: Arc::clone(&b_inbox),
            ..Endpoint::default()
        };
        let b = Endpoint {
            inbox: b_inbox,
            peer_inbox: a_inbox,
            ..Endpoint::default()
        };
        (Arc::new(a), Arc::new(b))
    }

    fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.holding.store(false, Ordering::SeqCst);
        let held = std::mem::take(&mut *self.held.lock());
        self.peer_inbox.lock().extend(held);
    }

    fn sent_of(&self, kind: &str) -> Vec<SignalingMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.kind() == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SignalingTransport for Endpoint {
    async fn push(&self, message: &SignalingMessage) -> Result<(), SignalingError> {
        self.sent.lock().push(message.clone());
        if self.holding.load(Ordering::SeqCst) {
            self.held.lock().push(message.clone());
        } else {
            self.peer_inbox.lock().push(message.clone());
        }
        Ok(())
    }

    async fn pull(&self, _conversation_id: &str) -> Result<Vec<SignalingMessage>, SignalingError> {
        Ok(std::mem::take(&mut *self.inbox.lock()))
    }
}

fn test_config() -> ClientConfig {
    ClientConfig {
        poll_interval_ms: 20,
        health_check_interval_ms: 60_000,
        ice_urls: Vec::new(),
        ..ClientConfig::default()
    }
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wartet auf das erste Event, das `select` akzeptiert
async fn next_event<T>(
    events: &mut broadcast::Receiver<NegotiatorEvent>,
    what: &str,
    mut select: impl FnMut(NegotiatorEvent) -> Option<T>,
) -> T {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(found) = select(event) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("events closed before {}", what),
            }
        }
    };
    match tokio::time::timeout(Duration::from_secs(20), wait).await {
        Ok(found) => found,
        Err(_) => panic!("timed out waiting for {}", what),
    }
}

/// `Connected` und `DataChannelOpen` in beliebiger Reihenfolge
async fn connected_and_open(
    events: &mut broadcast::Receiver<NegotiatorEvent>,
    side: &str,
) -> (Option<String>, String) {
    let mut connected = None;
    let mut open = None;
    while connected.is_none() || open.is_none() {
        match next_event(events, side, |event| match event {
            NegotiatorEvent::Connected { .. } | NegotiatorEvent::DataChannelOpen { .. } => {
                Some(event)
            }
            _ => None,
        })
        .await
        {
            NegotiatorEvent::Connected { data_channel } => connected = Some(data_channel),
            NegotiatorEvent::DataChannelOpen { label } => open = Some(label),
            _ => unreachable!(),
        }
    }
    (connected.flatten(), open.unwrap_or_default())
}

/// Zwei verbundene Negotiators samt Event-Receivern
async fn connected_pair(
    conversation_id: &str,
) -> (
    (PeerConnectionNegotiator, Arc<Endpoint>, broadcast::Receiver<NegotiatorEvent>),
    (PeerConnectionNegotiator, Arc<Endpoint>, broadcast::Receiver<NegotiatorEvent>),
) {
    let config = test_config();
    let (a_end, b_end) = Endpoint::pair();
    let a = PeerConnectionNegotiator::spawn(&config, a_end.clone(), conversation_id);
    let b = PeerConnectionNegotiator::spawn(&config, b_end.clone(), conversation_id);
    let a_events = a.subscribe();
    let b_events = b.subscribe();

    assert!(a.initiate_connection().await);
    wait_for("a connected", || a.connection_state() == ConnectionState::Connected).await;
    wait_for("b connected", || b.connection_state() == ConnectionState::Connected).await;

    ((a, a_end, a_events), (b, b_end, b_events))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_and_exchange_data() {
    let ((a, _a_end, mut a_events), (b, _b_end, mut b_events)) =
        connected_pair("conv-6").await;

    // Initiator kennt seinen Channel schon beim Verbinden
    let (a_channel, a_label) = connected_and_open(&mut a_events, "a").await;
    assert_eq!(a_channel.as_deref(), Some("chat"));
    assert_eq!(a_label, "chat");

    let (_, b_label) = connected_and_open(&mut b_events, "b").await;
    assert_eq!(b_label, "chat");

    assert!(a.send_data(&json!({"type": "transcript", "text": "hallo"})).await);
    let received = next_event(&mut b_events, "message on b", |event| match event {
        NegotiatorEvent::Message(value) => Some(value),
        _ => None,
    })
    .await;
    assert_eq!(received, json!({"type": "transcript", "text": "hallo"}));

    assert!(b.send_data(&json!({"ack": 1})).await);
    let received = next_event(&mut a_events, "message on a", |event| match event {
        NegotiatorEvent::Message(value) => Some(value),
        _ => None,
    })
    .await;
    assert_eq!(received, json!({"ack": 1}));

    a.close().await;
    b.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_renegotiation_glare_reports_disconnect() {
    let ((a, a_end, mut a_events), (b, b_end, mut b_events)) =
        connected_pair("conv-7").await;

    // Beide Offers sind unterwegs, bevor eines zugestellt wird
    a_end.hold();
    b_end.hold();
    let (a_stream, _a_track) = LocalStream::opus_audio("mic-a");
    let (b_stream, _b_track) = LocalStream::opus_audio("mic-b");
    assert!(a.add_local_stream(a_stream).await);
    assert!(b.add_local_stream(b_stream).await);
    assert_eq!(a.session().negotiation(), Negotiation::AwaitingAnswer);
    assert_eq!(b.session().negotiation(), Negotiation::AwaitingAnswer);
    a_end.release();
    b_end.release();

    for (events, side) in [(&mut a_events, "a"), (&mut b_events, "b")] {
        next_event(events, side, |event| {
            matches!(event, NegotiatorEvent::Disconnected).then_some(())
        })
        .await;
    }

    wait_for("a responder", || a.session().role() == Role::Responder).await;
    wait_for("b responder", || b.session().role() == Role::Responder).await;
    assert_ne!(a.connection_state(), ConnectionState::Connected);
    assert_ne!(b.connection_state(), ConnectionState::Connected);
    assert!(!a.send_data(&json!({"stale": true})).await);
    assert!(!b.send_data(&json!({"stale": true})).await);

    a.close().await;
    b.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_offer_answer_end_to_end() {
    let config = test_config();
    let (a_end, b_end) = Endpoint::pair();
    let a = PeerConnectionNegotiator::spawn(&config, a_end.clone(), "conv-1");
    let b = PeerConnectionNegotiator::spawn(&config, b_end.clone(), "conv-1");

    let (stream, _track) = LocalStream::opus_audio("mic");
    assert!(a.add_local_stream(stream).await);
    assert_eq!(a.session().role(), Role::Initiator);
    assert_eq!(a.connection_state(), ConnectionState::Connecting);

    wait_for("responder", || b.session().role() == Role::Responder).await;
    wait_for("answer applied", || a.session().remote_description_set()).await;

    assert_eq!(a_end.sent_of("offer").len(), 1);
    assert_eq!(b_end.sent_of("answer").len(), 1);
    assert!(b_end.sent_of("offer").is_empty());
    assert_eq!(a.session().negotiation(), Negotiation::Stable(Side::Initiator));

    let b_session = b.session();
    assert!(b_session.local_description_set());
    assert!(b_session.remote_description_set());

    a.close().await;
    b.close().await;
    assert_eq!(a.connection_state(), ConnectionState::Closed);
    assert_eq!(b.connection_state(), ConnectionState::Closed);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_glare_incoming_offer_wins() {
    let config = test_config();

    // B verhandelt gegen einen leeren Koordinator, nur sein Offer zählt
    let (b_end, _b_sink) = Endpoint::pair();
    let b = PeerConnectionNegotiator::spawn(&config, b_end.clone(), "conv-2");
    assert!(b.initiate_connection().await);
    wait_for("offer of b", || !b_end.sent_of("offer").is_empty()).await;
    let offer_b = b_end.sent_of("offer").remove(0);

    let (a_end, _a_sink) = Endpoint::pair();
    let a = PeerConnectionNegotiator::spawn(&config, a_end.clone(), "conv-2");
    assert!(a.initiate_connection().await);
    assert_eq!(a.session().role(), Role::Initiator);

    a.process_signaling_message(offer_b);
    wait_for("answer of a", || !a_end.sent_of("answer").is_empty()).await;

    let session = a.session();
    assert_eq!(session.role(), Role::Responder);
    assert!(session.local_description_set());
    assert!(session.remote_description_set());
    assert_eq!(a_end.sent_of("offer").len(), 1);

    a.close().await;
    b.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_early_candidate_is_dropped() {
    let config = test_config();
    let (a_end, _peer) = Endpoint::pair();
    let a = PeerConnectionNegotiator::spawn(&config, a_end, "conv-3");

    let candidate = webrtc::ice_transport::ice_candidate::RTCIceCandidateInit {
        candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".to_string(),
        ..Default::default()
    };
    a.process_signaling_message(SignalingMessage::ice_candidate("conv-3", candidate));

    wait_for("dropped candidate", || a.session().dropped_candidates() == 1).await;
    assert_eq!(a.session().role(), Role::Unset);

    a.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_send_data_requires_open_channel() {
    let config = test_config();
    let (a_end, _peer) = Endpoint::pair();
    let a = PeerConnectionNegotiator::spawn(&config, a_end, "conv-4");

    assert!(!a.send_data(&json!({"type": "ping"})).await);
    assert!(a.initiate_connection().await);
    // Channel existiert, ist ohne Gegenseite aber nicht offen
    assert!(!a.send_data(&json!({"type": "ping"})).await);

    a.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_is_idempotent() {
    let config = test_config();
    let (a_end, _peer) = Endpoint::pair();
    let a = PeerConnectionNegotiator::spawn(&config, a_end.clone(), "conv-5");
    let mut events = a.subscribe();

    assert!(a.initiate_connection().await);
    a.close().await;
    a.close().await;

    assert_eq!(a.connection_state(), ConnectionState::Closed);
    assert!(!a.initiate_connection().await);
    assert!(!a.send_data(&json!({"late": true})).await);

    // Nach dem Schließen wird nichts mehr gepusht
    tokio::time::sleep(Duration::from_millis(50)).await;
    let pushed = a_end.sent.lock().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(a_end.sent.lock().len(), pushed);

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let converse_link::NegotiatorEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(states, vec![ConnectionState::Connecting, ConnectionState::Closed]);
}
