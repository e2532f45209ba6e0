//! Data Channel Messenger
//!
//! Dünne JSON-Schicht über einem etablierten RTCDataChannel. Der Messenger
//! leiht sich den Channel nur; geschlossen wird er von der Engine.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Data channel send failed: {0}")]
    Send(String),
}

/// JSON-Framing für einen Data Channel
#[derive(Clone)]
pub struct DataChannelMessenger {
    channel: Arc<RTCDataChannel>,
}

impl DataChannelMessenger {
    /// Registriert die Handler am Channel
    ///
    /// `on_open` läuft einmal mit dem Label, sobald der Channel offen ist,
    /// auch wenn er das beim Registrieren schon war. Jede eingehende
    /// Nachricht wird als JSON geparst und an `on_message` übergeben. Nicht
    /// parsebare Frames werden geloggt und verworfen.
    pub fn attach<O, F>(channel: Arc<RTCDataChannel>, on_open: O, on_message: F) -> Self
    where
        O: FnOnce(String) + Send + Sync + 'static,
        F: Fn(Value) + Send + Sync + 'static,
    {
        let label = channel.label().to_string();
        channel.on_open(Box::new(move || {
            tracing::info!("Data channel '{}' open", label);
            on_open(label);
            Box::pin(async {})
        }));

        let label = channel.label().to_string();
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            match decode_frame(&msg.data) {
                Ok(value) => on_message(value),
                Err(e) => tracing::warn!("Dropping malformed frame on '{}': {}", label, e),
            }
            Box::pin(async {})
        }));

        Self { channel }
    }

    pub fn label(&self) -> &str {
        self.channel.label()
    }

    pub fn ready_state(&self) -> RTCDataChannelState {
        self.channel.ready_state()
    }

    pub fn is_open(&self) -> bool {
        self.ready_state() == RTCDataChannelState::Open
    }

    /// Serialisiert `payload` als JSON und sendet es als Text-Frame
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), MessengerError> {
        let text = serde_json::to_string(payload)?;
        self.channel
            .send_text(text)
            .await
            .map_err(|e| MessengerError::Send(e.to_string()))?;
        Ok(())
    }

    pub(crate) async fn close(&self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!("Data channel close failed: {}", e);
        }
    }
}

impl std::fmt::Debug for DataChannelMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannelMessenger")
            .field("label", &self.label())
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

/// Parst einen Frame als JSON
pub fn decode_frame(data: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    #[test]
    fn test_decode_frame() {
        assert_eq!(
            decode_frame(br#"{"type":"transcript","text":"hallo"}"#).unwrap(),
            json!({"type": "transcript", "text": "hallo"})
        );
        assert!(decode_frame(b"{not json").is_err());
        assert!(decode_frame(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn test_fresh_channel_not_open() {
        let api = APIBuilder::new().build();
        let pc = api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .unwrap();
        let channel = pc.create_data_channel("chat", None).await.unwrap();

        let messenger = DataChannelMessenger::attach(channel, |_| {}, |_| {});
        assert_eq!(messenger.label(), "chat");
        assert!(!messenger.is_open());

        pc.close().await.unwrap();
    }
}
