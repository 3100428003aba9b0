//! Shared test support: an in-memory transport and envelope helpers.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use pinlink::{ControlHub, HubConfig, PinId, PinMode, PinState, Transport, TransportError};

/// Transport that records every call instead of talking to a broker.
#[derive(Default)]
pub struct RecordingTransport {
    pub published: Mutex<Vec<(String, Vec<u8>)>>,
    pub subscriptions: Mutex<Vec<String>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_owned(), payload));
        Ok(())
    }

    async fn subscribe(&self, topic_filter: &str) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push(topic_filter.to_owned());
        Ok(())
    }

    async fn unsubscribe(&self, topic_filter: &str) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .retain(|t| t != topic_filter);
        Ok(())
    }
}

impl RecordingTransport {
    pub fn published_topics(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Decode the most recent publish as JSON.
    pub fn last_payload(&self) -> serde_json::Value {
        let published = self.published.lock().unwrap();
        let (_, payload) = published.last().expect("nothing was published");
        serde_json::from_slice(payload).expect("published payload is not JSON")
    }
}

/// A started hub over a recording transport.
pub async fn started_hub() -> (ControlHub, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let hub = ControlHub::new(&HubConfig::new("unused"), transport.clone());
    hub.start().await.expect("hub start");
    (hub, transport)
}

/// Serialized update envelope carrying only pin records.
pub fn pin_envelope(pins: &[(PinId, PinMode, PinState)]) -> Vec<u8> {
    let records: Vec<_> = pins
        .iter()
        .map(|(pin, mode, state)| {
            json!({
                "pin": pin.as_str(),
                "mode": i16::from(*mode),
                "state": u8::from(*state),
            })
        })
        .collect();
    serde_json::to_vec(&json!({ "pins": records })).unwrap()
}

pub fn update_topic(device_id: &str) -> String {
    format!("device/{}/update", device_id)
}
