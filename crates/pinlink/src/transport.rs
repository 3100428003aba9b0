//! Transport boundary.
//!
//! The hub only needs three capabilities from its transport: publish,
//! subscribe, unsubscribe. Inbound traffic is pushed into the hub by
//! whoever drives the connection: the MQTT event loop in production, the
//! test harness in tests.

use async_trait::async_trait;

/// Errors from the underlying transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("client error: {0}")]
    Client(String),
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ClientError> for TransportError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Client(err.to_string())
    }
}

/// One inbound message, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe capabilities the hub depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn subscribe(&self, topic_filter: &str) -> Result<(), TransportError>;

    async fn unsubscribe(&self, topic_filter: &str) -> Result<(), TransportError>;
}

#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

#[cfg(feature = "mqtt")]
mod mqtt {
    use std::time::Duration;

    use async_trait::async_trait;
    use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
    use tokio::sync::mpsc;
    use tracing::{debug, warn};

    use super::{InboundMessage, Transport, TransportError};
    use crate::config::MqttConfig;

    /// Limit of consecutive event-loop failures before the connection is
    /// abandoned.
    const MAX_POLL_ERRORS: u32 = 5;

    /// MQTT transport over rumqttc.
    pub struct MqttTransport {
        client: AsyncClient,
        qos: QoS,
    }

    impl MqttTransport {
        /// Connect to the broker. Returns the transport and the stream of
        /// inbound messages; the event loop runs in a background task until
        /// the receiver is dropped or the error limit is hit.
        pub fn connect(config: &MqttConfig) -> (Self, mpsc::Receiver<InboundMessage>) {
            let client_id = config
                .client_id
                .clone()
                .unwrap_or_else(|| format!("pinlink-{}", std::process::id()));

            let mut options = MqttOptions::new(client_id, &config.broker, config.port);
            options.set_keep_alive(Duration::from_secs(config.keep_alive));
            options.set_clean_session(config.clean_session);
            if let (Some(user), Some(pass)) = (&config.username, &config.password) {
                options.set_credentials(user, pass);
            }

            let (client, mut eventloop) = AsyncClient::new(options, 64);
            let (tx, rx) = mpsc::channel(256);

            tokio::spawn(async move {
                let mut error_count = 0u32;
                loop {
                    match eventloop.poll().await {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            error_count = 0;
                            let message = InboundMessage {
                                topic: publish.topic.clone(),
                                payload: publish.payload.to_vec(),
                            };
                            if tx.send(message).await.is_err() {
                                debug!("inbound receiver dropped, stopping event loop");
                                break;
                            }
                        }
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            error_count = 0;
                            debug!("broker connection acknowledged");
                        }
                        Ok(_) => {
                            error_count = 0;
                        }
                        Err(e) => {
                            error_count += 1;
                            if error_count >= MAX_POLL_ERRORS {
                                warn!("event loop error limit reached, stopping: {}", e);
                                break;
                            }
                            warn!(
                                "event loop error ({}/{}): {}",
                                error_count, MAX_POLL_ERRORS, e
                            );
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            });

            (
                Self {
                    client,
                    qos: qos_from_level(config.qos),
                },
                rx,
            )
        }
    }

    fn qos_from_level(level: u8) -> QoS {
        match level {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        }
    }

    #[async_trait]
    impl Transport for MqttTransport {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
            self.client
                .publish(topic, self.qos, false, payload)
                .await?;
            Ok(())
        }

        async fn subscribe(&self, topic_filter: &str) -> Result<(), TransportError> {
            self.client.subscribe(topic_filter, self.qos).await?;
            Ok(())
        }

        async fn unsubscribe(&self, topic_filter: &str) -> Result<(), TransportError> {
            self.client.unsubscribe(topic_filter).await?;
            Ok(())
        }
    }

}
