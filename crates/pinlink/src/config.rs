//! Hub and broker configuration.

use serde::{Deserialize, Serialize};

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address.
    pub broker: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client id; derived from the process id when not provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username for authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    /// Clean session flag.
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,

    /// QoS level for publishes and subscriptions (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,
}

fn default_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    60
}
fn default_clean_session() -> bool {
    true
}
fn default_qos() -> u8 {
    1
}

impl MqttConfig {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            clean_session: default_clean_session(),
            qos: default_qos(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn full_broker_addr(&self) -> String {
        format!("{}:{}", self.broker, self.port)
    }
}

/// Hub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Broker connection.
    pub mqtt: MqttConfig,

    /// Capacity of the update broadcast channel; slow subscribers falling
    /// further behind than this lose the oldest events.
    #[serde(default = "default_update_capacity")]
    pub update_capacity: usize,
}

fn default_update_capacity() -> usize {
    256
}

impl HubConfig {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            mqtt: MqttConfig::new(broker),
            update_capacity: default_update_capacity(),
        }
    }

    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    pub fn with_update_capacity(mut self, capacity: usize) -> Self {
        self.update_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain() {
        let config = MqttConfig::new("broker.local")
            .with_port(8883)
            .with_auth("hub", "secret")
            .with_client_id("pinlink-test");

        assert_eq!(config.full_broker_addr(), "broker.local:8883");
        assert_eq!(config.username.as_deref(), Some("hub"));
        assert_eq!(config.client_id.as_deref(), Some("pinlink-test"));
    }

    #[test]
    fn defaults_apply_on_decode() {
        let config: MqttConfig = serde_json::from_str(r#"{"broker": "localhost"}"#).unwrap();
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive, 60);
        assert!(config.clean_session);
        assert_eq!(config.qos, 1);

        let hub: HubConfig =
            serde_json::from_str(r#"{"mqtt": {"broker": "localhost"}}"#).unwrap();
        assert_eq!(hub.update_capacity, 256);
    }
}
