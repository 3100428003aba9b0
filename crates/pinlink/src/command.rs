//! Device commands and their expected responses.
//!
//! Commands form a closed set; each kind knows the topic it publishes to,
//! its wire payload, and the filters describing the update that would prove
//! it took effect.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::filter::PinFilter;
use crate::topic;
use crate::types::{PinId, PinState};

/// One entry of a set-pins command.
///
/// With `pulse_ms` set, the device drives the pin to `state` for that many
/// milliseconds and then reverts it. Wire field for the duration is `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPin {
    pub pin: PinId,
    pub state: PinState,
    #[serde(rename = "time", default, skip_serializing_if = "Option::is_none")]
    pub pulse_ms: Option<u64>,
}

impl SetPin {
    pub fn new(pin: PinId, state: PinState) -> Self {
        Self {
            pin,
            state,
            pulse_ms: None,
        }
    }

    pub fn pulsed(pin: PinId, state: PinState, pulse_ms: u64) -> Self {
        Self {
            pin,
            state,
            pulse_ms: Some(pulse_ms),
        }
    }
}

/// A command addressed to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drive output pins, optionally as timed pulses.
    SetPins {
        device_id: String,
        pins: Vec<SetPin>,
    },
    /// Ask the device to report the current state of some pins.
    GetPins {
        device_id: String,
        pins: Vec<PinId>,
    },
    /// Replace the device's phone allow-list.
    SetPhones {
        device_id: String,
        phones: Vec<String>,
    },
}

impl Command {
    pub fn set_pins(device_id: impl Into<String>, pins: Vec<SetPin>) -> Self {
        Self::SetPins {
            device_id: device_id.into(),
            pins,
        }
    }

    pub fn get_pins(device_id: impl Into<String>, pins: Vec<PinId>) -> Self {
        Self::GetPins {
            device_id: device_id.into(),
            pins,
        }
    }

    pub fn set_phones(device_id: impl Into<String>, phones: Vec<String>) -> Self {
        Self::SetPhones {
            device_id: device_id.into(),
            phones,
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Self::SetPins { device_id, .. }
            | Self::GetPins { device_id, .. }
            | Self::SetPhones { device_id, .. } => device_id,
        }
    }

    /// Topic this command publishes to.
    pub fn topic(&self) -> String {
        match self {
            Self::SetPins { device_id, .. } => topic::pin_set(device_id),
            Self::GetPins { device_id, .. } => topic::pin_get(device_id),
            Self::SetPhones { device_id, .. } => topic::phone_set(device_id),
        }
    }

    /// Wire payload, as the firmware expects it.
    pub fn payload_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::SetPins { pins, .. } => serde_json::to_vec(pins),
            Self::GetPins { pins, .. } => serde_json::to_vec(pins),
            Self::SetPhones { phones, .. } => serde_json::to_vec(&json!({ "phone_list": phones })),
        }
    }

    /// Filters describing the update that would confirm this command.
    ///
    /// A pulsed pin is confirmed by its *resting* state: the device reports
    /// back after the pulse completes, so the filter expects the inverted
    /// value. A pin query is confirmed by any update for that pin. Phone
    /// list updates produce no confirmation.
    pub fn response_filters(&self) -> Vec<PinFilter> {
        match self {
            Self::SetPins { pins, .. } => pins
                .iter()
                .map(|entry| {
                    let expected = if entry.pulse_ms.is_some() {
                        !entry.state
                    } else {
                        entry.state
                    };
                    PinFilter::for_pin(entry.pin).with_state(expected)
                })
                .collect(),
            Self::GetPins { pins, .. } => pins.iter().copied().map(PinFilter::for_pin).collect(),
            Self::SetPhones { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterField;
    use serde_json::json;

    #[test]
    fn set_pins_topic_and_payload() {
        let command = Command::set_pins(
            "ABCDE1234567",
            vec![
                SetPin::new(PinId::Relay1, PinState::High),
                SetPin::pulsed(PinId::Relay2, PinState::Low, 500),
            ],
        );

        assert_eq!(command.topic(), "device/ABCDE1234567/pin/set");
        let payload: serde_json::Value =
            serde_json::from_slice(&command.payload_json().unwrap()).unwrap();
        assert_eq!(
            payload,
            json!([
                {"pin": "RELAY_1", "state": 1},
                {"pin": "RELAY_2", "state": 0, "time": 500},
            ])
        );
    }

    #[test]
    fn get_pins_payload_is_id_list() {
        let command = Command::get_pins("dev1", vec![PinId::Input1, PinId::Output1]);
        assert_eq!(command.topic(), "device/dev1/pin/get");
        let payload: serde_json::Value =
            serde_json::from_slice(&command.payload_json().unwrap()).unwrap();
        assert_eq!(payload, json!(["INPUT_1", "OUTPUT_1"]));
    }

    #[test]
    fn set_phones_payload() {
        let command = Command::set_phones(
            "dev1",
            vec!["38099999999".to_owned(), "380911111111".to_owned()],
        );
        assert_eq!(command.topic(), "device/dev1/phone/set");
        let payload: serde_json::Value =
            serde_json::from_slice(&command.payload_json().unwrap()).unwrap();
        assert_eq!(payload, json!({"phone_list": ["38099999999", "380911111111"]}));
    }

    #[test]
    fn plain_set_derives_direct_state() {
        let command = Command::set_pins("dev1", vec![SetPin::new(PinId::Relay1, PinState::High)]);
        let filters = command.response_filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].pin, FilterField::Exact(PinId::Relay1));
        assert_eq!(filters[0].state, FilterField::Exact(PinState::High));
        assert!(filters[0].mode.is_any());
    }

    #[test]
    fn pulsed_set_derives_inverted_state() {
        let command = Command::set_pins(
            "dev1",
            vec![SetPin::pulsed(PinId::Relay1, PinState::High, 1000)],
        );
        let filters = command.response_filters();
        assert_eq!(filters[0].state, FilterField::Exact(PinState::Low));
    }

    #[test]
    fn pin_query_derives_existence_filters() {
        let command = Command::get_pins("dev1", vec![PinId::Input1, PinId::Input2]);
        let filters = command.response_filters();
        assert_eq!(filters.len(), 2);
        for filter in &filters {
            assert!(filter.mode.is_any());
            assert!(filter.state.is_any());
        }
        assert_eq!(filters[0].pin, FilterField::Exact(PinId::Input1));
    }

    #[test]
    fn phone_list_has_no_confirmation() {
        let command = Command::set_phones("dev1", vec!["123".to_owned()]);
        assert!(command.response_filters().is_empty());
    }
}
