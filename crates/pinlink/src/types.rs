//! Wire-level types for device pin updates.
//!
//! Field names and integer values are fixed by the device firmware and must
//! not change: pins travel as their `RELAY_1`-style names, modes and states
//! as small integers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Physical channel on a device board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinId {
    #[serde(rename = "RELAY_1")]
    Relay1,
    #[serde(rename = "RELAY_2")]
    Relay2,
    #[serde(rename = "OUTPUT_1")]
    Output1,
    #[serde(rename = "OUTPUT_2")]
    Output2,
    #[serde(rename = "INPUT_1")]
    Input1,
    #[serde(rename = "INPUT_2")]
    Input2,
}

impl PinId {
    /// The identifier as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relay1 => "RELAY_1",
            Self::Relay2 => "RELAY_2",
            Self::Output1 => "OUTPUT_1",
            Self::Output2 => "OUTPUT_2",
            Self::Input1 => "INPUT_1",
            Self::Input2 => "INPUT_2",
        }
    }
}

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Electrical pin configuration, as reported by the firmware.
///
/// The values are the firmware's own mode constants (a bitmask of input,
/// output, pull and drain flags) and are serialized as plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum PinMode {
    Input,
    Output,
    Pullup,
    InputPullup,
    Pulldown,
    InputPulldown,
    OpenDrain,
    OutputOpenDrain,
    Analog,
    Disabled,
}

impl From<PinMode> for i16 {
    fn from(mode: PinMode) -> i16 {
        match mode {
            PinMode::Input => 0x01,
            PinMode::Output => 0x03,
            PinMode::Pullup => 0x04,
            PinMode::InputPullup => 0x05,
            PinMode::Pulldown => 0x08,
            PinMode::InputPulldown => 0x09,
            PinMode::OpenDrain => 0x10,
            PinMode::OutputOpenDrain => 0x13,
            PinMode::Analog => 0xC0,
            PinMode::Disabled => -1,
        }
    }
}

impl TryFrom<i16> for PinMode {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Input),
            0x03 => Ok(Self::Output),
            0x04 => Ok(Self::Pullup),
            0x05 => Ok(Self::InputPullup),
            0x08 => Ok(Self::Pulldown),
            0x09 => Ok(Self::InputPulldown),
            0x10 => Ok(Self::OpenDrain),
            0x13 => Ok(Self::OutputOpenDrain),
            0xC0 => Ok(Self::Analog),
            -1 => Ok(Self::Disabled),
            other => Err(format!("unknown pin mode: {}", other)),
        }
    }
}

impl std::fmt::Display for PinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Pullup => "pullup",
            Self::InputPullup => "input-pullup",
            Self::Pulldown => "pulldown",
            Self::InputPulldown => "input-pulldown",
            Self::OpenDrain => "open-drain",
            Self::OutputOpenDrain => "output-open-drain",
            Self::Analog => "analog",
            Self::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Logic level of a pin. Serialized as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PinState {
    Low,
    High,
}

impl From<PinState> for u8 {
    fn from(state: PinState) -> u8 {
        match state {
            PinState::Low => 0,
            PinState::High => 1,
        }
    }
}

impl TryFrom<u8> for PinState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::High),
            other => Err(format!("unknown pin state: {}", other)),
        }
    }
}

impl std::ops::Not for PinState {
    type Output = Self;

    /// The opposite level, used to derive the resting state a pulsed pin
    /// reverts to.
    fn not(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl std::fmt::Display for PinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => f.write_str("LOW"),
            Self::High => f.write_str("HIGH"),
        }
    }
}

/// Voice-call trigger level associated with certain pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum VoiceCallState {
    Low,
    High,
    Disabled,
}

impl From<VoiceCallState> for i16 {
    fn from(state: VoiceCallState) -> i16 {
        match state {
            VoiceCallState::Low => 0,
            VoiceCallState::High => 1,
            VoiceCallState::Disabled => -1,
        }
    }
}

impl TryFrom<i16> for VoiceCallState {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::High),
            -1 => Ok(Self::Disabled),
            other => Err(format!("unknown voice call state: {}", other)),
        }
    }
}

/// One pin's reported state inside an update envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinUpdate {
    pub pin: PinId,
    pub mode: PinMode,
    pub state: PinState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_call_state: Option<VoiceCallState>,
}

impl PinUpdate {
    pub fn new(pin: PinId, mode: PinMode, state: PinState) -> Self {
        Self {
            pin,
            mode,
            state,
            voice_call_state: None,
        }
    }
}

/// Call-validity record carried in some envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallUpdate {
    pub phone_num: String,
    pub valid: bool,
}

/// One decoded inbound update message.
///
/// Every field may be absent; devices routinely send partial envelopes
/// (temperature only, a single pin, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<Vec<PinUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_on_board: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_outdoor: Option<f64>,
}

impl RawUpdate {
    /// Envelope carrying only pin records.
    pub fn with_pins(pins: Vec<PinUpdate>) -> Self {
        Self {
            pins: Some(pins),
            ..Self::default()
        }
    }
}

/// Latest known state of one device, merged field-wise from its updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCache {
    /// Most recent record per pin; later records overwrite earlier ones.
    #[serde(default)]
    pub pins: HashMap<PinId, PinUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_on_board: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_outdoor: Option<f64>,
}

impl DeviceCache {
    /// Apply one envelope. Pin records overwrite their slot; temperatures
    /// overwrite only when the envelope carries a value.
    pub fn merge(&mut self, update: &RawUpdate) {
        if let Some(pins) = &update.pins {
            for pin in pins {
                self.pins.insert(pin.pin, pin.clone());
            }
        }
        if let Some(t) = update.temperature_on_board {
            self.temperature_on_board = Some(t);
        }
        if let Some(t) = update.temperature_outdoor {
            self.temperature_outdoor = Some(t);
        }
    }

    /// Latest record for a pin, if one has been observed.
    pub fn pin(&self, pin: PinId) -> Option<&PinUpdate> {
        self.pins.get(&pin)
    }
}
