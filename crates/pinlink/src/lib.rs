//! MQTT control hub for embedded pin/relay devices.
//!
//! Devices in this fleet never answer commands directly. A controller
//! publishes a command and the device, at its own pace, emits update
//! messages describing its pin and sensor state. pinlink turns that into a
//! request/response shape: it publishes commands, watches the update
//! stream, and resolves each "did it take effect?" question against the
//! updates as they arrive.
//!
//! ## Architecture
//!
//! - [`ControlHub`]: owns the connection, the per-device state cache, the
//!   pending-wait table and the update fan-out
//! - [`Command`]: closed set of device commands, each deriving the filters
//!   that would confirm it
//! - [`PinFilter`]: wildcard-capable predicate over pin updates, checked
//!   for ambiguity before any wait starts
//! - [`Correlator`]: matches the inbound stream against pending waits under
//!   a strict or accumulating completion policy
//! - [`KeyLock`]: per-topic exclusion so concurrent publishes to one topic
//!   serialize without coupling unrelated topics
//!
//! ## Example
//!
//! ```no_run
//! use pinlink::{Command, ControlHub, HubConfig, PinId, PinState, SetPin, WaitPolicy};
//! use std::time::Duration;
//!
//! # async fn run() -> pinlink::Result<()> {
//! let hub = ControlHub::connect(HubConfig::new("broker.local")).await?;
//!
//! let command = Command::set_pins(
//!     "ABCDE1234567",
//!     vec![
//!         SetPin::new(PinId::Relay1, PinState::High),
//!         SetPin::pulsed(PinId::Relay2, PinState::High, 1000),
//!     ],
//! );
//! let confirmed = hub
//!     .send_wait(&command, WaitPolicy::Accumulate, Some(Duration::from_secs(10)))
//!     .await?;
//! for pin in confirmed {
//!     println!("{} -> {}", pin.pin, pin.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod correlate;
pub mod error;
pub mod filter;
pub mod hub;
pub mod lock;
pub mod topic;
pub mod transport;
pub mod types;

pub use command::{Command, SetPin};
pub use config::{HubConfig, MqttConfig};
pub use correlate::{Correlator, WaitHandle, WaitPolicy};
pub use error::{Error, Result};
pub use filter::{check_conflicts, FilterField, PinFilter};
pub use hub::{ControlHub, UpdateEvent};
pub use lock::{KeyGuard, KeyLock};
pub use transport::{InboundMessage, Transport, TransportError};
#[cfg(feature = "mqtt")]
pub use transport::MqttTransport;
pub use types::{
    CallUpdate, DeviceCache, PinId, PinMode, PinState, PinUpdate, RawUpdate, VoiceCallState,
};
