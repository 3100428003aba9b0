//! Drive two relays on one device: one set directly, one pulsed.
//!
//! ```sh
//! cargo run --example set_pins -- <broker> <device_id>
//! ```

use std::time::Duration;

use pinlink::{Command, ControlHub, HubConfig, PinId, PinState, SetPin, WaitPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let broker = args.next().unwrap_or_else(|| "localhost".to_owned());
    let device_id = args.next().unwrap_or_else(|| "ABCDE1234567".to_owned());

    let hub = ControlHub::connect(HubConfig::new(broker)).await?;

    let command = Command::set_pins(
        &device_id,
        vec![
            SetPin::new(PinId::Relay1, PinState::Low),
            SetPin::pulsed(PinId::Relay2, PinState::High, 1000),
        ],
    );

    let confirmed = hub
        .send_wait(&command, WaitPolicy::Accumulate, Some(Duration::from_secs(10)))
        .await?;

    for pin in confirmed {
        println!("{} settled at {}", pin.pin, pin.state);
    }

    hub.stop().await?;
    Ok(())
}
