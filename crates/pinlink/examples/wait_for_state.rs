//! Block until a device reports a specific pin state, no command involved.

use pinlink::{ControlHub, HubConfig, PinFilter, PinId, PinState, WaitPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let broker = args.next().unwrap_or_else(|| "localhost".to_owned());
    let device_id = args.next().unwrap_or_else(|| "C89FABE0F908".to_owned());

    let hub = ControlHub::connect(HubConfig::new(broker)).await?;

    let filters = vec![
        PinFilter::for_pin(PinId::Input1).with_state(PinState::High),
        PinFilter::for_pin(PinId::Relay1).with_state(PinState::Low),
    ];

    // No timeout: wait as long as it takes.
    let updates = hub
        .wait_for(&device_id, filters, WaitPolicy::Accumulate, None)
        .await?;

    for update in updates {
        println!("{} reached {}", update.pin, update.state);
    }

    hub.stop().await?;
    Ok(())
}
