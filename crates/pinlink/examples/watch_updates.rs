//! Print every update envelope the fleet emits.

use pinlink::{ControlHub, HubConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let broker = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "localhost".to_owned());

    let hub = ControlHub::connect(HubConfig::new(broker)).await?;
    let mut updates = hub.subscribe_updates();

    while let Ok(event) = updates.recv().await {
        println!("update from {}:", event.device_id);
        if let Some(pins) = &event.update.pins {
            for pin in pins {
                println!("  {} mode={} state={}", pin.pin, pin.mode, pin.state);
            }
        }
        if let Some(call) = &event.update.call {
            println!("  call from {} (valid: {})", call.phone_num, call.valid);
        }
        if let Some(t) = event.update.temperature_on_board {
            println!("  board temperature: {:.1}", t);
        }
        if let Some(t) = event.update.temperature_outdoor {
            println!("  outdoor temperature: {:.1}", t);
        }
    }

    Ok(())
}
