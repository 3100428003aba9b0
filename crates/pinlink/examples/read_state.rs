//! Query two input pins and print the reported state and the cache.

use std::time::Duration;

use pinlink::{Command, ControlHub, HubConfig, PinId, WaitPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let broker = args.next().unwrap_or_else(|| "localhost".to_owned());
    let device_id = args.next().unwrap_or_else(|| "ABCDE1234567".to_owned());

    let hub = ControlHub::connect(HubConfig::new(broker)).await?;

    let command = Command::get_pins(&device_id, vec![PinId::Input1, PinId::Input2]);
    let reported = hub
        .send_wait(&command, WaitPolicy::Strict, Some(Duration::from_secs(10)))
        .await?;

    for pin in &reported {
        println!("{}: mode={} state={}", pin.pin, pin.mode, pin.state);
    }

    if let Some(cache) = hub.device_cache(&device_id).await {
        println!("cached records: {}", cache.pins.len());
        if let Some(t) = cache.temperature_on_board {
            println!("board temperature: {:.1}", t);
        }
    }

    hub.stop().await?;
    Ok(())
}
