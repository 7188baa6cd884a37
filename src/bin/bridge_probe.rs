//! Bridge connectivity probe
//!
//! Connects to a running bridge the way an execution agent would, sends a
//! heartbeat, reports status and prints the bridge's view of the session.
//!
//! Usage: `bridge_probe [host:port]` (defaults to the configured address)

use anyhow::Context;

use signal_bridge::client::BridgeClient;
use signal_bridge::config::{self, constants, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let address = match std::env::args().nth(1) {
        Some(address) => address,
        None => {
            let path = constants::config_path();
            let mut config = if path.exists() {
                config::load_config(&path)?
            } else {
                AppConfig::default()
            };
            constants::apply_env_overrides(&mut config);
            config.bridge.address()
        }
    };

    println!("Connecting to bridge at {} ...", address);
    let mut client = BridgeClient::connect(address.as_str())
        .await
        .with_context(|| format!("Bridge not reachable at {}", address))?;

    let ack = client.heartbeat().await.context("HEARTBEAT failed")?;
    println!("HEARTBEAT ok: server time {}, queue size {}", ack.timestamp, ack.queue_size);

    client
        .send_status("PROBE", "bridge_probe connectivity check")
        .await
        .context("SEND_STATUS failed")?;
    println!("SEND_STATUS ok");

    let status = client.bridge_status().await.context("GET_BRIDGE_STATUS failed")?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
