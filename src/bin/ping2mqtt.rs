use std::sync::Arc;

use clap::Parser;
use ping2mqtt::{
    actors::{forwarder::ForwarderHandle, prober::ping_available, supervisor::ProbeSupervisor},
    config::{Config, MqttConfig, read_hosts_file},
    mqtt::MqttPublisher,
};
use tokio::sync::mpsc;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the shared measurement channel. Sized generously so a slow
/// broker round-trip cannot stall unrelated probers through backpressure.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Hosts file (JSON or NDJSON)
    #[arg(short, default_value = "hosts")]
    file: String,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_target("ping2mqtt", LevelFilter::TRACE);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let hosts = read_hosts_file(&args.file)?;
    if hosts.is_empty() {
        anyhow::bail!("no hosts defined in {}", args.file);
    }

    if !ping_available().await {
        anyhow::bail!("\"ping\" util (from iputils) is not installed on this system");
    }

    let config = Config {
        hosts,
        mqtt: MqttConfig::from_env()?,
    };
    info!(
        "monitoring {} host(s) as {}",
        config.hosts.len(),
        config.mqtt.client_id
    );

    let (publisher, mqtt_driver) = MqttPublisher::connect(&config.mqtt);

    let (result_tx, result_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let (forwarder, forwarder_task) =
        ForwarderHandle::spawn(config.mqtt.clone(), Arc::new(publisher), result_rx);

    let supervisor = ProbeSupervisor::spawn(config.hosts.clone(), result_tx);

    let prober_handles = supervisor.handles().to_vec();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            for handle in &prober_handles {
                let _ = handle.shutdown().await;
            }
        }
    });

    supervisor.wait().await;

    // The forwarder usually exits on its own once the channel closes; the
    // command is a no-op then.
    let _ = forwarder.shutdown().await;
    if let Err(e) = forwarder_task.await {
        error!("forwarder task failed: {e}");
    }

    mqtt_driver.abort();

    Ok(())
}
