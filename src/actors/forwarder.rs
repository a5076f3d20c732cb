//! PublishForwarderActor - drains the measurement channel into the sink
//!
//! Single consumer of the shared channel. Every measurement is dispatched on
//! its own task inside a `JoinSet`, so a slow broker round-trip never delays
//! the next dequeue and shutdown can await everything still in flight.
//!
//! ## Message Flow
//!
//! ```text
//! shared channel → topic + payload → JoinSet dispatch → Publisher
//!     ↑
//!     └─── Commands (Shutdown)
//! ```
//!
//! A failed dispatch is logged and discarded; it never stops the loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, instrument, trace, warn};

use crate::config::MqttConfig;
use crate::mqtt::Publisher;

use super::messages::{ForwarderCommand, PingEvent};

pub struct PublishForwarderActor {
    /// Broker settings (topic layout, failure payload)
    mqtt: MqttConfig,

    /// The publish sink
    publisher: Arc<dyn Publisher>,

    /// Shared measurement channel (single consumer)
    event_rx: mpsc::Receiver<PingEvent>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<ForwarderCommand>,

    /// In-flight publish dispatches
    dispatches: JoinSet<()>,
}

impl PublishForwarderActor {
    pub fn new(
        mqtt: MqttConfig,
        publisher: Arc<dyn Publisher>,
        event_rx: mpsc::Receiver<PingEvent>,
        command_rx: mpsc::Receiver<ForwarderCommand>,
    ) -> Self {
        Self {
            mqtt,
            publisher,
            event_rx,
            command_rx,
            dispatches: JoinSet::new(),
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command arrives or the measurement channel
    /// closes (all probers gone); either way the remaining in-flight
    /// dispatches are awaited before the actor stops.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting publish forwarder");

        loop {
            tokio::select! {
                // Next measurement off the shared channel
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event),
                        None => {
                            debug!("measurement channel closed");
                            break;
                        }
                    }
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ForwarderCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                // Reap finished dispatches
                Some(result) = self.dispatches.join_next() => {
                    if let Err(e) = result {
                        error!("publish task failed: {e}");
                    }
                }
            }
        }

        while let Some(result) = self.dispatches.join_next().await {
            if let Err(e) = result {
                error!("publish task failed: {e}");
            }
        }

        debug!("publish forwarder stopped");
    }

    /// Issue the publish for one measurement without blocking the drain loop.
    fn dispatch(&mut self, event: PingEvent) {
        let topic = self.mqtt.format_topic(&event.result.host);
        let payload = if event.result.is_failed() {
            self.mqtt.failed_ping_payload.clone()
        } else {
            event.result.time_ms.to_string()
        };

        trace!(
            "publishing {topic} = {payload} (measured at {})",
            event.timestamp
        );

        let publisher = Arc::clone(&self.publisher);
        self.dispatches.spawn(async move {
            if let Err(e) = publisher.publish(&topic, &payload).await {
                warn!("failed to publish to {topic}: {e:#}");
            }
        });
    }
}

/// Handle for controlling the PublishForwarderActor
#[derive(Clone)]
pub struct ForwarderHandle {
    /// Command sender
    sender: mpsc::Sender<ForwarderCommand>,
}

impl ForwarderHandle {
    /// Spawn the forwarder as a tokio task.
    pub fn spawn(
        mqtt: MqttConfig,
        publisher: Arc<dyn Publisher>,
        event_rx: mpsc::Receiver<PingEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = PublishForwarderActor::new(mqtt, publisher, event_rx, cmd_rx);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Stop the forwarder; in-flight dispatches are awaited first.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ForwarderCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
