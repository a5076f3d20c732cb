//! MQTT publish sink.
//!
//! The forwarder only ever sees the [`Publisher`] trait; [`MqttPublisher`]
//! is the production implementation backed by a `rumqttc` client whose event
//! loop is driven by a background task.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::config::MqttConfig;

/// Capability handed to the forwarder: deliver one payload to one topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

/// Publisher backed by a live broker connection.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Build the client and spawn its event-loop driver task.
    ///
    /// The driver keeps the session alive (keep-alives, acks, reconnects);
    /// connection errors are logged and retried with a short backoff.
    pub fn connect(config: &MqttConfig) -> (Self, JoinHandle<()>) {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.host.clone(),
            config.port,
        );
        options.set_keep_alive(Duration::from_secs(15));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("MQTT connected");
                    }
                    Ok(event) => {
                        trace!("MQTT event: {event:?}");
                    }
                    Err(e) => {
                        warn!("MQTT connection error: {e}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        (Self { client }, driver)
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .context("failed to hand message to MQTT client")?;
        Ok(())
    }
}
