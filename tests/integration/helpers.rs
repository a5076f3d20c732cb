//! Helper functions for integration tests

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ping2mqtt::config::{HostConfig, MqttConfig};
use ping2mqtt::mqtt::Publisher;
use tokio::process::Command;

pub fn create_test_host(address: &str, interval: f64) -> HostConfig {
    HostConfig {
        address: address.to_string(),
        interval,
        interface: None,
    }
}

pub fn create_test_mqtt_config() -> MqttConfig {
    MqttConfig {
        host: String::from("localhost"),
        port: 1883,
        username: None,
        password: None,
        client_id: String::from("test-client"),
        base_topic: String::from("ping"),
        failed_ping_payload: String::from("-1"),
    }
}

/// Probe command stub: runs a shell script instead of the real `ping`.
pub fn stub_probe_command(script: &str) -> Command {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Poll `predicate` every 10ms until it holds or `limit` elapses.
pub async fn wait_until(predicate: impl Fn() -> bool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Publisher that records every (topic, payload) pair it receives.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn payloads_for(&self, topic: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
