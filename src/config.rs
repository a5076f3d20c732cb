//! Configuration for the ping→MQTT bridge.
//!
//! Everything is materialized into plain structs once at startup and handed
//! to the components that need it: hosts come from a JSON or NDJSON file,
//! broker settings from `MQTT_*` environment variables (a `.env` file is
//! honored by the binary).

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{debug, info};

/// Everything the process needs, constructed once in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub hosts: Vec<HostConfig>,
    pub mqtt: MqttConfig,
}

/// One ping target.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct HostConfig {
    /// Target address (IP or hostname), handed to `ping` verbatim.
    #[serde(alias = "host")]
    pub address: String,

    /// Seconds between probes; also the minimum spacing of emitted results.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Network interface to bind (`ping -I`).
    #[serde(default)]
    pub interface: Option<String>,
}

fn default_interval() -> f64 {
    1.0
}

impl HostConfig {
    /// Reject entries that cannot drive a probe process.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.address.is_empty() {
            bail!("host entry with empty address");
        }
        if self.interval <= 0.0 {
            bail!(
                "host {} has non-positive interval {}",
                self.address,
                self.interval
            );
        }
        Ok(())
    }
}

/// Broker connection and topic settings, read from `MQTT_*` env vars.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub base_topic: String,
    pub failed_ping_payload: String,
}

impl MqttConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env::var("MQTT_HOST").context("MQTT_HOST is not set")?;
        let port = match env::var("MQTT_PORT") {
            Ok(port) => port.parse().context("MQTT_PORT is not a valid port")?,
            Err(_) => 1883,
        };

        Ok(Self {
            host,
            port,
            username: env::var("MQTT_USERNAME").ok(),
            password: env::var("MQTT_PASSWORD").ok(),
            client_id: env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| default_client_id()),
            base_topic: env::var("MQTT_BASE_TOPIC").unwrap_or_else(|_| String::from("ping")),
            failed_ping_payload: env::var("MQTT_FAILED_PING_PAYLOAD")
                .unwrap_or_else(|_| String::from("-1")),
        })
    }

    /// Destination topic for a host: base topic + `/` + suffix, with any
    /// repeated separators collapsed.
    pub fn format_topic(&self, suffix: &str) -> String {
        let mut topic = format!("{}/{}", self.base_topic, suffix);
        while topic.contains("//") {
            topic = topic.replace("//", "/");
        }
        topic
    }
}

/// Default broker client id: `ping2mqtt@<hostname>_<random token>`.
///
/// Invoked exactly once at configuration construction when `MQTT_CLIENT_ID`
/// is not set.
pub fn default_client_id() -> String {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    format!("ping2mqtt@{hostname}_{}", uuid::Uuid::new_v4())
}

/// Load the host list.
///
/// `.json` files hold an array of host objects, `.ndjson` files one object
/// per line. A bare name probes `<name>.ndjson` first, then `<name>.json`.
pub fn read_hosts_file(path: &str) -> anyhow::Result<Vec<HostConfig>> {
    if path.ends_with(".ndjson") {
        return parse_ndjson_file(Path::new(path));
    }
    if path.ends_with(".json") {
        return parse_json_file(Path::new(path));
    }

    let ndjson = PathBuf::from(format!("{path}.ndjson"));
    if ndjson.exists() {
        return parse_ndjson_file(&ndjson);
    }
    parse_json_file(&PathBuf::from(format!("{path}.json")))
}

fn parse_json_file(path: &Path) -> anyhow::Result<Vec<HostConfig>> {
    debug!("loading hosts file {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("no hosts file found at {}", path.display()))?;
    let hosts: Vec<HostConfig> = serde_json::from_str(&content)
        .with_context(|| format!("invalid format of hosts file {}", path.display()))?;

    validate_hosts(hosts)
}

fn parse_ndjson_file(path: &Path) -> anyhow::Result<Vec<HostConfig>> {
    debug!("loading hosts file {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("no hosts file found at {}", path.display()))?;
    let hosts = content
        .lines()
        .map(|line| serde_json::from_str(line.trim()))
        .collect::<Result<Vec<HostConfig>, _>>()
        .with_context(|| format!("invalid format of hosts file {}", path.display()))?;

    validate_hosts(hosts)
}

fn validate_hosts(hosts: Vec<HostConfig>) -> anyhow::Result<Vec<HostConfig>> {
    for host in &hosts {
        host.validate()?;
        info!(
            "parsed host {} (interval {}s{})",
            host.address,
            host.interval,
            host.interface
                .as_deref()
                .map(|interface| format!(", interface {interface}"))
                .unwrap_or_default()
        );
    }
    Ok(hosts)
}
