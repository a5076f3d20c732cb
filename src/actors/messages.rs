//! Message types for actor communication
//!
//! Probers push `PingEvent`s onto a shared mpsc channel drained by the
//! forwarder; each actor additionally owns an mpsc command channel for
//! control messages.

use chrono::{DateTime, Utc};

use crate::PingResult;

/// One measurement travelling from a prober to the forwarder.
///
/// Consumed exactly once. The channel preserves per-host insertion order;
/// across hosts the interleaving is arrival order.
#[derive(Debug, Clone)]
pub struct PingEvent {
    /// The measurement itself.
    pub result: PingResult,

    /// When the measurement was emitted by its prober.
    pub timestamp: DateTime<Utc>,
}

impl PingEvent {
    pub fn new(result: PingResult) -> Self {
        Self {
            result,
            timestamp: Utc::now(),
        }
    }
}

/// Commands that can be sent to a ping prober
#[derive(Debug)]
pub enum ProberCommand {
    /// Kill the probe process and stop reading.
    Shutdown,
}

/// Commands that can be sent to the publish forwarder
#[derive(Debug)]
pub enum ForwarderCommand {
    /// Stop dequeuing; in-flight dispatches are awaited before exit.
    Shutdown,
}
