//! Actor-based measurement pipeline
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │   main          │
//!                  └────────┬────────┘
//!                           │ spawns
//!              ┌────────────┼────────────┐
//!              │            │            │
//!      ┌───────▼───────┐    │    ┌───────▼───────┐
//!      │ Prober-1      │   ...   │ Prober-N      │
//!      │ (ping host 1) │         │ (ping host N) │
//!      └───────┬───────┘         └───────┬───────┘
//!              │       PingEvent         │
//!              └────────────┬────────────┘
//!                           │
//!                 ┌─────────▼──────────┐
//!                 │  mpsc channel      │ (FIFO, multi-producer)
//!                 └─────────┬──────────┘
//!                           │ single consumer
//!                 ┌─────────▼──────────┐
//!                 │  PublishForwarder  │ ──► MQTT broker
//!                 └────────────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **PingProberActor**: owns one `ping` child process and parses its output
//! - **ProbeSupervisor**: joint lifecycle of all per-host probers
//! - **PublishForwarderActor**: drains the channel into the publish sink
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel (Shutdown)
//! 2. **Measurements**: one shared mpsc channel, probers → forwarder

pub mod forwarder;
pub mod messages;
pub mod prober;
pub mod supervisor;
