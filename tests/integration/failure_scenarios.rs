//! Failure and chaos tests for the measurement pipeline
//!
//! These tests verify that the system handles failures gracefully:
//! - One probe process dying does not interrupt the other hosts
//! - Sink failures do not stop the forwarder
//! - Channel closure terminates the forwarder cleanly

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ping2mqtt::PingResult;
use ping2mqtt::actors::forwarder::ForwarderHandle;
use ping2mqtt::actors::messages::PingEvent;
use ping2mqtt::actors::prober::ProberHandle;
use ping2mqtt::mqtt::Publisher;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::helpers::*;

#[tokio::test]
async fn prober_death_does_not_stop_other_probers() {
    let publisher = Arc::new(RecordingPublisher::default());
    let (event_tx, event_rx) = mpsc::channel(64);
    let (_forwarder, _forwarder_task) =
        ForwarderHandle::spawn(create_test_mqtt_config(), publisher.clone(), event_rx);

    // One stub dies after a single line, the other keeps emitting.
    let dying =
        stub_probe_command("printf '64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=1.0 ms\\n'");
    let living = stub_probe_command(
        "while true; do printf '64 bytes from 10.0.0.2: icmp_seq=1 ttl=64 time=2.0 ms\\n'; sleep 0.2; done",
    );

    let (_dying_prober, dying_task) = ProberHandle::spawn_with_command(
        create_test_host("10.0.0.1", 0.1),
        dying,
        event_tx.clone(),
    );
    let (living_prober, living_task) =
        ProberHandle::spawn_with_command(create_test_host("10.0.0.2", 0.1), living, event_tx);

    // The short-lived probe process exits; its prober stops.
    timeout(Duration::from_secs(2), dying_task)
        .await
        .expect("dying prober must stop")
        .unwrap();

    // The surviving host keeps delivering measurements afterwards.
    let seen_before = publisher.payloads_for("ping/10.0.0.2").len();
    assert!(
        wait_until(
            || publisher.payloads_for("ping/10.0.0.2").len() > seen_before,
            Duration::from_secs(2)
        )
        .await,
        "surviving prober must keep publishing after its sibling died"
    );

    living_prober.shutdown().await.unwrap();
    living_task.await.unwrap();
}

#[tokio::test]
async fn sink_failure_is_contained_to_single_messages() {
    /// Rejects the first publish, accepts the rest.
    struct FlakyPublisher {
        calls: Mutex<u32>,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(&self, _topic: &str, payload: &str) -> anyhow::Result<()> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                anyhow::bail!("broker unavailable");
            }
            self.delivered.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    let publisher = Arc::new(FlakyPublisher {
        calls: Mutex::new(0),
        delivered: Mutex::new(vec![]),
    });
    let (event_tx, event_rx) = mpsc::channel(64);
    let (_forwarder, forwarder_task) =
        ForwarderHandle::spawn(create_test_mqtt_config(), publisher.clone(), event_rx);

    event_tx
        .send(PingEvent::new(PingResult::new("8.8.8.8", 1.0)))
        .await
        .unwrap();
    event_tx
        .send(PingEvent::new(PingResult::new("8.8.8.8", 2.0)))
        .await
        .unwrap();
    drop(event_tx);

    timeout(Duration::from_secs(2), forwarder_task)
        .await
        .unwrap()
        .unwrap();

    // First dispatch was rejected and dropped; the pipeline carried on.
    assert_eq!(*publisher.calls.lock().unwrap(), 2);
    assert_eq!(publisher.delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn forwarder_exits_when_channel_closes() {
    let publisher = Arc::new(RecordingPublisher::default());
    let (event_tx, event_rx) = mpsc::channel::<PingEvent>(16);
    let (_forwarder, forwarder_task) =
        ForwarderHandle::spawn(create_test_mqtt_config(), publisher, event_rx);

    drop(event_tx);

    timeout(Duration::from_secs(2), forwarder_task)
        .await
        .expect("forwarder must exit once all producers are gone")
        .unwrap();
}

#[tokio::test]
async fn shutdown_kills_a_hanging_probe_process() {
    let (event_tx, _event_rx) = mpsc::channel(16);
    let command = stub_probe_command("sleep 600");
    let (prober, prober_task) =
        ProberHandle::spawn_with_command(create_test_host("10.0.0.1", 1.0), command, event_tx);

    prober.shutdown().await.unwrap();

    timeout(Duration::from_secs(2), prober_task)
        .await
        .expect("prober must stop without waiting for its child")
        .unwrap();
}

#[tokio::test]
async fn backpressured_prober_does_not_lose_queued_measurements() {
    // Channel of capacity 1 with no consumer attached yet.
    let (event_tx, mut event_rx) = mpsc::channel(1);
    let command = stub_probe_command(
        "printf '64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=1.0 ms\\n'; \
         sleep 0.3; \
         printf '64 bytes from 10.0.0.1: icmp_seq=2 ttl=64 time=2.0 ms\\n'; \
         sleep 60",
    );
    let (prober, prober_task) =
        ProberHandle::spawn_with_command(create_test_host("10.0.0.1", 0.1), command, event_tx);

    // Let both lines arrive while nothing is draining the channel.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let first = timeout(Duration::from_secs(1), event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = timeout(Duration::from_secs(1), event_rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.result.time_ms, 1.0);
    assert_eq!(second.result.time_ms, 2.0);

    prober.shutdown().await.unwrap();
    prober_task.await.unwrap();
}
