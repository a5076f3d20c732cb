//! ProbeSupervisor - joint lifecycle of the per-host probers
//!
//! Spawns one prober per configured host and waits for the whole set.
//! Probers are designed to run indefinitely, so the set only finishes once
//! every prober hit a fatal condition or shutdown was requested. One host
//! going down never tears down the others.

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::HostConfig;

use super::messages::PingEvent;
use super::prober::ProberHandle;

pub struct ProbeSupervisor {
    handles: Vec<ProberHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl ProbeSupervisor {
    /// Spawn one prober per host.
    ///
    /// The shared sender is cloned into each prober and dropped here, so the
    /// measurement channel closes once the last prober stops.
    pub fn spawn(hosts: Vec<HostConfig>, result_tx: mpsc::Sender<PingEvent>) -> Self {
        let mut handles = Vec::with_capacity(hosts.len());
        let mut tasks = Vec::with_capacity(hosts.len());

        for host in hosts {
            debug!(
                "starting prober for {} with interval {}s",
                host.address, host.interval
            );
            let (handle, task) = ProberHandle::spawn(host, result_tx.clone());
            handles.push(handle);
            tasks.push(task);
        }

        Self { handles, tasks }
    }

    /// Command handles for the running probers.
    pub fn handles(&self) -> &[ProberHandle] {
        &self.handles
    }

    /// Send Shutdown to every prober.
    pub async fn shutdown(&self) {
        for handle in &self.handles {
            if let Err(e) = handle.shutdown().await {
                warn!("failed to reach prober for {}: {e}", handle.address);
            }
        }
    }

    /// Wait until every prober task has finished.
    ///
    /// In normal operation this only resolves after fatal errors on every
    /// host or an external shutdown.
    pub async fn wait(self) {
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!("prober task failed: {e}");
            }
        }
        debug!("all probers stopped");
    }
}
