//! PingProberActor - supervises one `ping` process per host
//!
//! Each configured host gets its own prober actor. The actor spawns a
//! long-lived `ping` child process, reads its stdout line by line, parses
//! every line into a measurement and pushes rate-limited results onto the
//! shared channel.
//!
//! ## Message Flow
//!
//! ```text
//! ping stdout line → parse → rate limit → PingEvent → shared channel
//!     ↑
//!     └─── Commands (Shutdown)
//! ```
//!
//! A child process that exits is a fatal condition for this host only: the
//! exit status is logged and the actor stops. There is no restart at this
//! layer.

use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use crate::config::HostConfig;
use crate::parser::parse_line;

use super::messages::{PingEvent, ProberCommand};

/// Minimum-spacing gate for emitted measurements.
///
/// `ping` can flush buffered lines much faster than the configured cadence;
/// at most one measurement per interval may pass. The first observation
/// always passes.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_emitted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
        }
    }

    /// Record an observation at `now`; returns whether it should be emitted.
    ///
    /// The clock only advances on actual emission, so suppressed
    /// observations never widen the window.
    pub fn try_emit_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_emitted
            && now.duration_since(last) < self.interval
        {
            return false;
        }
        self.last_emitted = Some(now);
        true
    }

    pub fn try_emit(&mut self) -> bool {
        self.try_emit_at(Instant::now())
    }
}

/// Build the `ping` invocation for a host.
///
/// `LC_ALL=C` pins the decimal separator to `.` so `time=15.9 ms` reads the
/// same in every locale.
pub fn assemble_ping_command(config: &HostConfig) -> Command {
    let mut command = Command::new("ping");
    command
        .arg(&config.address)
        .arg("-i")
        .arg(config.interval.to_string());
    if let Some(interface) = &config.interface {
        command.arg("-I").arg(interface);
    }
    command
        .env("LC_ALL", "C")
        .env("LANG", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Check that the `ping` utility (from iputils) can be spawned at all.
pub async fn ping_available() -> bool {
    Command::new("ping")
        .arg("-V")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .is_ok()
}

/// Actor that owns the probe process for a single host.
pub struct PingProberActor {
    /// Host configuration
    config: HostConfig,

    /// Prepared probe invocation, spawned once at the start of `run`
    command: Command,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<ProberCommand>,

    /// Shared channel towards the forwarder
    result_tx: mpsc::Sender<PingEvent>,

    /// Emission gate for this host
    limiter: RateLimiter,
}

impl PingProberActor {
    pub fn new(
        config: HostConfig,
        command: Command,
        command_rx: mpsc::Receiver<ProberCommand>,
        result_tx: mpsc::Sender<PingEvent>,
    ) -> Self {
        let limiter = RateLimiter::new(Duration::from_secs_f64(config.interval));

        Self {
            config,
            command,
            command_rx,
            result_tx,
            limiter,
        }
    }

    /// Run the actor's main loop
    ///
    /// This is the entry point for the actor. It runs until:
    /// - The probe process exits (per-host-fatal, logged)
    /// - A Shutdown command is received
    #[instrument(skip(self), fields(host = %self.config.address))]
    pub async fn run(mut self) {
        debug!("starting ping prober");

        let mut child = match self.command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("failed to spawn probe process: {e}");
                return;
            }
        };

        let stdout = child.stdout.take().expect("child stdout was piped");
        let mut lines = BufReader::new(stdout).lines();
        drain_stderr(&mut child);

        loop {
            tokio::select! {
                // Next line of probe output
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => self.handle_line(line.trim()).await,

                        // Stream ended - the process is gone
                        Ok(None) => {
                            match child.wait().await {
                                Ok(status) => error!("probe process exited unexpectedly ({status})"),
                                Err(e) => error!("probe process exited, wait failed: {e}"),
                            }
                            break;
                        }

                        Err(e) => {
                            error!("failed to read from probe process: {e}");
                            break;
                        }
                    }
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ProberCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = child.kill().await {
            trace!("probe process already gone: {e}");
        }

        debug!("ping prober stopped");
    }

    /// Parse one line and emit the measurement unless rate-limited.
    async fn handle_line(&mut self, line: &str) {
        trace!("probe line received: {line:?}");

        let Some(result) = parse_line(&self.config.address, line) else {
            return;
        };

        // A suppressed or noise line does not touch the rate-limit clock.
        if !self.limiter.try_emit() {
            trace!("measurement suppressed by rate limit");
            return;
        }

        if self.result_tx.send(PingEvent::new(result)).await.is_err() {
            warn!("result channel closed, measurement dropped");
        }
    }
}

/// Log the child's stderr from a side task so the pipe never fills up.
fn drain_stderr(child: &mut Child) {
    let Some(stderr) = child.stderr.take() else {
        return;
    };

    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!("probe stderr: {line}");
        }
    });
}

/// Handle for controlling a PingProberActor
///
/// The handle can be cloned and shared; the join handle returned alongside
/// it resolves when the actor has stopped.
#[derive(Clone)]
pub struct ProberHandle {
    /// Command sender
    sender: mpsc::Sender<ProberCommand>,

    /// Address of the probed host
    pub address: String,
}

impl ProberHandle {
    /// Spawn a prober with the standard `ping` invocation for `config`.
    pub fn spawn(
        config: HostConfig,
        result_tx: mpsc::Sender<PingEvent>,
    ) -> (Self, JoinHandle<()>) {
        let command = assemble_ping_command(&config);
        Self::spawn_with_command(config, command, result_tx)
    }

    /// Spawn a prober with an explicit probe command.
    ///
    /// Lets tests substitute a stub process for the real `ping` binary. The
    /// command must have stdout piped.
    pub fn spawn_with_command(
        config: HostConfig,
        command: Command,
        result_tx: mpsc::Sender<PingEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let address = config.address.clone();

        let actor = PingProberActor::new(config, command, cmd_rx, result_tx);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                address,
            },
            task,
        )
    }

    /// Ask the prober to kill its child process and stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ProberCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
