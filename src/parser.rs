//! Parser for the line-oriented output of the `ping` utility.
//!
//! `ping` interleaves measurement lines with administrative text:
//!
//! ```text
//! PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
//! 64 bytes from 8.8.8.8: icmp_seq=1 ttl=116 time=15.9 ms
//! 64 bytes from 8.8.8.8: icmp_seq=2 ttl=116 time=15.9 ms
//! 64 bytes from 8.8.8.8: icmp_seq=3 ttl=116 time=19.5 ms
//!
//! --- 8.8.8.8 ping statistics ---
//! 3 packets transmitted, 3 received, 0% packet loss, time 4ms
//! rtt min/avg/max/mdev = 15.859/17.078/19.510/1.725 ms
//! ```
//!
//! Lines carrying a `time=<n> ms` token become successful measurements and
//! known banner/summary lines are dropped. Every other line is treated as a
//! lost probe: unexpected output is usually a timeout or loss report in a
//! format not modeled here, so dropping it would hide packet loss.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::PingResult;

/// Round-trip token emitted by `ping` for every answered probe.
static RTT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=([0-9]+(?:\.[0-9]+)?) ms").expect("invalid rtt pattern"));

/// Substrings of banner and statistics lines that carry no measurement.
const IGNORED_LINE_MARKERS: [&str; 4] = [
    "bytes of data.",
    "ping statistics ---",
    "packets transmitted",
    "rtt min/avg/max/mdev",
];

/// Parse one line of `ping` output for `host`.
///
/// Returns a measurement (successful or failed), or `None` when the line is
/// recognized noise.
pub fn parse_line(host: &str, line: &str) -> Option<PingResult> {
    if let Some(captures) = RTT_PATTERN.captures(line)
        && let Ok(time_ms) = captures[1].parse::<f64>()
    {
        debug!("ping {host} = {time_ms}");
        return Some(PingResult::new(host, time_ms));
    }

    if IGNORED_LINE_MARKERS
        .iter()
        .any(|marker| line.contains(marker))
    {
        return None;
    }

    debug!("ping {host} = failed");
    Some(PingResult::failed(host))
}
