//! Neighbor reachability probing.
//!
//! Probing shells out to the system `ping6` (one echo, one-second wait,
//! bound to the link device) because link-local traffic must leave through
//! the exact interface the neighbor lives on. The subprocess sits behind
//! [`Prober`] so the monitor's tick logic can be exercised with a scripted
//! fake.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

/// Probe subprocess failure.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to run ping6: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("no echo reply")]
    NoReply,
}

/// One round-trip probe of a neighbor's link-local address.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Ping `ipv6ll` through `device`. Returns the round-trip time in
    /// seconds on success.
    async fn ping(&self, device: &str, ipv6ll: &str) -> Result<f64, ProbeError>;
}

fn echo_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time=(\S+) ms").expect("echo time regex"))
}

/// Extract the echo round-trip time from ping6 output, in seconds.
pub fn parse_echo_time(output: &str) -> Option<f64> {
    let caps = echo_time_regex().captures(output)?;
    let millis: f64 = caps[1].parse().ok()?;
    Some(millis / 1000.0)
}

/// The real thing: `ping6 -c 1 -W <timeout> -I <device> <ipv6ll>`.
#[derive(Debug, Clone)]
pub struct Ping6Prober {
    timeout: Duration,
}

impl Ping6Prober {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Prober for Ping6Prober {
    async fn ping(&self, device: &str, ipv6ll: &str) -> Result<f64, ProbeError> {
        let timeout_secs = self.timeout.as_secs().max(1).to_string();
        let output = Command::new("ping6")
            .args(["-c", "1", "-W", timeout_secs.as_str(), "-I", device, ipv6ll])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::NoReply);
        }

        parse_echo_time(&String::from_utf8_lossy(&output.stdout)).ok_or(ProbeError::NoReply)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_echo_time;

    #[test]
    fn echo_time_parses_to_seconds() {
        let output = "64 bytes from fe80::200:c0ff:fea8:101%br-dtdlink: icmp_seq=1 ttl=64 time=12.4 ms";
        assert_eq!(parse_echo_time(output), Some(0.0124));
    }

    #[test]
    fn missing_echo_time_yields_none() {
        assert_eq!(parse_echo_time("1 packets transmitted, 0 received"), None);
    }
}
