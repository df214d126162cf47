//! Client for the Babel routing daemon's local control socket.
//!
//! The protocol is line-oriented ASCII over a UNIX stream socket: the daemon
//! greets with a banner terminated by a line reading `ok`, accepts one
//! command line, and answers with more lines until the next `ok`. Dump
//! output is parsed with regular expressions pinned to babeld's exact
//! format; lines that do not match the expected grammar are logged and
//! skipped so a daemon upgrade degrades loudly instead of silently.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use log::{debug, info};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Well-known control socket path on a mesh node.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/babel.sock";

const SOCKET_DEADLINE: Duration = Duration::from_secs(5);

// A full route line (id + prefix + via + nexthop + costs) stays under this;
// anything longer is not babeld talking.
const MAX_LOGGED_LINE: usize = 240;

/// Render a raw dump line for the log. Neighbor hostnames and interface
/// names come off the wire, so control bytes are swapped for `?` rather
/// than trusted, and over-long lines are cut at the longest legitimate
/// babeld line.
fn printable_line(line: &str) -> String {
    let mut out = String::new();
    for ch in line.chars().take(MAX_LOGGED_LINE) {
        out.push(if ch.is_control() { '?' } else { ch });
    }
    if line.chars().count() > MAX_LOGGED_LINE {
        out.push_str("...");
    }
    out
}

/// Babel control socket unavailable or mid-command failure.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("babel socket i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("babel socket deadline exceeded")]
    Deadline,
    #[error("babel socket closed during banner")]
    Truncated,
}

/// One neighbor line from `dump-neighbors`.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// IPv6 link-local address of the neighbor.
    pub address: String,
    /// Local interface the neighbor is reached through.
    pub interface: String,
    /// 16-bit hello reachability bitmap, as babeld's hex token.
    pub reach: String,
    pub rxcost: u32,
    pub txcost: u32,
    /// Integer round-trip estimate; babeld prints fractional values for
    /// tunnels, which are ignored rather than truncated.
    pub rtt: Option<u32>,
}

/// One route line from `dump-installed-routes`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledRoute {
    pub prefix: String,
    pub prefix_len: u8,
    pub metric: u32,
    pub nexthop: String,
}

fn neighbor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^add.*address (\S+) if (\S+) reach (\S+) .* rxcost (\S+) txcost (\S+)")
            .expect("neighbor regex")
    })
}

fn rtt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"rtt (\S+)").expect("rtt regex"))
}

fn route_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^add route .+ prefix ([^ /]+)/([0-9]+) .* installed yes .* metric ([0-9]+) .* nexthop (\S+)")
            .expect("route regex")
    })
}

/// Parse one `dump-neighbors` line. Returns `None` for lines outside the
/// neighbor grammar (interface announcements, xroutes, …).
pub fn parse_neighbor_line(line: &str) -> Option<Neighbor> {
    let caps = neighbor_regex().captures(line)?;
    let rtt = rtt_regex()
        .captures(line)
        .and_then(|caps| caps[1].parse().ok());
    Some(Neighbor {
        address: caps[1].to_string(),
        interface: caps[2].to_string(),
        reach: caps[3].to_string(),
        rxcost: caps[4].parse().unwrap_or(0),
        txcost: caps[5].parse().unwrap_or(0),
        rtt,
    })
}

/// Parse one `dump-installed-routes` line. Only installed routes match; the
/// caller applies the IPv4 and metric-65535 filters.
pub fn parse_route_line(line: &str) -> Option<InstalledRoute> {
    let caps = route_regex().captures(line)?;
    Some(InstalledRoute {
        prefix: caps[1].to_string(),
        prefix_len: caps[2].parse().ok()?,
        metric: caps[3].parse().ok()?,
        nexthop: caps[4].to_string(),
    })
}

/// Compose the Babel interface stanza for a freshly created tunnel device.
/// Costs and intervals match the per-type defaults the monitor advertises;
/// supernodes stretch the update interval to keep table churn down.
pub fn generate_tunnel_line(interface: &str, supernode: bool) -> String {
    let update_interval = if supernode { 300 } else { 120 };
    format!(
        "interface {interface} type tunnel link-quality true split-horizon false rxcost 206 hello-interval 10 update-interval {update_interval}\n"
    )
}

/// Handle on the Babel control socket. Cheap to construct; every operation
/// opens a fresh connection, mirroring the daemon's one-shot command model.
#[derive(Debug, Clone)]
pub struct BabelClient {
    socket_path: PathBuf,
}

impl BabelClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Dump the neighbor table.
    pub async fn dump_neighbors(&self) -> Result<Vec<Neighbor>, SocketError> {
        let lines = self.run_dump("dump-neighbors\n").await?;
        let mut neighbors = Vec::new();
        for line in lines {
            match parse_neighbor_line(&line) {
                Some(neighbor) => neighbors.push(neighbor),
                None => info!("babel: unmatched neighbor line: {}", printable_line(&line)),
            }
        }
        Ok(neighbors)
    }

    /// Dump installed routes.
    pub async fn dump_installed_routes(&self) -> Result<Vec<InstalledRoute>, SocketError> {
        let lines = self.run_dump("dump-installed-routes\n").await?;
        let mut routes = Vec::new();
        for line in lines {
            if let Some(route) = parse_route_line(&line) {
                routes.push(route);
            } else {
                debug!("babel: skipped route line: {}", printable_line(&line));
            }
        }
        Ok(routes)
    }

    /// Tear down a tunnel interface's routes and neighbor state.
    pub async fn remove_tunnel(&self, interface: &str) -> Result<(), SocketError> {
        self.write_command(&format!("flush interface {interface}\n"))
            .await
    }

    /// Announce a tunnel interface to the daemon.
    pub async fn add_tunnel(&self, interface: &str, supernode: bool) -> Result<(), SocketError> {
        self.write_command(&generate_tunnel_line(interface, supernode))
            .await
    }

    /// Run one dump command: connect, consume the banner through `ok`, send
    /// the command line, collect response lines until the next `ok`. The
    /// whole exchange runs under the socket deadline.
    async fn run_dump(&self, command: &str) -> Result<Vec<String>, SocketError> {
        tokio::time::timeout(SOCKET_DEADLINE, self.run_dump_inner(command))
            .await
            .map_err(|_| SocketError::Deadline)?
    }

    async fn run_dump_inner(&self, command: &str) -> Result<Vec<String>, SocketError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            match lines.next_line().await? {
                Some(line) if line == "ok" => break,
                Some(_) => continue,
                None => return Err(SocketError::Truncated),
            }
        }

        write_half.write_all(command.as_bytes()).await?;

        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line == "ok" {
                break;
            }
            out.push(line);
        }
        Ok(out)
    }

    /// Fire-and-forget mutation: the daemon does not acknowledge these, so
    /// the write itself is the whole exchange.
    async fn write_command(&self, command: &str) -> Result<(), SocketError> {
        let run = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            stream.write_all(command.as_bytes()).await?;
            Ok(())
        };
        tokio::time::timeout(SOCKET_DEADLINE, run)
            .await
            .map_err(|_| SocketError::Deadline)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_line_parses_with_rtt() {
        let line = "add neighbour 8f231a42 address fe80::5054:ff:fe12:3456 if wgc3 \
                    reach ffff ureach 0000 rxcost 206 txcost 206 rtt 26 rttcost 0 cost 206";
        let neighbor = parse_neighbor_line(line).expect("should match");
        assert_eq!(neighbor.address, "fe80::5054:ff:fe12:3456");
        assert_eq!(neighbor.interface, "wgc3");
        assert_eq!(neighbor.reach, "ffff");
        assert_eq!(neighbor.rxcost, 206);
        assert_eq!(neighbor.txcost, 206);
        assert_eq!(neighbor.rtt, Some(26));
    }

    #[test]
    fn neighbor_line_without_rtt() {
        let line = "add neighbour 8f231a42 address fe80::200:c0ff:fea8:101 if br-dtdlink \
                    reach 00ff ureach 0000 rxcost 96 txcost 96 cost 96";
        let neighbor = parse_neighbor_line(line).expect("should match");
        assert_eq!(neighbor.interface, "br-dtdlink");
        assert_eq!(neighbor.rtt, None);
    }

    #[test]
    fn fractional_rtt_is_ignored() {
        let line = "add neighbour 8f231a42 address fe80::1 if wgc0 reach ffff ureach 0000 \
                    rxcost 206 txcost 206 rtt 26.429 rttcost 1 cost 206";
        let neighbor = parse_neighbor_line(line).expect("should match");
        assert_eq!(neighbor.rtt, None);
    }

    #[test]
    fn non_neighbor_lines_do_not_match() {
        assert!(parse_neighbor_line("add interface br-dtdlink up true ipv6 fe80::1").is_none());
        assert!(parse_neighbor_line("ok").is_none());
    }

    #[test]
    fn route_line_parses() {
        let line = "add route 2f1a address fe80::1 prefix 10.51.120.3/32 from ::/0 \
                    installed yes id 8f23 metric 257 refmetric 161 via fe80::5054:ff:fe12:3456 \
                    if wgc3 nexthop fe80::5054:ff:fe12:3456";
        let route = parse_route_line(line).expect("should match");
        assert_eq!(route.prefix, "10.51.120.3");
        assert_eq!(route.prefix_len, 32);
        assert_eq!(route.metric, 257);
        assert_eq!(route.nexthop, "fe80::5054:ff:fe12:3456");
    }

    #[test]
    fn uninstalled_routes_do_not_match() {
        let line = "add route 2f1a address fe80::1 prefix 10.51.120.3/32 from ::/0 \
                    installed no id 8f23 metric 257 refmetric 161 via fe80::1 if wgc3 nexthop fe80::1";
        assert!(parse_route_line(line).is_none());
    }

    #[test]
    fn logged_lines_are_sanitized_and_capped() {
        assert_eq!(
            printable_line("add neighbour\x1b[2Jaddress fe80::1\tif wg0"),
            "add neighbour?[2Jaddress fe80::1?if wg0"
        );
        let long = "add route ".repeat(60);
        let shown = printable_line(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 240 + 3);
    }

    #[test]
    fn tunnel_line_carries_wireguard_defaults() {
        let line = generate_tunnel_line("wgc7", false);
        assert!(line.starts_with("interface wgc7 "));
        assert!(line.contains("rxcost 206"));
        assert!(line.contains("hello-interval 10"));
        assert!(line.contains("update-interval 120"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn supernode_tunnel_line_slows_updates() {
        let line = generate_tunnel_line("wgs0", true);
        assert!(line.contains("update-interval 300"));
    }
}
