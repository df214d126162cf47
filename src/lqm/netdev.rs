//! Kernel-facing collaborators: interface counters and addresses.
//!
//! Both are traits so the tick phases can run against canned data in tests.
//! The system implementations read `/sys/class/net` for transmit counters
//! and walk `getifaddrs(3)` for interface IPv4 addresses.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// Transmit counters for one kernel link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub name: String,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

/// Source of per-link transmit counters.
pub trait LinkCounterSource: Send + Sync {
    fn link_stats(&self) -> Vec<LinkStats>;
}

/// Source of interface IPv4 addresses.
pub trait AddrSource: Send + Sync {
    /// First IPv4 address assigned to `device`, if any.
    fn ipv4_of(&self, device: &str) -> Option<Ipv4Addr>;
}

/// Counters from `/sys/class/net/<dev>/statistics`.
#[derive(Debug, Clone, Default)]
pub struct SysfsLinkCounters;

fn read_counter(dir: &Path, name: &str) -> u64 {
    fs::read_to_string(dir.join(name))
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

impl LinkCounterSource for SysfsLinkCounters {
    fn link_stats(&self) -> Vec<LinkStats> {
        let entries = match fs::read_dir("/sys/class/net") {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut stats = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stats_dir = entry.path().join("statistics");
            stats.push(LinkStats {
                tx_packets: read_counter(&stats_dir, "tx_packets"),
                tx_errors: read_counter(&stats_dir, "tx_errors"),
                name,
            });
        }
        stats
    }
}

/// Addresses via `getifaddrs(3)`.
#[derive(Debug, Clone, Default)]
pub struct SystemAddrSource;

impl AddrSource for SystemAddrSource {
    fn ipv4_of(&self, device: &str) -> Option<Ipv4Addr> {
        // SAFETY: the getifaddrs list is only dereferenced between a
        // successful getifaddrs() and the matching freeifaddrs(), and every
        // pointer is null-checked before use.
        unsafe {
            let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
            if libc::getifaddrs(&mut ifaddrs) != 0 {
                return None;
            }

            let mut found = None;
            let mut cursor = ifaddrs;
            while !cursor.is_null() {
                let entry = &*cursor;
                cursor = entry.ifa_next;

                if entry.ifa_addr.is_null() || entry.ifa_name.is_null() {
                    continue;
                }
                if (*entry.ifa_addr).sa_family != libc::AF_INET as libc::sa_family_t {
                    continue;
                }
                let name = std::ffi::CStr::from_ptr(entry.ifa_name).to_string_lossy();
                if name != device {
                    continue;
                }

                let sockaddr = &*(entry.ifa_addr as *const libc::sockaddr_in);
                found = Some(Ipv4Addr::from(u32::from_be(sockaddr.sin_addr.s_addr)));
                break;
            }

            libc::freeifaddrs(ifaddrs);
            found
        }
    }
}

/// Derive a Wireguard peer's IPv4 from the local tunnel interface address.
/// Server interfaces (`wgs*`) sit one below their peer, client interfaces
/// (`wgc*`) one above; other device names have no derivable peer.
pub fn derive_wireguard_peer_ip(addrs: &dyn AddrSource, device: &str) -> String {
    if device.is_empty() {
        return String::new();
    }
    let Some(ip) = addrs.ipv4_of(device) else {
        return String::new();
    };
    let mut octets = ip.octets();

    if device.starts_with("wgs") {
        octets[3] = octets[3].wrapping_add(1);
    } else if device.starts_with("wgc") {
        octets[3] = octets[3].wrapping_sub(1);
    } else {
        return String::new();
    }
    Ipv4Addr::from(octets).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedAddrs(HashMap<String, Ipv4Addr>);

    impl AddrSource for FixedAddrs {
        fn ipv4_of(&self, device: &str) -> Option<Ipv4Addr> {
            self.0.get(device).copied()
        }
    }

    #[test]
    fn server_interfaces_peer_one_above() {
        let addrs = FixedAddrs(HashMap::from([(
            "wgs0".to_string(),
            Ipv4Addr::new(172, 31, 4, 16),
        )]));
        assert_eq!(derive_wireguard_peer_ip(&addrs, "wgs0"), "172.31.4.17");
    }

    #[test]
    fn client_interfaces_peer_one_below() {
        let addrs = FixedAddrs(HashMap::from([(
            "wgc2".to_string(),
            Ipv4Addr::new(172, 31, 4, 17),
        )]));
        assert_eq!(derive_wireguard_peer_ip(&addrs, "wgc2"), "172.31.4.16");
    }

    #[test]
    fn unknown_devices_derive_nothing() {
        let addrs = FixedAddrs(HashMap::new());
        assert_eq!(derive_wireguard_peer_ip(&addrs, "wgc2"), "");
        let addrs = FixedAddrs(HashMap::from([(
            "wg0".to_string(),
            Ipv4Addr::new(172, 31, 4, 17),
        )]));
        assert_eq!(derive_wireguard_peer_ip(&addrs, "wg0"), "");
        assert_eq!(derive_wireguard_peer_ip(&addrs, ""), "");
    }
}
