//! Address and hostname helpers shared by the walker and the monitor.
//!
//! The mesh carries a few conventions this module encodes:
//! - Babel reports neighbors by IPv6 link-local address; the stable key for a
//!   neighbor is the MAC recovered by inverting the modified-EUI-64 mapping.
//! - Wireguard peers have no real MAC, so their link-local addresses are
//!   generated from a pseudo-MAC of `00:00:<ipv4>` (the wireguard-tools
//!   convention).
//! - Node hostnames appear with and without the `.local.mesh` suffix and the
//!   `dtdlink.` prefix depending on which surface reported them.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Recover a MAC address from an IPv6 link-local address built by modified
/// EUI-64 insertion. Addresses without the `ff:fe` marker in bytes 11-12 are
/// returned unchanged, as are strings that do not parse as IPv6 at all;
/// callers use the result as an opaque tracker key either way.
pub fn ipv6ll_to_mac(ipv6ll: &str) -> String {
    let addr: Ipv6Addr = match ipv6ll.parse() {
        Ok(addr) => addr,
        Err(_) => return ipv6ll.to_string(),
    };
    let octets = addr.octets();

    if octets[11] == 0xff && octets[12] == 0xfe {
        let mac = [
            octets[8] ^ 0x02,
            octets[9],
            octets[10],
            octets[13],
            octets[14],
            octets[15],
        ];
        return format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        );
    }

    ipv6ll.to_string()
}

/// Generate a link-local address beginning with fe80 and ending with the 4
/// octets of the IPv4 address. The generation logic follows the upstream
/// wireguard-tools implementation:
/// 1. Create a pseudo-MAC address: `00:00:IPv4`
/// 2. Convert to an EUI-64 IPv6 link-local address (flip the U/L bit of the
///    first octet, insert `ff:fe` in the middle)
pub fn generate_ipv6_link_local(ipv4: Ipv4Addr) -> String {
    let v4 = ipv4.octets();

    let mut bytes = [0u8; 16];
    bytes[0] = 0xfe;
    bytes[1] = 0x80;
    // MAC[0] is 0x00; modified EUI-64 flips the universal/local bit (0x02).
    bytes[8] = 0x00 ^ 0x02;
    bytes[9] = 0x00;
    bytes[10] = v4[0];
    bytes[11] = 0xff;
    bytes[12] = 0xfe;
    bytes[13] = v4[1];
    bytes[14] = v4[2];
    bytes[15] = v4[3];

    Ipv6Addr::from(bytes).to_string()
}

/// Normalize a node hostname to its canonical mesh form: lowercase, without
/// the `.local.mesh` suffix or the `dtdlink.` prefix.
pub fn canonical_hostname(hostname: &str) -> String {
    let h = hostname.to_lowercase();
    let h = h.strip_suffix(".local.mesh").unwrap_or(&h);
    let h = h.strip_prefix("dtdlink.").unwrap_or(h);
    h.to_string()
}

/// Resolve a hostname to its first IPv4 address using the system resolver.
/// Returns an empty string when resolution fails or yields no A records.
pub async fn mesh_ip_for_hostname(hostname: &str) -> String {
    let addrs = match tokio::net::lookup_host((hostname, 0)).await {
        Ok(addrs) => addrs,
        Err(_) => return String::new(),
    };
    for addr in addrs {
        if let IpAddr::V4(v4) = addr.ip() {
            return v4.to_string();
        }
    }
    String::new()
}
