//! Per-band payload structs for the sysinfo schema family.
//!
//! Twelve schema revisions are in the field (1.0 through 2.0). They cluster
//! into five structural bands; revisions within a band differ only in values,
//! not shape:
//!
//! | band | revisions | distinguishing shape |
//! |------|-----------|----------------------|
//! | 1.0  | 1.0 | flat document, no meshrf/node_details sections |
//! | 1.5  | 1.5, 1.6 | sectioned, no `link_info` |
//! | 1.7  | 1.7 | adds `link_info` with per-link radio metrics |
//! | 1.8  | 1.8 … 1.14 | `node_details.mesh_gateway` as `"1"`/`"0"` |
//! | 2.0  | 2.0 | native numbers/booleans, trimmed `link_info` |
//!
//! All numeric fields that ever shipped as strings go through the tolerant
//! decoders in [`super::de`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::de;
use crate::lqm::tracker::LqmSection;

/// One mesh host advertised by a node (`hosts`/`nodes` arrays).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
}

/// A node network interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interface {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac: String,
}

/// One advertised mesh service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub link: String,
}

/// The `sysinfo` block: uptime, load averages, free memory.
/// `freememory` was a numeric string until 2.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub loads: [f64; 3],
    #[serde(default, deserialize_with = "de::u64_or_string")]
    pub freememory: u64,
}

/// The `tunnels` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunnelCounts {
    #[serde(default, deserialize_with = "de::u64_or_string")]
    pub active_tunnel_count: u64,
}

/// The `meshrf` block as published by 1.5 through 1.14. Every numeric field
/// arrives as a string; `freq` is `"nil"` on nodes without RF hardware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshRf {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub channel: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub chanbw: f64,
    #[serde(rename = "freq", default, deserialize_with = "de::float_or_string")]
    pub frequency: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub azimuth: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub elevation: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub height: f64,
}

/// The `meshrf` block in 2.0, trimmed to the status flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshRfV2 {
    #[serde(default)]
    pub status: String,
}

/// `node_details` for 1.5 through 1.7 (no gateway flag yet).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDetailsV1_5 {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub board_id: String,
    #[serde(rename = "firmware_mfg", default)]
    pub firmware_manufacturer: String,
    #[serde(default)]
    pub firmware_version: String,
}

/// `node_details` for 1.8 through 1.14: `mesh_gateway` is the string
/// `"1"`/`"0"`; late revisions in the band add a supernode flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDetailsV1_8 {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub board_id: String,
    #[serde(rename = "firmware_mfg", default)]
    pub firmware_manufacturer: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(with = "de::bool_string", default)]
    pub mesh_gateway: bool,
    #[serde(default)]
    pub mesh_supernode: bool,
}

/// `node_details` in 2.0: native booleans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDetailsV2 {
    #[serde(default)]
    pub mesh_supernode: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub mesh_gateway: bool,
    #[serde(default)]
    pub board_id: String,
    #[serde(rename = "firmware_mfg", default)]
    pub firmware_manufacturer: String,
    #[serde(default)]
    pub firmware_version: String,
}

/// Link classification, shared by every schema band that carries `link_info`.
/// Unrecognized values survive decode/encode untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    #[serde(rename = "WIREGUARD")]
    Wireguard,
    #[serde(rename = "DTD")]
    Dtd,
    #[serde(rename = "TUN")]
    Tun,
    #[serde(rename = "RF")]
    Rf,
    #[serde(rename = "SUPERNODE")]
    Supernode,
    #[serde(untagged)]
    Other(String),
}

impl Default for LinkType {
    fn default() -> Self {
        LinkType::Other(String::new())
    }
}

impl LinkType {
    /// Tunnel-carrying links get rebadged on supernodes before mapping.
    pub fn is_tunnel(&self) -> bool {
        matches!(self, LinkType::Tun | LinkType::Wireguard)
    }
}

/// One `link_info` entry as published by 1.7 through 1.14.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkInfoV1 {
    #[serde(default)]
    pub hostname: String,
    #[serde(rename = "linkType", default)]
    pub link_type: LinkType,
    #[serde(rename = "olsrInterface", default, skip_serializing_if = "String::is_empty")]
    pub olsr_interface: String,
    #[serde(rename = "linkQuality", default)]
    pub link_quality: f64,
    #[serde(rename = "neighborLinkQuality", default)]
    pub neighbor_link_quality: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub signal: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub noise: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub tx_rate: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub rx_rate: f64,
}

/// One `link_info` entry in 2.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkInfoV2 {
    #[serde(default)]
    pub hostname: String,
    #[serde(rename = "linkType", default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub interface: String,
}

/// Schema 1.0: a flat document from the era before sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoV1_0 {
    pub api_version: String,
    #[serde(default)]
    pub node: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub board_id: String,
    #[serde(rename = "firmware_mfg", default, skip_serializing_if = "String::is_empty")]
    pub firmware_manufacturer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub firmware_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssid: String,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub channel: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grid_square: String,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lat: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lon: f64,
    #[serde(default)]
    pub sysinfo: SystemStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
}

/// Schema 1.5 / 1.6: sectioned document, no link info yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoV1_5 {
    pub api_version: String,
    #[serde(default)]
    pub node: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grid_square: String,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lat: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lon: f64,
    #[serde(default)]
    pub sysinfo: SystemStats,
    #[serde(default)]
    pub meshrf: MeshRf,
    #[serde(default)]
    pub node_details: NodeDetailsV1_5,
    #[serde(default)]
    pub tunnels: TunnelCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceEntry>,
}

/// Schema 1.7: first revision with `link_info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoV1_7 {
    pub api_version: String,
    #[serde(default)]
    pub node: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grid_square: String,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lat: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lon: f64,
    #[serde(default)]
    pub sysinfo: SystemStats,
    #[serde(default)]
    pub meshrf: MeshRf,
    #[serde(default)]
    pub node_details: NodeDetailsV1_5,
    #[serde(default)]
    pub tunnels: TunnelCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceEntry>,
    #[serde(
        default,
        deserialize_with = "de::map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub link_info: HashMap<String, LinkInfoV1>,
}

/// Schema 1.8 through 1.14: gateway flag lands (as a string boolean), local
/// services split out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoV1_8 {
    pub api_version: String,
    #[serde(default)]
    pub node: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grid_square: String,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lat: f64,
    #[serde(default, deserialize_with = "de::float_or_string")]
    pub lon: f64,
    #[serde(default)]
    pub sysinfo: SystemStats,
    #[serde(default)]
    pub meshrf: MeshRf,
    #[serde(default)]
    pub node_details: NodeDetailsV1_8,
    #[serde(default)]
    pub tunnels: TunnelCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services_local: Vec<ServiceEntry>,
    #[serde(
        default,
        deserialize_with = "de::map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub link_info: HashMap<String, LinkInfoV1>,
}

/// Schema 2.0: native numbers and booleans throughout, plus the node's own
/// link-quality report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SysinfoV2_0 {
    #[serde(rename = "lon", default, deserialize_with = "de::float_or_string")]
    pub longitude: f64,
    #[serde(rename = "lat", default, deserialize_with = "de::float_or_string")]
    pub latitude: f64,
    #[serde(default)]
    pub sysinfo: SystemStats,
    pub api_version: String,
    #[serde(default)]
    pub meshrf: MeshRfV2,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub grid_square: String,
    #[serde(default)]
    pub node: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Host>,
    #[serde(default)]
    pub node_details: NodeDetailsV2,
    #[serde(default)]
    pub tunnels: TunnelCounts,
    #[serde(default, skip_serializing_if = "LqmSection::is_empty")]
    pub lqm: LqmSection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services_local: Vec<ServiceEntry>,
    #[serde(
        default,
        deserialize_with = "de::map_or_empty_array",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub link_info: HashMap<String, LinkInfoV2>,
}
