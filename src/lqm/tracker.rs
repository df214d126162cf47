//! Tracker table records and the published state document.
//!
//! One [`Tracker`] exists per directly adjacent neighbor, keyed by MAC
//! address. Field wire names match the state document consumed by the node
//! UI and by remote monitors verbatim; fields that are bookkeeping-only are
//! skipped on the wire.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How the neighbor is attached to this node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    #[serde(rename = "DtD")]
    Dtd,
    Wireguard,
}

/// Babel peering parameters advertised for a neighbor, populated with
/// per-device-type defaults on first sight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BabelPeerConfig {
    pub hello_interval: u32,
    pub update_interval: u32,
    pub rxcost: u32,
}

/// Link-quality state for one neighbor.
///
/// Timestamps are Unix seconds. Quality signals live in `[0, 100]`.
/// `rev_*` fields mirror how the neighbor sees us, copied out of its own
/// tracker table during remote refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tracker {
    #[serde(skip)]
    pub first_seen: i64,
    #[serde(rename = "lastseen")]
    pub last_seen: i64,
    #[serde(rename = "lastup")]
    pub last_up: i64,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub device: String,
    pub mac: String,
    pub ipv6ll: String,
    /// Next remote-refresh deadline (Unix seconds); zero forces a refresh.
    pub refresh: i64,
    pub lq: u32,
    pub avg_lq: f64,
    pub rxcost: u32,
    pub txcost: u32,
    pub rtt: u32,
    pub tx_packets: u64,
    pub tx_fail: u64,
    #[serde(skip)]
    pub tx_retries: u64,
    pub last_tx_packets: Option<u64>,
    #[serde(skip)]
    pub last_tx_fail: Option<u64>,
    #[serde(skip)]
    pub last_tx_retries: Option<u64>,
    #[serde(rename = "avg_tx_packets")]
    pub avg_tx: f64,
    #[serde(skip)]
    pub avg_tx_fail: f64,
    #[serde(skip)]
    pub avg_tx_retries: f64,
    pub tx_quality: f64,
    pub ping_quality: i32,
    pub ping_success_time: f64,
    pub quality: i32,
    pub hostname: String,
    pub canonical_ip: String,
    pub ip: String,
    pub lat: f64,
    pub lon: f64,
    /// Great-circle distance from the local node, meters.
    pub distance: f64,
    pub localarea: bool,
    pub model: String,
    pub firmware_version: String,
    #[serde(skip)]
    pub rev_last_seen: i64,
    pub rev_ping_success_time: f64,
    pub rev_ping_quality: i32,
    pub rev_quality: i32,
    #[serde(skip)]
    pub node_route_count: u32,
    pub babel_route_count: u32,
    pub babel_metric: u32,
    pub routable: bool,
    pub user_blocks: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub babel_config: Option<BabelPeerConfig>,
}

/// The published state document: `{now, trackers, distance, start,
/// total_route_count}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LqmInfo {
    pub trackers: HashMap<String, Tracker>,
    pub start: i64,
    pub now: i64,
    pub distance: i64,
    pub total_route_count: i64,
}

/// User-tunable monitor knobs mirrored in the sysinfo report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LqmUserConfig {
    pub user_blocks: String,
}

/// The `lqm` section of a sysinfo 2.0 document: the node's own monitor
/// report, as served to its neighbors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LqmSection {
    pub enabled: bool,
    pub config: LqmUserConfig,
    pub info: LqmInfo,
}

impl LqmSection {
    /// True when the section carries no report worth serializing.
    pub fn is_empty(&self) -> bool {
        !self.enabled && self.info.trackers.is_empty() && self.info.now == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_wire_names_match_state_document() {
        let tracker = Tracker {
            last_seen: 1700000000,
            last_up: 1700000000,
            device_type: DeviceType::Wireguard,
            device: "wgc0".into(),
            mac: "00:00:0a:33:78:03".into(),
            avg_lq: 55.0,
            tx_quality: 93.5,
            ping_quality: 100,
            babel_config: Some(BabelPeerConfig {
                hello_interval: 10,
                update_interval: 120,
                rxcost: 206,
            }),
            ..Tracker::default()
        };

        let value = serde_json::to_value(&tracker).unwrap();
        assert_eq!(value["lastseen"], 1700000000);
        assert_eq!(value["type"], "Wireguard");
        assert_eq!(value["avg_lq"], 55.0);
        assert_eq!(value["tx_quality"], 93.5);
        assert_eq!(value["babel_config"]["rxcost"], 206);
        // Bookkeeping fields stay off the wire.
        assert!(value.get("first_seen").is_none());
        assert!(value.get("tx_retries").is_none());
        assert!(value.get("avg_tx_fail").is_none());
    }

    #[test]
    fn babel_config_omitted_until_populated() {
        let value = serde_json::to_value(Tracker::default()).unwrap();
        assert!(value.get("babel_config").is_none());
    }

    #[test]
    fn remote_report_roundtrips() {
        let doc = r#"{
            "enabled": true,
            "config": {"user_blocks": ""},
            "info": {
                "trackers": {
                    "02:00:c0:a8:01:01": {
                        "hostname": "kd2abc-node",
                        "ping_quality": 97,
                        "ping_success_time": 0.012,
                        "quality": 95
                    }
                },
                "start": 1700000000,
                "now": 1700000300,
                "distance": 80550,
                "total_route_count": 42
            }
        }"#;
        let section: LqmSection = serde_json::from_str(doc).unwrap();
        assert!(section.enabled);
        let tracker = &section.info.trackers["02:00:c0:a8:01:01"];
        assert_eq!(tracker.ping_quality, 97);
        assert_eq!(tracker.quality, 95);
        assert!(!section.is_empty());
    }
}
