//! Schema-versioned sysinfo document.
//!
//! Every mesh node answers `GET /cgi-bin/sysinfo.json` with a JSON document
//! whose shape depends on its firmware's `api_version`. Decoding happens in
//! two passes: a tiny envelope read pulls out `api_version`, then the full
//! byte slice is decoded a second time into the payload struct for that
//! version band. Unrecognized versions decode successfully with an empty
//! payload so one stray node cannot poison a crawl.
//!
//! [`SysinfoResponse`] exposes uniform accessors for the handful of fields
//! the walker and the monitor consume (coordinates, host list, link info,
//! supernode flag); each returns zero/empty for bands that do not carry the
//! field.

pub mod de;
mod versions;

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub use versions::{
    Host, Interface, LinkInfoV1, LinkInfoV2, LinkType, MeshRf, MeshRfV2, NodeDetailsV1_5,
    NodeDetailsV1_8, NodeDetailsV2, ServiceEntry, SysinfoV1_0, SysinfoV1_5, SysinfoV1_7,
    SysinfoV1_8, SysinfoV2_0, SystemStats, TunnelCounts,
};

/// Malformed sysinfo document.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid sysinfo document: {0}")]
    Json(#[from] serde_json::Error),
}

/// The decoded payload, one variant per structural band.
#[derive(Debug, Clone)]
pub enum SysinfoPayload {
    V1_0(Box<SysinfoV1_0>),
    V1_5(Box<SysinfoV1_5>),
    V1_7(Box<SysinfoV1_7>),
    V1_8(Box<SysinfoV1_8>),
    V2_0(Box<SysinfoV2_0>),
    /// A version this build does not know. Decoding succeeds, accessors
    /// return empty values.
    Unknown,
}

/// The `link_info` mapping in version-erased form, for callers that need to
/// read or rewrite links without matching on the payload band.
#[derive(Debug, Clone)]
pub enum LinkInfoMap {
    V1(HashMap<String, LinkInfoV1>),
    V2(HashMap<String, LinkInfoV2>),
}

impl LinkInfoMap {
    /// Rebadge TUN and WIREGUARD links as SUPERNODE. Applied to documents
    /// from supernodes before they are written into the map artifact.
    pub fn promote_tunnel_links(&mut self) {
        match self {
            LinkInfoMap::V1(map) => {
                for link in map.values_mut() {
                    if link.link_type.is_tunnel() {
                        link.link_type = LinkType::Supernode;
                    }
                }
            }
            LinkInfoMap::V2(map) => {
                for link in map.values_mut() {
                    if link.link_type.is_tunnel() {
                        link.link_type = LinkType::Supernode;
                    }
                }
            }
        }
    }
}

/// One node's sysinfo document, decoded into the band matching its
/// `api_version`.
#[derive(Debug, Clone)]
pub struct SysinfoResponse {
    api_version: String,
    payload: SysinfoPayload,
}

#[derive(Deserialize)]
struct Envelope {
    api_version: String,
}

impl SysinfoResponse {
    /// Decode a sysinfo document. The version is read from the envelope
    /// first, then the whole slice is decoded into that band's payload.
    /// A missing `api_version` or a payload that contradicts its band is an
    /// error; an unknown version is not.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;

        let payload = match envelope.api_version.as_str() {
            "1.0" => SysinfoPayload::V1_0(Box::new(serde_json::from_slice(bytes)?)),
            "1.5" | "1.6" => SysinfoPayload::V1_5(Box::new(serde_json::from_slice(bytes)?)),
            "1.7" => SysinfoPayload::V1_7(Box::new(serde_json::from_slice(bytes)?)),
            "1.8" | "1.9" | "1.10" | "1.11" | "1.12" | "1.13" | "1.14" => {
                SysinfoPayload::V1_8(Box::new(serde_json::from_slice(bytes)?))
            }
            "2.0" => SysinfoPayload::V2_0(Box::new(serde_json::from_slice(bytes)?)),
            _ => SysinfoPayload::Unknown,
        };

        Ok(Self {
            api_version: envelope.api_version,
            payload,
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn payload(&self) -> &SysinfoPayload {
        &self.payload
    }

    /// The node's own hostname, empty for unknown versions.
    pub fn node(&self) -> &str {
        match &self.payload {
            SysinfoPayload::V1_0(info) => &info.node,
            SysinfoPayload::V1_5(info) => &info.node,
            SysinfoPayload::V1_7(info) => &info.node,
            SysinfoPayload::V1_8(info) => &info.node,
            SysinfoPayload::V2_0(info) => &info.node,
            SysinfoPayload::Unknown => "",
        }
    }

    pub fn latitude(&self) -> f64 {
        match &self.payload {
            SysinfoPayload::V1_0(info) => info.lat,
            SysinfoPayload::V1_5(info) => info.lat,
            SysinfoPayload::V1_7(info) => info.lat,
            SysinfoPayload::V1_8(info) => info.lat,
            SysinfoPayload::V2_0(info) => info.latitude,
            SysinfoPayload::Unknown => 0.0,
        }
    }

    pub fn longitude(&self) -> f64 {
        match &self.payload {
            SysinfoPayload::V1_0(info) => info.lon,
            SysinfoPayload::V1_5(info) => info.lon,
            SysinfoPayload::V1_7(info) => info.lon,
            SysinfoPayload::V1_8(info) => info.lon,
            SysinfoPayload::V2_0(info) => info.longitude,
            SysinfoPayload::Unknown => 0.0,
        }
    }

    /// The advertised host list used to grow the crawl frontier. Schema 1.0
    /// predates host advertisement and returns the empty slice.
    pub fn hosts(&self) -> &[Host] {
        match &self.payload {
            SysinfoPayload::V1_0(_) | SysinfoPayload::Unknown => &[],
            SysinfoPayload::V1_5(info) => &info.hosts,
            SysinfoPayload::V1_7(info) => &info.hosts,
            SysinfoPayload::V1_8(info) => &info.hosts,
            SysinfoPayload::V2_0(info) => &info.hosts,
        }
    }

    /// Whether this node declares itself a tunnel-aggregating supernode.
    pub fn mesh_supernode(&self) -> bool {
        match &self.payload {
            SysinfoPayload::V1_8(info) => info.node_details.mesh_supernode,
            SysinfoPayload::V2_0(info) => info.node_details.mesh_supernode,
            _ => false,
        }
    }

    /// The `link_info` mapping, cloned into version-erased form. `None` for
    /// bands that never carried the field.
    pub fn link_info(&self) -> Option<LinkInfoMap> {
        match &self.payload {
            SysinfoPayload::V1_7(info) => Some(LinkInfoMap::V1(info.link_info.clone())),
            SysinfoPayload::V1_8(info) => Some(LinkInfoMap::V1(info.link_info.clone())),
            SysinfoPayload::V2_0(info) => Some(LinkInfoMap::V2(info.link_info.clone())),
            _ => None,
        }
    }

    /// Store a rewritten `link_info` mapping back into the payload. Calls
    /// whose map shape does not match the payload band (or whose band has no
    /// `link_info` at all) are silently dropped.
    pub fn set_link_info(&mut self, links: LinkInfoMap) {
        match (&mut self.payload, links) {
            (SysinfoPayload::V1_7(info), LinkInfoMap::V1(map)) => info.link_info = map,
            (SysinfoPayload::V1_8(info), LinkInfoMap::V1(map)) => info.link_info = map,
            (SysinfoPayload::V2_0(info), LinkInfoMap::V2(map)) => info.link_info = map,
            _ => {}
        }
    }

    /// The document as a JSON value, in its native band shape. Unknown
    /// versions reduce to their envelope.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for SysinfoResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.payload {
            SysinfoPayload::V1_0(info) => info.serialize(serializer),
            SysinfoPayload::V1_5(info) => info.serialize(serializer),
            SysinfoPayload::V1_7(info) => info.serialize(serializer),
            SysinfoPayload::V1_8(info) => info.serialize(serializer),
            SysinfoPayload::V2_0(info) => info.serialize(serializer),
            SysinfoPayload::Unknown => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("api_version", &self.api_version)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_dispatch_selects_band() {
        let doc = SysinfoResponse::decode(br#"{"api_version": "1.9", "node": "N0CALL-1"}"#)
            .expect("decode");
        assert_eq!(doc.api_version(), "1.9");
        assert!(matches!(doc.payload(), SysinfoPayload::V1_8(_)));
        assert_eq!(doc.node(), "N0CALL-1");
    }

    #[test]
    fn unknown_version_decodes_empty() {
        let doc = SysinfoResponse::decode(br#"{"api_version": "3.1", "node": "future"}"#)
            .expect("decode");
        assert!(matches!(doc.payload(), SysinfoPayload::Unknown));
        assert_eq!(doc.node(), "");
        assert_eq!(doc.latitude(), 0.0);
        assert!(doc.hosts().is_empty());
        assert!(doc.link_info().is_none());
        assert!(!doc.mesh_supernode());
    }

    #[test]
    fn missing_api_version_is_an_error() {
        assert!(SysinfoResponse::decode(br#"{"node": "nameless"}"#).is_err());
    }

    #[test]
    fn string_coordinates_decode_in_legacy_bands() {
        let doc = SysinfoResponse::decode(
            br#"{"api_version": "1.5", "lat": "33.30", "lon": "-96.70"}"#,
        )
        .expect("decode");
        assert_eq!(doc.latitude(), 33.30);
        assert_eq!(doc.longitude(), -96.70);
    }

    #[test]
    fn numeric_coordinates_decode_in_v2() {
        let doc = SysinfoResponse::decode(br#"{"api_version": "2.0", "lat": 33.3, "lon": -96.7}"#)
            .expect("decode");
        assert_eq!(doc.latitude(), 33.3);
        assert_eq!(doc.longitude(), -96.7);
    }

    #[test]
    fn set_link_info_drops_mismatched_shape() {
        let mut doc = SysinfoResponse::decode(
            br#"{"api_version": "2.0", "link_info": {"n1": {"hostname": "n1", "linkType": "TUN", "interface": "wgc0"}}}"#,
        )
        .expect("decode");

        // A V1-shaped map cannot land in a 2.0 payload.
        doc.set_link_info(LinkInfoMap::V1(HashMap::new()));
        match doc.link_info() {
            Some(LinkInfoMap::V2(map)) => assert_eq!(map.len(), 1),
            other => panic!("unexpected link info: {other:?}"),
        }
    }

    #[test]
    fn set_link_info_ignored_for_bands_without_field() {
        let mut doc =
            SysinfoResponse::decode(br#"{"api_version": "1.5", "node": "old"}"#).expect("decode");
        doc.set_link_info(LinkInfoMap::V1(HashMap::new()));
        assert!(doc.link_info().is_none());
    }
}
