//! Decoder behavior across the sysinfo schema family: version dispatch,
//! string/number drift, and the documented firmware quirks.

use meshmon::sysinfo::{LinkInfoMap, LinkType, SysinfoPayload, SysinfoResponse};

#[test]
fn nil_frequency_decodes_to_zero() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "1.7",
            "meshrf": {
                "ssid": "AREDN-10-v3",
                "channel": "36",
                "status": "on",
                "mode": "adhoc",
                "chanbw": "10",
                "freq": "nil"
            }
        }"#,
    )
    .expect("decode");

    match doc.payload() {
        SysinfoPayload::V1_7(info) => {
            assert_eq!(info.meshrf.frequency, 0.0);
            assert_eq!(info.meshrf.channel, 36.0);
            assert_eq!(info.meshrf.chanbw, 10.0);
        }
        other => panic!("wrong band: {other:?}"),
    }
}

#[test]
fn numeric_string_frequency_decodes() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "1.7",
            "meshrf": {
                "ssid": "AREDN-10-v3",
                "channel": "36",
                "status": "on",
                "mode": "adhoc",
                "chanbw": "10",
                "freq": "5180"
            }
        }"#,
    )
    .expect("decode");

    match doc.payload() {
        SysinfoPayload::V1_7(info) => assert_eq!(info.meshrf.frequency, 5180.0),
        other => panic!("wrong band: {other:?}"),
    }
}

#[test]
fn empty_array_link_info_is_an_empty_mapping() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "1.7",
            "link_info": []
        }"#,
    )
    .expect("decode");

    match doc.link_info() {
        Some(LinkInfoMap::V1(map)) => assert!(map.is_empty()),
        other => panic!("unexpected link info: {other:?}"),
    }
}

#[test]
fn populated_link_info_keeps_radio_metrics() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "1.7",
            "link_info": {
                "10.1.1.1": {
                    "hostname": "node1",
                    "linkType": "RF",
                    "olsrInterface": "wlan0",
                    "linkQuality": 1.0,
                    "neighborLinkQuality": 0.85,
                    "signal": -72,
                    "noise": -95,
                    "tx_rate": 26.0,
                    "rx_rate": 19.5
                }
            }
        }"#,
    )
    .expect("decode");

    match doc.link_info() {
        Some(LinkInfoMap::V1(map)) => {
            let link = &map["10.1.1.1"];
            assert_eq!(link.link_type, LinkType::Rf);
            assert_eq!(link.signal, -72.0);
            assert_eq!(link.neighbor_link_quality, 0.85);
        }
        other => panic!("unexpected link info: {other:?}"),
    }
}

#[test]
fn gateway_flag_is_a_string_in_legacy_bands() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "1.12",
            "node": "KD2ABC-gw",
            "node_details": {
                "model": "MikroTik hAP ac3",
                "mesh_gateway": "1"
            },
            "sysinfo": {"uptime": "5 days", "loads": [0.1, 0.2, 0.3], "freememory": "93904896"}
        }"#,
    )
    .expect("decode");

    match doc.payload() {
        SysinfoPayload::V1_8(info) => {
            assert!(info.node_details.mesh_gateway);
            assert_eq!(info.sysinfo.freememory, 93_904_896);
        }
        other => panic!("wrong band: {other:?}"),
    }

    // Re-encoding keeps the legacy string form.
    let value = doc.to_value();
    assert_eq!(value["node_details"]["mesh_gateway"], "1");
}

#[test]
fn gateway_flag_is_native_in_v2() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "2.0",
            "node": "KD2ABC-gw",
            "node_details": {"mesh_gateway": true, "mesh_supernode": false},
            "sysinfo": {"uptime": "5 days", "loads": [0.1, 0.2, 0.3], "freememory": 93904896}
        }"#,
    )
    .expect("decode");

    match doc.payload() {
        SysinfoPayload::V2_0(info) => {
            assert!(info.node_details.mesh_gateway);
            assert!(!info.node_details.mesh_supernode);
            assert_eq!(info.sysinfo.freememory, 93_904_896);
        }
        other => panic!("wrong band: {other:?}"),
    }
    assert_eq!(doc.to_value()["node_details"]["mesh_gateway"], true);
}

#[test]
fn decode_reencode_is_semantically_stable() {
    let original = br#"{
        "api_version": "1.9",
        "node": "KD2ABC-relay",
        "grid_square": "EM13qb",
        "lat": "33.178",
        "lon": "-96.712",
        "sysinfo": {"uptime": "12 days", "loads": [0.5, 0.4, 0.3], "freememory": "1234567"},
        "node_details": {"model": "NanoStation M5", "mesh_gateway": "0"},
        "hosts": [{"name": "KD2ABC-relay", "ip": "10.4.4.4"}],
        "link_info": {
            "10.9.9.9": {"hostname": "far-node", "linkType": "RF", "linkQuality": 0.9, "neighborLinkQuality": 0.8}
        }
    }"#;

    let first = SysinfoResponse::decode(original).expect("decode");
    let reencoded = serde_json::to_vec(&first.to_value()).expect("encode");
    let second = SysinfoResponse::decode(&reencoded).expect("re-decode");

    assert_eq!(second.api_version(), "1.9");
    assert_eq!(second.node(), "KD2ABC-relay");
    assert_eq!(second.latitude(), 33.178);
    assert_eq!(second.longitude(), -96.712);
    assert_eq!(second.hosts(), first.hosts());
    match (first.payload(), second.payload()) {
        (SysinfoPayload::V1_8(a), SysinfoPayload::V1_8(b)) => {
            assert_eq!(a.sysinfo.freememory, b.sysinfo.freememory);
            assert_eq!(a.node_details.mesh_gateway, b.node_details.mesh_gateway);
            assert_eq!(
                a.link_info["10.9.9.9"].link_quality,
                b.link_info["10.9.9.9"].link_quality
            );
        }
        other => panic!("wrong bands: {other:?}"),
    }
}

#[test]
fn v2_document_carries_lqm_report() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "2.0",
            "node": "KD2ABC-hub",
            "lat": 33.178,
            "lon": -96.712,
            "lqm": {
                "enabled": true,
                "config": {"user_blocks": ""},
                "info": {
                    "trackers": {
                        "02:00:c0:a8:01:01": {"hostname": "kd2abc-relay", "ping_quality": 98, "quality": 97}
                    },
                    "start": 1700000000,
                    "now": 1700000300,
                    "distance": 80550,
                    "total_route_count": 17
                }
            }
        }"#,
    )
    .expect("decode");

    match doc.payload() {
        SysinfoPayload::V2_0(info) => {
            assert!(info.lqm.enabled);
            assert_eq!(info.lqm.info.total_route_count, 17);
            assert_eq!(
                info.lqm.info.trackers["02:00:c0:a8:01:01"].ping_quality,
                98
            );
        }
        other => panic!("wrong band: {other:?}"),
    }
}

#[test]
fn unknown_versions_decode_but_stay_empty() {
    let doc = SysinfoResponse::decode(
        br#"{"api_version": "9.9", "node": "from-the-future", "lat": 1.0, "lon": 2.0}"#,
    )
    .expect("decode");
    assert!(matches!(doc.payload(), SysinfoPayload::Unknown));
    assert_eq!(doc.latitude(), 0.0);
    assert_eq!(doc.to_value()["api_version"], "9.9");
}

#[test]
fn unknown_link_type_values_survive_roundtrip() {
    let doc = SysinfoResponse::decode(
        br#"{
            "api_version": "2.0",
            "link_info": {"x": {"hostname": "x", "linkType": "XLINK", "interface": "eth1"}}
        }"#,
    )
    .expect("decode");
    let value = doc.to_value();
    assert_eq!(value["link_info"]["x"]["linkType"], "XLINK");
}
