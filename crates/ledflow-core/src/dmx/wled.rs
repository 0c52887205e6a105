//! WLED UDP discovery dialect

use serde::Deserialize;

use super::{DeviceInfo, DiscoveryProtocol};

/// Port WLED listens on for discovery probes
pub const DISCOVERY_PORT: u16 = 21324;

/// Probe broadcast to WLED nodes
pub const DISCOVERY_PROBE: &[u8] = br#"{"op":"discover"}"#;

#[derive(Deserialize, Debug, Default)]
struct WledInfo {
    /// Set on probes, never on replies
    op: Option<String>,
    name: Option<String>,
    leds: Option<WledLeds>,
}

#[derive(Deserialize, Debug, Default)]
struct WledLeds {
    count: Option<usize>,
}

/// Decode a WLED info reply. Anything that is not a JSON object is ignored.
pub fn parse_info(datagram: &[u8]) -> Option<DeviceInfo> {
    let info: WledInfo = serde_json::from_slice(datagram).ok()?;
    if info.op.is_some() {
        return None;
    }
    Some(DeviceInfo {
        name: info.name.filter(|name| !name.trim().is_empty()),
        pixel_count: info.leds.and_then(|leds| leds.count).filter(|&n| n > 0),
        protocol: DiscoveryProtocol::Wled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_info() {
        let info = parse_info(br#"{"name":"Porch","leds":{"count":144,"fps":42},"ver":"0.14"}"#)
            .unwrap();
        assert_eq!(info.name.as_deref(), Some("Porch"));
        assert_eq!(info.pixel_count, Some(144));
        assert_eq!(info.protocol, DiscoveryProtocol::Wled);
    }

    #[test]
    fn test_missing_fields_default() {
        let info = parse_info(br#"{"ver":"0.14"}"#).unwrap();
        assert_eq!(info.name, None);
        assert_eq!(info.pixel_count, None);
    }

    #[test]
    fn test_foreign_traffic_ignored() {
        assert!(parse_info(b"\x00\x01garbage").is_none());
        assert!(parse_info(b"[1,2,3]").is_none());
        assert!(parse_info(b"").is_none());
        assert!(parse_info(DISCOVERY_PROBE).is_none());
    }
}
