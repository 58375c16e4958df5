//! Typed model for tshark JSON capture exports.
//!
//! A capture export is a JSON document whose top level is an ordered array of
//! packet records, each carrying the protocol layers dissected by the capture
//! tool:
//!
//! ```text
//! [ { "_source": { "layers": {
//!       "usb": { "usb.device_address": "2", "usb.urb_type": "'S'", ... },
//!       "usb.capdata": "de:ad:be:ef"
//! }}}, ... ]
//! ```
//!
//! Records deserialize into explicit structs rather than being navigated
//! field-by-field. Every interior field is optional so that a structurally
//! valid array always parses; absent fields surface as per-packet schema
//! errors during extraction instead of failing the whole parse.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a capture export.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Capture file is missing or unreadable.
    #[error("failed to read capture file {path}")]
    Read {
        /// Path of the capture file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Capture content is not valid JSON or not an array of packet records.
    #[error("capture file {path} is not a JSON packet array")]
    Parse {
        /// Path of the capture file.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Result type alias for capture loading.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// A single packet record from the capture export.
#[derive(Debug, Clone, Deserialize)]
pub struct CapturePacket {
    /// The `_source` wrapper the capture tool emits around each packet.
    #[serde(rename = "_source")]
    pub source: Option<PacketSource>,
}

/// The `_source` member of a packet record.
#[derive(Debug, Clone, Deserialize)]
pub struct PacketSource {
    /// Dissected protocol layers of the packet.
    pub layers: Option<PacketLayers>,
}

/// The protocol layers of a packet record.
///
/// `usb.capdata` is a sibling of the `usb` layer object, not nested inside
/// it; that is how the capture tool exports payload bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct PacketLayers {
    /// The USB layer fields.
    pub usb: Option<UsbLayer>,

    /// Captured payload bytes, hex-encoded with colon separators.
    #[serde(rename = "usb.capdata")]
    pub capdata: Option<String>,
}

/// String-valued fields of the USB layer.
///
/// The capture tool exports every field as a string, including the
/// hex-formatted ones (`"0x03"`), and wraps URB type characters in literal
/// quotes (`"'S'"`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsbLayer {
    /// Bus address of the device the URB belongs to.
    #[serde(rename = "usb.device_address")]
    pub device_address: Option<String>,

    /// URB type: `'S'` for submit, `'C'` for complete.
    #[serde(rename = "usb.urb_type")]
    pub urb_type: Option<String>,

    /// Transfer type: `0x03` marks a bulk transfer.
    #[serde(rename = "usb.transfer_type")]
    pub transfer_type: Option<String>,

    /// Address of the endpoint the transfer targets.
    #[serde(rename = "usb.endpoint_address")]
    pub endpoint_address: Option<String>,
}

/// Loads a capture export from disk.
///
/// The whole document is read and parsed up front; packets are returned in
/// document order. Layers other than the USB layer and payload are ignored.
///
/// # Errors
///
/// Returns [`CaptureError::Read`] if the file cannot be read and
/// [`CaptureError::Parse`] if it is not a JSON array of packet records.
pub fn load_capture(path: &Path) -> Result<Vec<CapturePacket>> {
    let json = std::fs::read_to_string(path).map_err(|source| CaptureError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let packets: Vec<CapturePacket> =
        serde_json::from_str(&json).map_err(|source| CaptureError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    log::debug!("Loaded {} packets from {}", packets.len(), path.display());

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_capture(json: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_parse_full_record() {
        let json = r#"[{
            "_source": { "layers": {
                "usb": {
                    "usb.device_address": "2",
                    "usb.urb_type": "'S'",
                    "usb.transfer_type": "0x03",
                    "usb.endpoint_address": "0x01"
                },
                "usb.capdata": "de:ad:be:ef"
            }}
        }]"#;

        let (_dir, path) = write_capture(json);
        let packets = load_capture(&path).unwrap();

        assert_eq!(packets.len(), 1);
        let layers = packets[0].source.as_ref().unwrap().layers.as_ref().unwrap();
        let usb = layers.usb.as_ref().unwrap();
        assert_eq!(usb.device_address.as_deref(), Some("2"));
        assert_eq!(usb.urb_type.as_deref(), Some("'S'"));
        assert_eq!(usb.transfer_type.as_deref(), Some("0x03"));
        assert_eq!(usb.endpoint_address.as_deref(), Some("0x01"));
        assert_eq!(layers.capdata.as_deref(), Some("de:ad:be:ef"));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        // Real exports carry frame layers and many more usb.* fields.
        let json = r#"[{
            "_index": "packets-2024-01-01",
            "_type": "doc",
            "_source": { "layers": {
                "frame": { "frame.number": "17" },
                "usb": {
                    "usb.src": "host",
                    "usb.dst": "2.1.0",
                    "usb.device_address": "2",
                    "usb.urb_type": "'S'",
                    "usb.transfer_type": "0x03",
                    "usb.endpoint_address": "0x01",
                    "usb.data_len": "4"
                }
            }}
        }]"#;

        let (_dir, path) = write_capture(json);
        let packets = load_capture(&path).unwrap();

        let layers = packets[0].source.as_ref().unwrap().layers.as_ref().unwrap();
        assert_eq!(
            layers.usb.as_ref().unwrap().device_address.as_deref(),
            Some("2")
        );
        assert!(layers.capdata.is_none());
    }

    #[test]
    fn test_parse_preserves_document_order() {
        let json = r#"[
            {"_source": {"layers": {"usb": {"usb.device_address": "1"}}}},
            {"_source": {"layers": {"usb": {"usb.device_address": "2"}}}},
            {"_source": {"layers": {"usb": {"usb.device_address": "3"}}}}
        ]"#;

        let (_dir, path) = write_capture(json);
        let packets = load_capture(&path).unwrap();

        let addresses: Vec<_> = packets
            .iter()
            .map(|p| {
                p.source
                    .as_ref()
                    .and_then(|s| s.layers.as_ref())
                    .and_then(|l| l.usb.as_ref())
                    .and_then(|u| u.device_address.clone())
                    .unwrap()
            })
            .collect();
        assert_eq!(addresses, ["1", "2", "3"]);
    }

    #[test]
    fn test_stripped_record_still_parses() {
        // Absent layers must not fail the parse; extraction reports them.
        let json = r#"[{}, {"_source": {}}, {"_source": {"layers": {}}}]"#;

        let (_dir, path) = write_capture(json);
        let packets = load_capture(&path).unwrap();

        assert_eq!(packets.len(), 3);
        assert!(packets[0].source.is_none());
        assert!(packets[1].source.as_ref().unwrap().layers.is_none());
        assert!(packets[2]
            .source
            .as_ref()
            .unwrap()
            .layers
            .as_ref()
            .unwrap()
            .usb
            .is_none());
    }

    #[test]
    fn test_top_level_object_is_parse_error() {
        let (_dir, path) = write_capture(r#"{"_source": {}}"#);
        let result = load_capture(&path);
        assert!(matches!(result, Err(CaptureError::Parse { .. })));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let (_dir, path) = write_capture("[{not json");
        let result = load_capture(&path);
        assert!(matches!(result, Err(CaptureError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_such_capture.json");
        let result = load_capture(&path);
        assert!(matches!(result, Err(CaptureError::Read { .. })));
    }
}
