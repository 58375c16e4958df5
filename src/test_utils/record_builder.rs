//! Synthetic capture records for testing
//!
//! Builds packet records shaped like a tshark `-T json` USB capture export,
//! with known field values, so tests can validate filtering and payload
//! decoding byte-for-byte.
//!
//! # Example
//!
//! ```rust,ignore
//! use bulkstream::test_utils::{CaptureExport, RecordBuilder};
//!
//! let export = CaptureExport::new()
//!     .record(RecordBuilder::bulk_submit("2").capdata("aa:bb"))
//!     .record(RecordBuilder::bulk_submit("3").capdata("cc:dd"));
//! export.write(&path)?;
//! ```

use serde_json::{json, Map, Value};
use std::path::Path;

use crate::capture::CapturePacket;

/// Builder for a single packet record.
///
/// [`RecordBuilder::bulk_submit`] starts from a record that matches the bulk
/// filter; the setters override individual fields to produce non-matching or
/// malformed variants.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    device_address: Option<String>,
    urb_type: Option<String>,
    transfer_type: Option<String>,
    endpoint_address: Option<String>,
    capdata: Option<String>,
    has_usb_layer: bool,
}

impl RecordBuilder {
    /// A record for a bulk-transfer submit URB on endpoint `0x01` of the
    /// given device, with no payload until [`capdata`](Self::capdata) is set.
    #[must_use]
    pub fn bulk_submit(device_address: &str) -> Self {
        Self {
            device_address: Some(device_address.to_string()),
            urb_type: Some("'S'".to_string()),
            transfer_type: Some("0x03".to_string()),
            endpoint_address: Some("0x01".to_string()),
            capdata: None,
            has_usb_layer: true,
        }
    }

    /// A record whose `layers` object has no `usb` member at all.
    #[must_use]
    pub fn without_usb_layer() -> Self {
        Self {
            device_address: None,
            urb_type: None,
            transfer_type: None,
            endpoint_address: None,
            capdata: None,
            has_usb_layer: false,
        }
    }

    /// Overrides the URB type field, e.g. `"'C'"` for a completion.
    #[must_use]
    pub fn urb_type(mut self, value: &str) -> Self {
        self.urb_type = Some(value.to_string());
        self
    }

    /// Overrides the transfer type field, e.g. `"0x01"` for interrupt.
    #[must_use]
    pub fn transfer_type(mut self, value: &str) -> Self {
        self.transfer_type = Some(value.to_string());
        self
    }

    /// Overrides the endpoint address field.
    #[must_use]
    pub fn endpoint_address(mut self, value: &str) -> Self {
        self.endpoint_address = Some(value.to_string());
        self
    }

    /// Sets the `usb.capdata` payload field (colon-separated hex).
    #[must_use]
    pub fn capdata(mut self, value: &str) -> Self {
        self.capdata = Some(value.to_string());
        self
    }

    /// Renders the record as a capture-export JSON value.
    #[must_use]
    pub fn build(&self) -> Value {
        let mut layers = Map::new();

        if self.has_usb_layer {
            let mut usb = Map::new();
            if let Some(ref v) = self.device_address {
                usb.insert("usb.device_address".into(), json!(v));
            }
            if let Some(ref v) = self.urb_type {
                usb.insert("usb.urb_type".into(), json!(v));
            }
            if let Some(ref v) = self.transfer_type {
                usb.insert("usb.transfer_type".into(), json!(v));
            }
            if let Some(ref v) = self.endpoint_address {
                usb.insert("usb.endpoint_address".into(), json!(v));
            }
            layers.insert("usb".into(), Value::Object(usb));
        }

        if let Some(ref v) = self.capdata {
            layers.insert("usb.capdata".into(), json!(v));
        }

        json!({ "_source": { "layers": layers } })
    }
}

/// An in-memory capture export assembled from builder records.
#[derive(Debug, Default)]
pub struct CaptureExport {
    records: Vec<Value>,
}

impl CaptureExport {
    /// Creates an export with no records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record; records keep insertion order in the export.
    #[must_use]
    pub fn record(mut self, record: RecordBuilder) -> Self {
        self.records.push(record.build());
        self
    }

    /// Renders the export as a JSON document string.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Array(self.records.clone()).to_string()
    }

    /// Writes the export to disk as a capture file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be written.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_json())
    }

    /// Deserializes the export into typed packets, as loading the written
    /// file would.
    ///
    /// # Panics
    ///
    /// Panics if a record does not deserialize; builder output always does.
    #[must_use]
    pub fn packets(&self) -> Vec<CapturePacket> {
        serde_json::from_value(Value::Array(self.records.clone()))
            .expect("builder records always deserialize")
    }
}
