//! Bulk payload extraction from capture exports.
//!
//! Selects the bulk-transfer URBs submitted to one device address and
//! concatenates their payload bytes, in capture order, into a `.bulkstream`
//! file next to the capture:
//!
//! ```rust,ignore
//! use std::path::Path;
//! use bulkstream::extract::{extract_to_file, BulkFilter};
//!
//! let filter = BulkFilter::new("2");
//! let result = extract_to_file(Path::new("capture.json"), &filter)?;
//! println!("{} bytes", result.summary.bytes_written);
//! ```
//!
//! # Error policy
//!
//! The pass fails fast: the first packet with a missing layer field
//! ([`ExtractError::Schema`]) or a malformed payload
//! ([`ExtractError::Payload`]) aborts the whole run, carrying the packet
//! index. Skipping such packets silently would mask a malformed capture.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::capture::{self, CaptureError, CapturePacket, UsbLayer};

/// URB type value of a submitted transfer. The quotes are part of the field
/// value as the capture tool exports it.
const URB_TYPE_SUBMIT: &str = "'S'";

/// Transfer type value of a bulk transfer.
const TRANSFER_TYPE_BULK: &str = "0x03";

/// Address of the endpoint the payload stream is carried on.
const BULK_ENDPOINT: &str = "0x01";

/// Extension given to the output file, replacing the capture's extension.
const OUTPUT_EXTENSION: &str = "bulkstream";

/// Errors that can occur during payload extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Capture file could not be loaded.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// A packet record lacks part of the expected layer shape.
    #[error("packet {index} is missing expected field {field}")]
    Schema {
        /// Zero-based index of the packet in the capture.
        index: usize,
        /// Capture-tool name of the missing field.
        field: &'static str,
    },

    /// A matching packet carries a payload that is not valid hex.
    #[error("packet {index} has a malformed capdata payload")]
    Payload {
        /// Zero-based index of the packet in the capture.
        index: usize,
        /// Underlying hex decoding error.
        source: hex::FromHexError,
    },

    /// Output file could not be created.
    #[error("failed to create output file {path}")]
    CreateOutput {
        /// Path of the output file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// I/O error writing the output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Match criteria for selecting bulk payload packets.
///
/// The three protocol constants (submit URB, bulk transfer, endpoint `0x01`)
/// are fixed; only the device address varies per run. All comparisons are
/// exact string equality against the dissected field values, so `"2"` and
/// `"02"` name different devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFilter {
    /// Bus address of the device to extract, e.g. `"2"`.
    pub device_address: String,
}

impl BulkFilter {
    /// Creates a filter for one device address.
    pub fn new(device_address: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
        }
    }

    /// Checks a packet's USB layer against all four criteria.
    ///
    /// # Errors
    ///
    /// Returns the capture-tool name of the first absent field; a layer
    /// missing any of the four fields is malformed, not a non-match.
    pub fn matches(&self, usb: &UsbLayer) -> std::result::Result<bool, &'static str> {
        let device_address = usb
            .device_address
            .as_deref()
            .ok_or("usb.device_address")?;
        let urb_type = usb.urb_type.as_deref().ok_or("usb.urb_type")?;
        let transfer_type = usb.transfer_type.as_deref().ok_or("usb.transfer_type")?;
        let endpoint_address = usb
            .endpoint_address
            .as_deref()
            .ok_or("usb.endpoint_address")?;

        Ok(device_address == self.device_address
            && urb_type == URB_TYPE_SUBMIT
            && transfer_type == TRANSFER_TYPE_BULK
            && endpoint_address == BULK_ENDPOINT)
    }
}

/// Decodes a colon-separated hex payload field into raw bytes.
///
/// `"de:ad:be:ef"` and `"deadbeef"` decode identically; an empty field
/// decodes to no bytes.
///
/// # Errors
///
/// Returns [`hex::FromHexError`] if the value has an odd number of digits or
/// contains non-hex characters after colon removal.
pub fn decode_capdata(capdata: &str) -> std::result::Result<Vec<u8>, hex::FromHexError> {
    hex::decode(capdata.replace(':', ""))
}

/// Derives the output path from the capture path.
///
/// Only the final extension is replaced: `capture.json` becomes
/// `capture.bulkstream` and `dir/sub.pcapng.json` becomes
/// `dir/sub.pcapng.bulkstream`.
#[must_use]
pub fn output_path(capture_path: &Path) -> PathBuf {
    capture_path.with_extension(OUTPUT_EXTENSION)
}

/// Totals from one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Packets examined, matching or not.
    pub packets_scanned: usize,
    /// Packets that matched all four filter criteria.
    pub packets_matched: usize,
    /// Payload bytes written to the output stream.
    pub bytes_written: u64,
}

/// Result returned when extraction completes.
#[derive(Debug)]
pub struct ExtractResult {
    /// Path of the written bulkstream file.
    pub output_path: PathBuf,
    /// Totals from the run.
    pub summary: ExtractSummary,
}

/// Runs the extraction pass over in-memory packets, appending the decoded
/// payload of every matching packet to `out` with no delimiter between
/// packets.
///
/// Output byte order follows packet order; nothing is reordered or
/// deduplicated.
///
/// # Errors
///
/// Fails fast on the first packet with a missing layer field or malformed
/// payload, and on any write failure.
pub fn extract_into<W: Write>(
    packets: &[CapturePacket],
    filter: &BulkFilter,
    out: &mut W,
) -> Result<ExtractSummary> {
    let mut packets_matched = 0;
    let mut bytes_written = 0u64;

    for (index, packet) in packets.iter().enumerate() {
        let source = packet.source.as_ref().ok_or(ExtractError::Schema {
            index,
            field: "_source",
        })?;
        let layers = source.layers.as_ref().ok_or(ExtractError::Schema {
            index,
            field: "_source.layers",
        })?;
        let usb = layers.usb.as_ref().ok_or(ExtractError::Schema {
            index,
            field: "usb",
        })?;

        let matched = filter
            .matches(usb)
            .map_err(|field| ExtractError::Schema { index, field })?;
        if !matched {
            continue;
        }

        // A matching submit URB without payload bytes is malformed.
        let capdata = layers.capdata.as_deref().ok_or(ExtractError::Schema {
            index,
            field: "usb.capdata",
        })?;
        let payload =
            decode_capdata(capdata).map_err(|source| ExtractError::Payload { index, source })?;

        out.write_all(&payload)?;
        packets_matched += 1;
        bytes_written += payload.len() as u64;

        log::trace!("packet {}: {} payload bytes", index, payload.len());
    }

    Ok(ExtractSummary {
        packets_scanned: packets.len(),
        packets_matched,
        bytes_written,
    })
}

/// Extracts bulk payloads from a capture file into its sibling
/// `.bulkstream` file.
///
/// The output file is created fresh (truncated) before the pass begins, so a
/// run with zero matches still leaves a zero-length file behind.
///
/// # Errors
///
/// Returns [`ExtractError::Capture`] if the capture cannot be loaded,
/// [`ExtractError::CreateOutput`] if the output file cannot be created, and
/// the per-packet errors described on [`extract_into`].
pub fn extract_to_file(capture_path: &Path, filter: &BulkFilter) -> Result<ExtractResult> {
    let packets = capture::load_capture(capture_path)?;

    let out_path = output_path(capture_path);
    let file = File::create(&out_path).map_err(|source| ExtractError::CreateOutput {
        path: out_path.display().to_string(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let summary = extract_into(&packets, filter, &mut writer)?;
    writer.flush()?;

    if summary.packets_matched == 0 {
        log::warn!(
            "no packets matched device address {} in {}",
            filter.device_address,
            capture_path.display()
        );
    }

    log::info!(
        "{}: matched {} of {} packets, wrote {} bytes to {}",
        capture_path.display(),
        summary.packets_matched,
        summary.packets_scanned,
        summary.bytes_written,
        out_path.display()
    );

    Ok(ExtractResult {
        output_path: out_path,
        summary,
    })
}
