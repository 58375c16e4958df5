//! `bulkstream` - USB bulk-transfer payload extraction
//!
//! Reads a tshark `-T json` export of a USB capture, selects the
//! bulk-transfer URBs submitted to one device address, and concatenates
//! their payload bytes into a `.bulkstream` file next to the capture.
//!
//! The [`capture`] module holds the typed model of the export; the
//! [`extract`] module holds the filter criteria and the extraction pass.

pub mod capture;
pub mod extract;
pub mod test_utils;

pub use extract::{extract_to_file, BulkFilter};
