//! `bulkstream` command-line entry point
//!
//! This binary crate parses the command line and delegates to the library's
//! extraction pass.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use bulkstream::{extract_to_file, BulkFilter};

/// Extract USB bulk-transfer payloads from a tshark JSON capture export.
///
/// Selects the bulk URBs submitted to the given device address and writes
/// their concatenated payload bytes to `<capture>.bulkstream`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON capture export
    capture: PathBuf,

    /// Device address to filter on, compared exactly (e.g. "2")
    device_address: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let filter = BulkFilter::new(args.device_address);
    let result = extract_to_file(&args.capture, &filter)?;

    println!(
        "wrote {} bytes from {} matching packets to {}",
        result.summary.bytes_written,
        result.summary.packets_matched,
        result.output_path.display()
    );

    Ok(())
}
