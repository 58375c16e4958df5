//! Test utilities for `bulkstream`
//!
//! Provides synthetic capture-record generation so tests can exercise the
//! extraction pipeline without a real capture export on disk.

pub mod record_builder;

pub use record_builder::*;
