//! # Formats
//!
//! Binary encodings of stored graph elements.

pub mod persistence;

pub use persistence::{RecordHeader, decode_record, encode_record};
