//! # Engine Primitives
//!
//! Compiled-in constants of the concept engine. Runtime-tunable values live in
//! [`crate::config::EngineConfig`]; the defaults here seed it.

/// Prefix of ids of vertex-backed concepts.
pub const VERTEX_PREFIX: &str = "V";

/// Prefix of ids of edge-backed concepts.
///
/// A relationship promoted from an edge to a vertex keeps this prefix.
pub const EDGE_PREFIX: &str = "E";

/// Separator between the type label and the value in an attribute index.
pub const INDEX_SEPARATOR: &str = "_";

/// Default number of instances a shard holds before rotation is due.
pub const DEFAULT_SHARDING_THRESHOLD: u64 = 10_000;

/// Default number of delete-and-retry rounds when an attribute index collides.
pub const DEFAULT_ATTRIBUTE_MERGE_ATTEMPTS: u32 = 3;

/// Magic bytes for the record format header.
///
/// - Record = Magic Bytes ("ONTG") + Version (u8) + postcard payload.
pub const MAGIC_BYTES: &[u8; 4] = b"ONTG";

/// Current record format version.
///
/// Increment this when making breaking changes to the record layout.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum depth of a supertype chain walked before the graph is treated as
/// corrupted.
pub const MAX_HIERARCHY_DEPTH: usize = 1024;

/// Build the unique attribute index string for a value of a type.
#[must_use]
pub fn attribute_index(type_label: &str, value: &str) -> String {
    format!("{}{}{}", type_label, INDEX_SEPARATOR, value)
}
