//! # Storage Backends
//!
//! Durable implementations of [`crate::graph::GraphStore`].

pub mod redb_graph;

pub use redb_graph::RedbGraph;
