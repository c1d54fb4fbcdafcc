//! # ontograph-core
//!
//! The concept engine of Ontograph.
//!
//! This crate maps a typed knowledge model onto a generic property graph:
//! schema concepts (entity, relationship and attribute types, roles, rules)
//! and their instances are each backed by one graph vertex or edge.
//!
//! ## What lives here
//!
//! - An identity cache: within one transaction, one concept object per id.
//! - Three cache lifetimes (transaction, session, permanent) for derived state.
//! - Sharded type membership: instances link to a rotating shard vertex, never
//!   to the type vertex itself.
//! - Relationships in two physical forms. Attribute attachment creates compact
//!   edge relationships; adding a third role player promotes one, keeping its
//!   id, to a reified vertex with one role-player edge per casting.
//! - Merge-on-collision attribute creation over the store's unique index.
//! - Commit-time validation over the concepts a transaction touched.
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: no async, no network dependencies
//! - Deterministic: `BTreeMap`/`BTreeSet` for every ordered structure
//! - Storage is a seam: any `GraphStore` can back a session

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod concept;
pub mod config;
pub mod formats;
pub mod graph;
pub mod primitives;
pub mod schema;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ConceptId, DataType, Direction, ElementId, ElementRef, Label, LabelId, OntographError, Value,
};

// =============================================================================
// RE-EXPORTS: Concept Engine
// =============================================================================

pub use cache::{PermanentCache, SessionCache, TxCache};
pub use concept::{
    AnyConcept, Attribute, AttributeType, Casting, Concept, ConceptHandle, ConceptKind,
    ConceptStream, Entity, EntityType, MetaType, Relationship, RelationshipStructure,
    RelationshipType, Role, Rule, SchemaConcept, SchemaHandle, Thing, ThingHandle, Type,
    TypeHandle, TypedHandle,
};
pub use config::EngineConfig;
pub use schema::{BaseType, EdgeLabel, ImplicitType, MetaSchema, PropertyKey};
pub use session::{Session, StorageBackend};
pub use transaction::Transaction;
pub use validation::{StructuralValidator, ValidationTracking, Validator};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use graph::{Claim, EdgeRecord, Graph, GraphStore, VertexRecord};
pub use storage::RedbGraph;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{RecordHeader, decode_record, encode_record};
