//! # Session
//!
//! A session owns one graph store, the session cache tier shared by all of
//! its transactions, the engine configuration and the commit validator.
//!
//! Opening a session on an empty store writes the meta schema: the roots
//! `thing`, `entity`, `relationship`, `attribute`, `role` and `rule`.
//!
//! ## Backends
//!
//! `StorageBackend` selects between the in-memory [`Graph`] and the
//! redb-backed [`RedbGraph`] at runtime. Any other `GraphStore` can back a
//! session directly through [`Session::open`].

use crate::cache::SessionTier;
use crate::concept::create_shard_vertex;
use crate::config::EngineConfig;
use crate::graph::{Claim, EdgeRecord, Graph, GraphStore, VertexRecord};
use crate::schema::{EdgeLabel, MetaSchema, PropertyKey};
use crate::storage::RedbGraph;
use crate::transaction::Transaction;
use crate::types::{Direction, ElementId, ElementRef, LabelId, OntographError, Value};
use crate::validation::{StructuralValidator, Validator};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (default, fast, non-persistent).
    InMemory(Graph),
    /// Persistent redb-backed graph (ACID, crash-safe).
    Persistent(RedbGraph),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Graph::new())
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StorageBackend::InMemory($store) => $call,
            StorageBackend::Persistent($store) => $call,
        }
    };
}

impl GraphStore for StorageBackend {
    fn add_vertex(&mut self, label: &str) -> Result<ElementId, OntographError> {
        dispatch!(self, s => s.add_vertex(label))
    }

    fn add_edge(
        &mut self,
        from: ElementId,
        to: ElementId,
        label: &str,
    ) -> Result<ElementId, OntographError> {
        dispatch!(self, s => s.add_edge(from, to, label))
    }

    fn vertex(&self, id: ElementId) -> Result<Option<VertexRecord>, OntographError> {
        dispatch!(self, s => s.vertex(id))
    }

    fn edge(&self, id: ElementId) -> Result<Option<EdgeRecord>, OntographError> {
        dispatch!(self, s => s.edge(id))
    }

    fn property(
        &self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError> {
        dispatch!(self, s => s.property(element, key))
    }

    fn set_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
        value: Value,
    ) -> Result<(), OntographError> {
        dispatch!(self, s => s.set_property(element, key, value))
    }

    fn remove_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError> {
        dispatch!(self, s => s.remove_property(element, key))
    }

    fn edges(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeRecord>, OntographError> {
        dispatch!(self, s => s.edges(vertex, direction, label))
    }

    fn edges_by_property(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: &str,
        key: PropertyKey,
        value: i64,
    ) -> Result<Vec<EdgeRecord>, OntographError> {
        dispatch!(self, s => s.edges_by_property(vertex, direction, label, key, value))
    }

    fn delete_vertex(&mut self, id: ElementId) -> Result<(), OntographError> {
        dispatch!(self, s => s.delete_vertex(id))
    }

    fn delete_edge(&mut self, id: ElementId) -> Result<(), OntographError> {
        dispatch!(self, s => s.delete_edge(id))
    }

    fn claim_unique(
        &mut self,
        vertex: ElementId,
        key: PropertyKey,
        value: &str,
    ) -> Result<Claim, OntographError> {
        dispatch!(self, s => s.claim_unique(vertex, key, value))
    }

    fn lookup_unique(
        &self,
        key: PropertyKey,
        value: &str,
    ) -> Result<Option<ElementId>, OntographError> {
        dispatch!(self, s => s.lookup_unique(key, value))
    }

    fn vertices_with_label(&self, label: &str) -> Result<Vec<ElementId>, OntographError> {
        dispatch!(self, s => s.vertices_with_label(label))
    }

    fn vertex_count(&self) -> Result<usize, OntographError> {
        dispatch!(self, s => s.vertex_count())
    }

    fn edge_count(&self) -> Result<usize, OntographError> {
        dispatch!(self, s => s.edge_count())
    }

    fn begin(&mut self) -> Result<(), OntographError> {
        dispatch!(self, s => s.begin())
    }

    fn commit(&mut self) -> Result<(), OntographError> {
        dispatch!(self, s => s.commit())
    }

    fn rollback(&mut self) -> Result<(), OntographError> {
        dispatch!(self, s => s.rollback())
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Long-lived owner of a graph store and everything its transactions share.
pub struct Session<S: GraphStore = StorageBackend> {
    store: S,
    tier: SessionTier,
    config: EngineConfig,
    validator: Box<dyn Validator<S>>,
}

impl<S: GraphStore + std::fmt::Debug> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("session_entries", &self.tier.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Session<StorageBackend> {
    /// Create a session over a fresh in-memory graph with default configuration.
    pub fn in_memory() -> Result<Self, OntographError> {
        Self::open(StorageBackend::default(), EngineConfig::default())
    }

    /// Open or create a persistent session backed by a redb file.
    pub fn persistent(
        path: impl AsRef<Path>,
        config: EngineConfig,
    ) -> Result<Self, OntographError> {
        let graph = RedbGraph::open(path)?;
        Self::open(StorageBackend::Persistent(graph), config)
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.store, StorageBackend::Persistent(_))
    }
}

impl<S: GraphStore> Session<S> {
    /// Open a session over `store`, writing the meta schema if it is missing.
    pub fn open(mut store: S, config: EngineConfig) -> Result<Self, OntographError> {
        if store
            .lookup_unique(PropertyKey::SchemaLabel, MetaSchema::Thing.label_str())?
            .is_none()
        {
            store.begin()?;
            match write_meta_schema(&mut store) {
                Ok(()) => store.commit()?,
                Err(e) => {
                    store.rollback()?;
                    return Err(e);
                }
            }
            tracing::info!("bootstrapped meta schema");
        }
        Ok(Self {
            store,
            tier: SessionTier::new(),
            config,
            validator: Box::new(StructuralValidator),
        })
    }

    /// Replace the commit validator.
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator<S> + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Open a transaction. It borrows the session exclusively until it is
    /// committed, rolled back or dropped.
    pub fn transaction(&mut self) -> Result<Transaction<'_, S>, OntographError> {
        Transaction::open(
            &mut self.store,
            &mut self.tier,
            &self.config,
            self.validator.as_ref(),
        )
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only access to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of concepts with state in the session cache tier.
    #[must_use]
    pub fn session_cache_size(&self) -> usize {
        self.tier.len()
    }

    /// Close the session and hand back its store.
    pub fn into_store(self) -> S {
        self.store
    }
}

/// Write the meta concepts, their SUB edges and the meta types' first shards.
fn write_meta_schema<S: GraphStore>(store: &mut S) -> Result<(), OntographError> {
    let mut vertices = BTreeMap::new();
    for meta in MetaSchema::ALL {
        let vertex = store.add_vertex(meta.base_type().as_str())?;
        if let Claim::Taken(holder) =
            store.claim_unique(vertex, PropertyKey::SchemaLabel, meta.label_str())?
        {
            return Err(OntographError::CorruptedElement {
                element: ElementRef::Vertex(holder),
                property: PropertyKey::SchemaLabel.as_str(),
            });
        }
        let element = ElementRef::Vertex(vertex);
        store.set_property(element, PropertyKey::LabelId, LabelId(vertex.0).to_value())?;
        if matches!(
            meta,
            MetaSchema::Entity | MetaSchema::Relationship | MetaSchema::Attribute
        ) {
            store.set_property(element, PropertyKey::IsAbstract, Value::Boolean(true))?;
        }
        vertices.insert(meta, vertex);
    }

    for (meta, vertex) in &vertices {
        if let Some(parent) = meta.sup().and_then(|sup| vertices.get(&sup)) {
            store.add_edge(*vertex, *parent, EdgeLabel::Sub.as_str())?;
        }
        if !matches!(meta, MetaSchema::Role | MetaSchema::Rule) {
            create_shard_vertex(store, *vertex)?;
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
