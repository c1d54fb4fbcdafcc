//! # Graph Element Adapter
//!
//! The property-graph seam the concept engine is written against, and the
//! in-memory implementation.
//!
//! This module defines the `GraphStore` trait: vertex/edge CRUD, typed
//! properties, directional traversal by edge label, indexed edge lookup and
//! atomic unique-property claims. All data structures use `BTreeMap` for
//! deterministic ordering.

use crate::schema::PropertyKey;
use crate::types::{Direction, ElementId, ElementRef, OntographError, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RECORDS
// =============================================================================

/// A stored vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub id: ElementId,
    pub label: String,
    pub properties: BTreeMap<PropertyKey, Value>,
}

/// A stored, directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: ElementId,
    pub label: String,
    pub from: ElementId,
    pub to: ElementId,
    pub properties: BTreeMap<PropertyKey, Value>,
}

impl EdgeRecord {
    /// The endpoint opposite to `vertex`.
    #[must_use]
    pub fn other(&self, vertex: ElementId) -> ElementId {
        if self.from == vertex { self.to } else { self.from }
    }

    /// Long-valued edge property.
    #[must_use]
    pub fn long(&self, key: PropertyKey) -> Option<i64> {
        self.properties.get(&key).and_then(Value::as_long)
    }
}

/// One reversible write made inside an open store transaction.
#[derive(Debug, Clone)]
enum Undo {
    AddedVertex(ElementId),
    AddedEdge(ElementId),
    RemovedVertex(VertexRecord),
    RemovedEdge(EdgeRecord),
    Property {
        element: ElementRef,
        key: PropertyKey,
        previous: Option<Value>,
    },
    Claim {
        slot: (PropertyKey, String),
        previous: Option<ElementId>,
    },
}

/// Undo log of the open store transaction.
#[derive(Debug, Clone)]
struct Journal {
    next_id: u64,
    entries: Vec<Undo>,
}

/// Outcome of an atomic unique-property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The vertex now holds the value.
    Claimed,
    /// Another vertex already holds the value.
    Taken(ElementId),
}

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// The GraphStore trait defines the property-graph operations the concept
/// engine consumes.
///
/// All fallible operations return `Result<T, OntographError>` to support both
/// in-memory and persistent storage backends uniformly. Writes land in the
/// open store transaction and become durable on `commit`.
pub trait GraphStore {
    /// Create a vertex with the given label.
    fn add_vertex(&mut self, label: &str) -> Result<ElementId, OntographError>;

    /// Create an edge. Both endpoints must exist.
    fn add_edge(
        &mut self,
        from: ElementId,
        to: ElementId,
        label: &str,
    ) -> Result<ElementId, OntographError>;

    /// Lookup a vertex. Returns an owned record for storage compatibility.
    fn vertex(&self, id: ElementId) -> Result<Option<VertexRecord>, OntographError>;

    /// Lookup an edge.
    fn edge(&self, id: ElementId) -> Result<Option<EdgeRecord>, OntographError>;

    /// Read one property of a vertex or edge.
    fn property(
        &self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError>;

    /// Write one property of a vertex or edge.
    fn set_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
        value: Value,
    ) -> Result<(), OntographError>;

    /// Remove one property, releasing any unique claim it held.
    fn remove_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError>;

    /// Edges incident to `vertex` in `direction`, optionally restricted to a label.
    fn edges(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeRecord>, OntographError>;

    /// Edges incident to `vertex` whose long property `key` equals `value`.
    ///
    /// Served from an index, not a scan of the vertex's edges.
    fn edges_by_property(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: &str,
        key: PropertyKey,
        value: i64,
    ) -> Result<Vec<EdgeRecord>, OntographError>;

    /// Delete a vertex, every incident edge and every unique claim it holds.
    fn delete_vertex(&mut self, id: ElementId) -> Result<(), OntographError>;

    /// Delete an edge.
    fn delete_edge(&mut self, id: ElementId) -> Result<(), OntographError>;

    /// Atomically write a unique string property.
    fn claim_unique(
        &mut self,
        vertex: ElementId,
        key: PropertyKey,
        value: &str,
    ) -> Result<Claim, OntographError>;

    /// The vertex holding a unique string property, if any.
    fn lookup_unique(
        &self,
        key: PropertyKey,
        value: &str,
    ) -> Result<Option<ElementId>, OntographError>;

    /// All vertices carrying `label`, in id order.
    fn vertices_with_label(&self, label: &str) -> Result<Vec<ElementId>, OntographError>;

    fn vertex_count(&self) -> Result<usize, OntographError>;

    fn edge_count(&self) -> Result<usize, OntographError>;

    /// Open a store transaction.
    fn begin(&mut self) -> Result<(), OntographError>;

    /// Make every write since `begin` durable.
    fn commit(&mut self) -> Result<(), OntographError>;

    /// Discard every write since `begin`.
    fn rollback(&mut self) -> Result<(), OntographError>;
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering. Store transactions
/// keep an undo log: every write after `begin` records how to reverse itself,
/// and `rollback` replays the log backwards. Nothing is copied up front.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Vertex storage: ElementId -> VertexRecord
    vertices: BTreeMap<ElementId, VertexRecord>,

    /// Edge storage: ElementId -> EdgeRecord
    edges: BTreeMap<ElementId, EdgeRecord>,

    /// Outgoing adjacency: vertex -> edge ids
    out_edges: BTreeMap<ElementId, BTreeSet<ElementId>>,

    /// Incoming adjacency: vertex -> edge ids
    in_edges: BTreeMap<ElementId, BTreeSet<ElementId>>,

    /// Unique claims: (key, value) -> holder
    unique: BTreeMap<(PropertyKey, String), ElementId>,

    /// Long-property index over edges, keyed by each endpoint.
    edge_index: BTreeMap<(ElementId, PropertyKey, i64), BTreeSet<ElementId>>,

    /// Next available element id, shared by vertices and edges.
    next_id: u64,

    /// Undo log of the open store transaction, if any.
    journal: Option<Journal>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from stored records, recomputing adjacency and indexes.
    pub fn from_records(
        vertices: Vec<VertexRecord>,
        edges: Vec<EdgeRecord>,
        claims: Vec<(PropertyKey, String, ElementId)>,
        next_id: u64,
    ) -> Result<Self, OntographError> {
        let mut graph = Self {
            next_id,
            ..Self::default()
        };
        for vertex in vertices {
            graph.next_id = graph.next_id.max(vertex.id.0 + 1);
            graph.vertices.insert(vertex.id, vertex);
        }
        for edge in edges {
            if !graph.vertices.contains_key(&edge.from) || !graph.vertices.contains_key(&edge.to) {
                return Err(OntographError::ElementNotFound(ElementRef::Edge(edge.id)));
            }
            graph.next_id = graph.next_id.max(edge.id.0 + 1);
            graph.link(&edge);
            graph.edges.insert(edge.id, edge);
        }
        for (key, value, holder) in claims {
            graph.unique.insert((key, value), holder);
        }
        Ok(graph)
    }

    /// All vertices in id order.
    pub fn vertex_records(&self) -> impl Iterator<Item = &VertexRecord> {
        self.vertices.values()
    }

    /// All edges in id order.
    pub fn edge_records(&self) -> impl Iterator<Item = &EdgeRecord> {
        self.edges.values()
    }

    /// All unique claims.
    pub fn claims(&self) -> impl Iterator<Item = (PropertyKey, &str, ElementId)> + '_ {
        self.unique
            .iter()
            .map(|((key, value), holder)| (*key, value.as_str(), *holder))
    }

    /// Next id that would be assigned.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Whether a store transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    /// Writes recorded by the open store transaction.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.journal.as_ref().map_or(0, |j| j.entries.len())
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.entries.push(undo);
        }
    }

    fn allocate(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    fn link(&mut self, edge: &EdgeRecord) {
        self.out_edges.entry(edge.from).or_default().insert(edge.id);
        self.in_edges.entry(edge.to).or_default().insert(edge.id);
        for (key, value) in &edge.properties {
            if let Value::Long(n) = value {
                self.index_edge(edge, *key, *n);
            }
        }
    }

    fn index_edge(&mut self, edge: &EdgeRecord, key: PropertyKey, value: i64) {
        for endpoint in [edge.from, edge.to] {
            self.edge_index
                .entry((endpoint, key, value))
                .or_default()
                .insert(edge.id);
        }
    }

    fn unindex_edge(&mut self, edge: &EdgeRecord, key: PropertyKey, value: i64) {
        for endpoint in [edge.from, edge.to] {
            let slot = (endpoint, key, value);
            if let Some(set) = self.edge_index.get_mut(&slot) {
                set.remove(&edge.id);
                if set.is_empty() {
                    self.edge_index.remove(&slot);
                }
            }
        }
    }

    fn release_claim(&mut self, holder: ElementId, key: PropertyKey, value: &Value) {
        if let Value::String(s) = value {
            let slot = (key, s.clone());
            if self.unique.get(&slot) == Some(&holder) {
                self.unique.remove(&slot);
                self.record(Undo::Claim {
                    slot,
                    previous: Some(holder),
                });
            }
        }
    }

    /// Remove an edge from storage, adjacency and the index.
    fn unlink(&mut self, id: ElementId) -> Option<EdgeRecord> {
        let edge = self.edges.remove(&id)?;
        if let Some(set) = self.out_edges.get_mut(&edge.from) {
            set.remove(&id);
        }
        if let Some(set) = self.in_edges.get_mut(&edge.to) {
            set.remove(&id);
        }
        for (key, value) in &edge.properties {
            if let Value::Long(n) = value {
                self.unindex_edge(&edge, *key, *n);
            }
        }
        Some(edge)
    }

    /// Reverse one journaled write. Later writes must already be reversed.
    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::AddedVertex(id) => {
                self.vertices.remove(&id);
                self.out_edges.remove(&id);
                self.in_edges.remove(&id);
            }
            Undo::AddedEdge(id) => {
                self.unlink(id);
            }
            Undo::RemovedVertex(record) => {
                self.vertices.insert(record.id, record);
            }
            Undo::RemovedEdge(record) => {
                self.link(&record);
                self.edges.insert(record.id, record);
            }
            Undo::Property {
                element,
                key,
                previous,
            } => {
                let Ok(properties) = self.properties_mut(element) else {
                    return;
                };
                let current = match &previous {
                    Some(value) => properties.insert(key, value.clone()),
                    None => properties.remove(&key),
                };
                if let ElementRef::Edge(id) = element {
                    if let Some(edge) = self.edges.get(&id).cloned() {
                        if let Some(Value::Long(n)) = current {
                            self.unindex_edge(&edge, key, n);
                        }
                        if let Some(Value::Long(n)) = previous {
                            self.index_edge(&edge, key, n);
                        }
                    }
                }
            }
            Undo::Claim { slot, previous } => match previous {
                Some(holder) => {
                    self.unique.insert(slot, holder);
                }
                None => {
                    self.unique.remove(&slot);
                }
            },
        }
    }

    fn matches(edge: &EdgeRecord, vertex: ElementId, direction: Direction, label: Option<&str>) -> bool {
        let direction_ok = match direction {
            Direction::Out => edge.from == vertex,
            Direction::In => edge.to == vertex,
            Direction::Both => edge.from == vertex || edge.to == vertex,
        };
        direction_ok && label.is_none_or(|l| edge.label == l)
    }

    fn properties_mut(
        &mut self,
        element: ElementRef,
    ) -> Result<&mut BTreeMap<PropertyKey, Value>, OntographError> {
        match element {
            ElementRef::Vertex(id) => self
                .vertices
                .get_mut(&id)
                .map(|v| &mut v.properties)
                .ok_or(OntographError::ElementNotFound(element)),
            ElementRef::Edge(id) => self
                .edges
                .get_mut(&id)
                .map(|e| &mut e.properties)
                .ok_or(OntographError::ElementNotFound(element)),
        }
    }
}

impl GraphStore for Graph {
    fn add_vertex(&mut self, label: &str) -> Result<ElementId, OntographError> {
        let id = self.allocate();
        self.vertices.insert(
            id,
            VertexRecord {
                id,
                label: label.to_string(),
                properties: BTreeMap::new(),
            },
        );
        self.record(Undo::AddedVertex(id));
        Ok(id)
    }

    fn add_edge(
        &mut self,
        from: ElementId,
        to: ElementId,
        label: &str,
    ) -> Result<ElementId, OntographError> {
        for endpoint in [from, to] {
            if !self.vertices.contains_key(&endpoint) {
                return Err(OntographError::ElementNotFound(ElementRef::Vertex(endpoint)));
            }
        }
        let id = self.allocate();
        let edge = EdgeRecord {
            id,
            label: label.to_string(),
            from,
            to,
            properties: BTreeMap::new(),
        };
        self.link(&edge);
        self.edges.insert(id, edge);
        self.record(Undo::AddedEdge(id));
        Ok(id)
    }

    fn vertex(&self, id: ElementId) -> Result<Option<VertexRecord>, OntographError> {
        Ok(self.vertices.get(&id).cloned())
    }

    fn edge(&self, id: ElementId) -> Result<Option<EdgeRecord>, OntographError> {
        Ok(self.edges.get(&id).cloned())
    }

    fn property(
        &self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError> {
        let properties = match element {
            ElementRef::Vertex(id) => self.vertices.get(&id).map(|v| &v.properties),
            ElementRef::Edge(id) => self.edges.get(&id).map(|e| &e.properties),
        };
        Ok(properties.and_then(|p| p.get(&key).cloned()))
    }

    fn set_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
        value: Value,
    ) -> Result<(), OntographError> {
        let previous = self.properties_mut(element)?.insert(key, value.clone());
        if let ElementRef::Edge(id) = element {
            if let Some(edge) = self.edges.get(&id).cloned() {
                if let Some(Value::Long(old)) = previous {
                    self.unindex_edge(&edge, key, old);
                }
                if let Value::Long(n) = value {
                    self.index_edge(&edge, key, n);
                }
            }
        }
        self.record(Undo::Property {
            element,
            key,
            previous,
        });
        Ok(())
    }

    fn remove_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError> {
        let previous = self.properties_mut(element)?.remove(&key);
        if previous.is_some() {
            self.record(Undo::Property {
                element,
                key,
                previous: previous.clone(),
            });
        }
        match (element, &previous) {
            (ElementRef::Vertex(id), Some(value)) => self.release_claim(id, key, value),
            (ElementRef::Edge(id), Some(Value::Long(old))) => {
                if let Some(edge) = self.edges.get(&id).cloned() {
                    self.unindex_edge(&edge, key, *old);
                }
            }
            _ => {}
        }
        Ok(previous)
    }

    fn edges(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeRecord>, OntographError> {
        let empty = BTreeSet::new();
        let outgoing = matches!(direction, Direction::Out | Direction::Both)
            .then(|| self.out_edges.get(&vertex).unwrap_or(&empty));
        let incoming = matches!(direction, Direction::In | Direction::Both)
            .then(|| self.in_edges.get(&vertex).unwrap_or(&empty));

        let ids: BTreeSet<ElementId> = outgoing
            .into_iter()
            .chain(incoming)
            .flat_map(|set| set.iter().copied())
            .collect();

        Ok(ids
            .into_iter()
            .filter_map(|id| self.edges.get(&id))
            .filter(|e| label.is_none_or(|l| e.label == l))
            .cloned()
            .collect())
    }

    fn edges_by_property(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: &str,
        key: PropertyKey,
        value: i64,
    ) -> Result<Vec<EdgeRecord>, OntographError> {
        let Some(ids) = self.edge_index.get(&(vertex, key, value)) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.edges.get(id))
            .filter(|e| Self::matches(e, vertex, direction, Some(label)))
            .cloned()
            .collect())
    }

    fn delete_vertex(&mut self, id: ElementId) -> Result<(), OntographError> {
        let incident = self.edges(id, Direction::Both, None)?;
        for edge in incident {
            self.delete_edge(edge.id)?;
        }
        if let Some(vertex) = self.vertices.remove(&id) {
            for (key, value) in &vertex.properties {
                self.release_claim(id, *key, value);
            }
            self.record(Undo::RemovedVertex(vertex));
        }
        self.out_edges.remove(&id);
        self.in_edges.remove(&id);
        Ok(())
    }

    fn delete_edge(&mut self, id: ElementId) -> Result<(), OntographError> {
        if let Some(edge) = self.unlink(id) {
            self.record(Undo::RemovedEdge(edge));
        }
        Ok(())
    }

    fn claim_unique(
        &mut self,
        vertex: ElementId,
        key: PropertyKey,
        value: &str,
    ) -> Result<Claim, OntographError> {
        if !self.vertices.contains_key(&vertex) {
            return Err(OntographError::ElementNotFound(ElementRef::Vertex(vertex)));
        }
        let slot = (key, value.to_string());
        if let Some(holder) = self.unique.get(&slot) {
            if *holder != vertex {
                return Ok(Claim::Taken(*holder));
            }
        }
        let element = ElementRef::Vertex(vertex);
        let previous_holder = self.unique.insert(slot.clone(), vertex);
        let previous = self
            .properties_mut(element)?
            .insert(key, Value::String(value.to_string()));
        self.record(Undo::Claim {
            slot,
            previous: previous_holder,
        });
        self.record(Undo::Property {
            element,
            key,
            previous,
        });
        Ok(Claim::Claimed)
    }

    fn lookup_unique(
        &self,
        key: PropertyKey,
        value: &str,
    ) -> Result<Option<ElementId>, OntographError> {
        Ok(self.unique.get(&(key, value.to_string())).copied())
    }

    fn vertices_with_label(&self, label: &str) -> Result<Vec<ElementId>, OntographError> {
        Ok(self
            .vertices
            .values()
            .filter(|v| v.label == label)
            .map(|v| v.id)
            .collect())
    }

    fn vertex_count(&self) -> Result<usize, OntographError> {
        Ok(self.vertices.len())
    }

    fn edge_count(&self) -> Result<usize, OntographError> {
        Ok(self.edges.len())
    }

    fn begin(&mut self) -> Result<(), OntographError> {
        if self.journal.is_none() {
            self.journal = Some(Journal {
                next_id: self.next_id,
                entries: Vec::new(),
            });
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), OntographError> {
        self.journal = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), OntographError> {
        let Some(journal) = self.journal.take() else {
            return Ok(());
        };
        tracing::debug!(writes = journal.entries.len(), "rolling back graph transaction");
        for undo in journal.entries.into_iter().rev() {
            self.revert(undo);
        }
        self.next_id = journal.next_id;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertices(graph: &mut Graph) -> (ElementId, ElementId) {
        let a = graph.add_vertex("ENTITY").expect("add a");
        let b = graph.add_vertex("ENTITY").expect("add b");
        (a, b)
    }

    #[test]
    fn test_ids_are_shared_between_vertices_and_edges() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        let e = graph.add_edge(a, b, "ISA").expect("edge");
        assert_ne!(e, a);
        assert_ne!(e, b);
        assert_eq!(graph.vertex_count().expect("count"), 2);
        assert_eq!(graph.edge_count().expect("count"), 1);
    }

    #[test]
    fn test_edges_respect_direction_and_label() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        graph.add_edge(a, b, "ISA").expect("edge");
        graph.add_edge(b, a, "SUB").expect("edge");

        assert_eq!(graph.edges(a, Direction::Out, None).expect("out").len(), 1);
        assert_eq!(graph.edges(a, Direction::Both, None).expect("both").len(), 2);
        assert_eq!(graph.edges(a, Direction::In, Some("ISA")).expect("in").len(), 0);
        assert_eq!(graph.edges(b, Direction::In, Some("ISA")).expect("in").len(), 1);
    }

    #[test]
    fn test_edge_index_tracks_property_updates() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        let e = graph.add_edge(a, b, "ROLE_PLAYER").expect("edge");
        graph
            .set_property(ElementRef::Edge(e), PropertyKey::RoleLabelId, Value::Long(4))
            .expect("set");

        let hits = graph
            .edges_by_property(a, Direction::Out, "ROLE_PLAYER", PropertyKey::RoleLabelId, 4)
            .expect("lookup");
        assert_eq!(hits.len(), 1);

        graph
            .set_property(ElementRef::Edge(e), PropertyKey::RoleLabelId, Value::Long(5))
            .expect("set");
        assert!(
            graph
                .edges_by_property(a, Direction::Out, "ROLE_PLAYER", PropertyKey::RoleLabelId, 4)
                .expect("lookup")
                .is_empty()
        );
    }

    #[test]
    fn test_claim_unique_reports_holder() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        assert_eq!(
            graph.claim_unique(a, PropertyKey::Index, "age_1").expect("claim"),
            Claim::Claimed
        );
        assert_eq!(
            graph.claim_unique(b, PropertyKey::Index, "age_1").expect("claim"),
            Claim::Taken(a)
        );
        assert_eq!(
            graph.lookup_unique(PropertyKey::Index, "age_1").expect("lookup"),
            Some(a)
        );
    }

    #[test]
    fn test_delete_vertex_cascades() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        graph.add_edge(a, b, "ISA").expect("edge");
        graph.claim_unique(a, PropertyKey::Index, "x").expect("claim");

        graph.delete_vertex(a).expect("delete");
        assert_eq!(graph.edge_count().expect("count"), 0);
        assert_eq!(graph.lookup_unique(PropertyKey::Index, "x").expect("lookup"), None);
        assert!(graph.edges(b, Direction::Both, None).expect("edges").is_empty());
    }

    #[test]
    fn test_rollback_replays_the_undo_log() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        let kept = graph.add_edge(a, b, "ROLE_PLAYER").expect("edge");
        graph
            .set_property(ElementRef::Edge(kept), PropertyKey::RoleLabelId, Value::Long(4))
            .expect("set");
        graph.claim_unique(a, PropertyKey::SchemaLabel, "person").expect("claim");
        let before_vertices: Vec<VertexRecord> = graph.vertex_records().cloned().collect();
        let before_edges: Vec<EdgeRecord> = graph.edge_records().cloned().collect();
        let before_next = graph.next_id();

        graph.begin().expect("begin");
        assert_eq!(graph.pending_writes(), 0);
        let c = graph.add_vertex("ENTITY").expect("add");
        graph.add_edge(c, b, "ISA").expect("edge");
        graph
            .set_property(ElementRef::Edge(kept), PropertyKey::RoleLabelId, Value::Long(5))
            .expect("set");
        graph.remove_property(ElementRef::Vertex(a), PropertyKey::SchemaLabel).expect("remove");
        graph.claim_unique(c, PropertyKey::SchemaLabel, "person").expect("claim");
        graph.delete_vertex(b).expect("delete");
        assert!(graph.pending_writes() > 0);
        graph.rollback().expect("rollback");

        assert!(!graph.in_transaction());
        assert_eq!(graph.vertex_records().cloned().collect::<Vec<_>>(), before_vertices);
        assert_eq!(graph.edge_records().cloned().collect::<Vec<_>>(), before_edges);
        assert_eq!(graph.next_id(), before_next);
        assert_eq!(
            graph.lookup_unique(PropertyKey::SchemaLabel, "person").expect("lookup"),
            Some(a)
        );
        let hits = graph
            .edges_by_property(b, Direction::In, "ROLE_PLAYER", PropertyKey::RoleLabelId, 4)
            .expect("lookup");
        assert_eq!(hits.len(), 1);
        assert!(
            graph
                .edges_by_property(a, Direction::Out, "ROLE_PLAYER", PropertyKey::RoleLabelId, 5)
                .expect("lookup")
                .is_empty()
        );
        assert_eq!(graph.edges(a, Direction::Out, None).expect("out").len(), 1);
        assert_eq!(graph.edges(b, Direction::In, Some("ISA")).expect("isa").len(), 0);
    }

    #[test]
    fn test_commit_drops_the_undo_log() {
        let mut graph = Graph::new();
        graph.begin().expect("begin");
        graph.add_vertex("ENTITY").expect("add");
        assert_eq!(graph.pending_writes(), 1);
        graph.commit().expect("commit");
        assert_eq!(graph.pending_writes(), 0);
        graph.rollback().expect("no-op");
        assert_eq!(graph.vertex_count().expect("count"), 1);
    }

    #[test]
    fn test_rollback_restores_deleted_vertex() {
        let mut graph = Graph::new();
        let (a, _) = two_vertices(&mut graph);
        graph.begin().expect("begin");
        graph.add_vertex("ENTITY").expect("add");
        graph.delete_vertex(a).expect("delete");
        graph.rollback().expect("rollback");

        assert_eq!(graph.vertex_count().expect("count"), 2);
        assert!(graph.vertex(a).expect("vertex").is_some());
        assert!(!graph.in_transaction());
    }

    #[test]
    fn test_from_records_rebuilds_indexes() {
        let mut graph = Graph::new();
        let (a, b) = two_vertices(&mut graph);
        let e = graph.add_edge(a, b, "ATTRIBUTE").expect("edge");
        graph
            .set_property(ElementRef::Edge(e), PropertyKey::RelationshipTypeLabelId, Value::Long(9))
            .expect("set");

        let rebuilt = Graph::from_records(
            graph.vertex_records().cloned().collect(),
            graph.edge_records().cloned().collect(),
            Vec::new(),
            graph.next_id(),
        )
        .expect("rebuild");

        assert_eq!(
            rebuilt
                .edges_by_property(
                    b,
                    Direction::In,
                    "ATTRIBUTE",
                    PropertyKey::RelationshipTypeLabelId,
                    9
                )
                .expect("lookup")
                .len(),
            1
        );
    }
}
