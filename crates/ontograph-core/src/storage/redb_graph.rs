//! # redb-backed Graph Storage
//!
//! A disk-backed graph store using the redb embedded database.
//!
//! `RedbGraph` keeps a full in-memory mirror (a [`Graph`]) for traversal and
//! records which elements and claims each store transaction touched. `commit`
//! writes exactly those records in one redb write transaction, so a store
//! transaction is durable atomically or not at all. `rollback` discards the
//! mirror's changes and the dirty sets together.
//!
//! Opening an existing database rebuilds the mirror, including adjacency and
//! the edge property index.

use crate::formats::{decode_record, encode_record};
use crate::graph::{Claim, EdgeRecord, Graph, GraphStore, VertexRecord};
use crate::schema::PropertyKey;
use crate::types::{Direction, ElementId, ElementRef, OntographError, Value};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for vertices: ElementId(u64) -> encoded VertexRecord
const VERTICES: TableDefinition<u64, &[u8]> = TableDefinition::new("vertices");

/// Table for edges: ElementId(u64) -> encoded EdgeRecord
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");

/// Table for unique claims: (property name, value) -> holder ElementId
const CLAIMS: TableDefinition<(&str, &str), u64> = TableDefinition::new("claims");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_ID: &str = "next_id";

fn io(e: impl std::fmt::Display) -> OntographError {
    OntographError::Storage(e.to_string())
}

/// A disk-backed graph store using redb.
pub struct RedbGraph {
    /// The redb database handle.
    db: Database,
    /// In-memory mirror of the committed state plus the open transaction.
    mirror: Graph,
    /// Vertices written or deleted since the last commit.
    dirty_vertices: BTreeSet<ElementId>,
    /// Edges written or deleted since the last commit.
    dirty_edges: BTreeSet<ElementId>,
    /// Claims written or released since the last commit.
    dirty_claims: BTreeSet<(PropertyKey, String)>,
}

impl std::fmt::Debug for RedbGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbGraph")
            .field("next_id", &self.mirror.next_id())
            .field("dirty_vertices", &self.dirty_vertices.len())
            .field("dirty_edges", &self.dirty_edges.len())
            .finish_non_exhaustive()
    }
}

impl RedbGraph {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OntographError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(VERTICES).map_err(io)?;
            let _ = write_txn.open_table(EDGES).map_err(io)?;
            let _ = write_txn.open_table(CLAIMS).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        let mirror = Self::load(&db)?;
        tracing::debug!(
            vertices = mirror.vertex_count()?,
            edges = mirror.edge_count()?,
            "opened graph database"
        );

        Ok(Self {
            db,
            mirror,
            dirty_vertices: BTreeSet::new(),
            dirty_edges: BTreeSet::new(),
            dirty_claims: BTreeSet::new(),
        })
    }

    fn load(db: &Database) -> Result<Graph, OntographError> {
        let read_txn = db.begin_read().map_err(io)?;

        let next_id = {
            let table = read_txn.open_table(METADATA).map_err(io)?;
            table
                .get(NEXT_ID)
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        let vertices = {
            let table = read_txn.open_table(VERTICES).map_err(io)?;
            let mut records = Vec::with_capacity(table.len().map_err(io)? as usize);
            for entry in table.iter().map_err(io)? {
                let (_, bytes) = entry.map_err(io)?;
                records.push(decode_record::<VertexRecord>(bytes.value())?);
            }
            records
        };

        let edges = {
            let table = read_txn.open_table(EDGES).map_err(io)?;
            let mut records = Vec::with_capacity(table.len().map_err(io)? as usize);
            for entry in table.iter().map_err(io)? {
                let (_, bytes) = entry.map_err(io)?;
                records.push(decode_record::<EdgeRecord>(bytes.value())?);
            }
            records
        };

        let claims = {
            let table = read_txn.open_table(CLAIMS).map_err(io)?;
            let mut claims = Vec::new();
            for entry in table.iter().map_err(io)? {
                let (key, holder) = entry.map_err(io)?;
                let (name, value) = key.value();
                let key = PropertyKey::from_name(name).ok_or_else(|| {
                    OntographError::Deserialization(format!("Unknown property [{}]", name))
                })?;
                claims.push((key, value.to_string(), ElementId(holder.value())));
            }
            claims
        };

        Graph::from_records(vertices, edges, claims, next_id)
    }

    /// Compact the database.
    pub fn compact(&mut self) -> Result<(), OntographError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }

    /// Number of vertices currently persisted on disk.
    pub fn persisted_vertex_count(&self) -> Result<u64, OntographError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(VERTICES).map_err(io)?;
        table.len().map_err(io)
    }

    fn touch_claim(&mut self, key: PropertyKey, value: &Value) {
        if let Value::String(s) = value {
            self.dirty_claims.insert((key, s.clone()));
        }
    }

    fn touch_element(&mut self, element: ElementRef) {
        match element {
            ElementRef::Vertex(id) => self.dirty_vertices.insert(id),
            ElementRef::Edge(id) => self.dirty_edges.insert(id),
        };
    }

    fn clear_dirty(&mut self) {
        self.dirty_vertices.clear();
        self.dirty_edges.clear();
        self.dirty_claims.clear();
    }

    /// Write every dirty record in one redb transaction.
    fn flush(&mut self) -> Result<(), OntographError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut vertices = write_txn.open_table(VERTICES).map_err(io)?;
            for id in &self.dirty_vertices {
                match self.mirror.vertex(*id)? {
                    Some(record) => {
                        let bytes = encode_record(&record)?;
                        vertices.insert(id.0, bytes.as_slice()).map_err(io)?;
                    }
                    None => {
                        vertices.remove(id.0).map_err(io)?;
                    }
                }
            }

            let mut edges = write_txn.open_table(EDGES).map_err(io)?;
            for id in &self.dirty_edges {
                match self.mirror.edge(*id)? {
                    Some(record) => {
                        let bytes = encode_record(&record)?;
                        edges.insert(id.0, bytes.as_slice()).map_err(io)?;
                    }
                    None => {
                        edges.remove(id.0).map_err(io)?;
                    }
                }
            }

            let mut claims = write_txn.open_table(CLAIMS).map_err(io)?;
            for (key, value) in &self.dirty_claims {
                match self.mirror.lookup_unique(*key, value)? {
                    Some(holder) => {
                        claims
                            .insert((key.as_str(), value.as_str()), holder.0)
                            .map_err(io)?;
                    }
                    None => {
                        claims.remove((key.as_str(), value.as_str())).map_err(io)?;
                    }
                }
            }

            let mut meta = write_txn.open_table(METADATA).map_err(io)?;
            meta.insert(NEXT_ID, self.mirror.next_id()).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }
}

impl GraphStore for RedbGraph {
    fn add_vertex(&mut self, label: &str) -> Result<ElementId, OntographError> {
        let id = self.mirror.add_vertex(label)?;
        self.dirty_vertices.insert(id);
        Ok(id)
    }

    fn add_edge(
        &mut self,
        from: ElementId,
        to: ElementId,
        label: &str,
    ) -> Result<ElementId, OntographError> {
        let id = self.mirror.add_edge(from, to, label)?;
        self.dirty_edges.insert(id);
        Ok(id)
    }

    fn vertex(&self, id: ElementId) -> Result<Option<VertexRecord>, OntographError> {
        self.mirror.vertex(id)
    }

    fn edge(&self, id: ElementId) -> Result<Option<EdgeRecord>, OntographError> {
        self.mirror.edge(id)
    }

    fn property(
        &self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError> {
        self.mirror.property(element, key)
    }

    fn set_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
        value: Value,
    ) -> Result<(), OntographError> {
        self.mirror.set_property(element, key, value)?;
        self.touch_element(element);
        Ok(())
    }

    fn remove_property(
        &mut self,
        element: ElementRef,
        key: PropertyKey,
    ) -> Result<Option<Value>, OntographError> {
        let previous = self.mirror.remove_property(element, key)?;
        self.touch_element(element);
        if let Some(value) = &previous {
            self.touch_claim(key, value);
        }
        Ok(previous)
    }

    fn edges(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: Option<&str>,
    ) -> Result<Vec<EdgeRecord>, OntographError> {
        self.mirror.edges(vertex, direction, label)
    }

    fn edges_by_property(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: &str,
        key: PropertyKey,
        value: i64,
    ) -> Result<Vec<EdgeRecord>, OntographError> {
        self.mirror
            .edges_by_property(vertex, direction, label, key, value)
    }

    fn delete_vertex(&mut self, id: ElementId) -> Result<(), OntographError> {
        for edge in self.mirror.edges(id, Direction::Both, None)? {
            self.dirty_edges.insert(edge.id);
        }
        if let Some(record) = self.mirror.vertex(id)? {
            for (key, value) in &record.properties {
                self.touch_claim(*key, value);
            }
        }
        self.mirror.delete_vertex(id)?;
        self.dirty_vertices.insert(id);
        Ok(())
    }

    fn delete_edge(&mut self, id: ElementId) -> Result<(), OntographError> {
        self.mirror.delete_edge(id)?;
        self.dirty_edges.insert(id);
        Ok(())
    }

    fn claim_unique(
        &mut self,
        vertex: ElementId,
        key: PropertyKey,
        value: &str,
    ) -> Result<Claim, OntographError> {
        let claim = self.mirror.claim_unique(vertex, key, value)?;
        if claim == Claim::Claimed {
            self.dirty_vertices.insert(vertex);
            self.dirty_claims.insert((key, value.to_string()));
        }
        Ok(claim)
    }

    fn lookup_unique(
        &self,
        key: PropertyKey,
        value: &str,
    ) -> Result<Option<ElementId>, OntographError> {
        self.mirror.lookup_unique(key, value)
    }

    fn vertices_with_label(&self, label: &str) -> Result<Vec<ElementId>, OntographError> {
        self.mirror.vertices_with_label(label)
    }

    fn vertex_count(&self) -> Result<usize, OntographError> {
        self.mirror.vertex_count()
    }

    fn edge_count(&self) -> Result<usize, OntographError> {
        self.mirror.edge_count()
    }

    fn begin(&mut self) -> Result<(), OntographError> {
        self.mirror.begin()
    }

    fn commit(&mut self) -> Result<(), OntographError> {
        self.flush()?;
        self.mirror.commit()?;
        tracing::debug!(
            vertices = self.dirty_vertices.len(),
            edges = self.dirty_edges.len(),
            claims = self.dirty_claims.len(),
            "committed graph transaction"
        );
        self.clear_dirty();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), OntographError> {
        self.mirror.rollback()?;
        self.clear_dirty();
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn committed_writes_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let a;
        let e;
        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            graph.begin().expect("begin");
            a = graph.add_vertex("ENTITY_TYPE").expect("vertex");
            let b = graph.add_vertex("SHARD").expect("vertex");
            e = graph.add_edge(b, a, "SHARD").expect("edge");
            graph
                .set_property(ElementRef::Edge(e), PropertyKey::RoleLabelId, Value::Long(3))
                .expect("set");
            graph
                .claim_unique(a, PropertyKey::SchemaLabel, "person")
                .expect("claim");
            graph.commit().expect("commit");
        }

        let graph = RedbGraph::open(&db_path).expect("reopen db");
        assert_eq!(graph.vertex_count().expect("count"), 2);
        assert_eq!(graph.edge_count().expect("count"), 1);
        assert_eq!(
            graph
                .lookup_unique(PropertyKey::SchemaLabel, "person")
                .expect("lookup"),
            Some(a)
        );
        let hits = graph
            .edges_by_property(a, Direction::In, "SHARD", PropertyKey::RoleLabelId, 3)
            .expect("index");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, e);
    }

    #[test]
    fn uncommitted_writes_are_lost() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            graph.begin().expect("begin");
            graph.add_vertex("ENTITY").expect("vertex");
        }

        let graph = RedbGraph::open(&db_path).expect("reopen db");
        assert_eq!(graph.vertex_count().expect("count"), 0);
        assert_eq!(graph.persisted_vertex_count().expect("count"), 0);
    }

    #[test]
    fn rollback_discards_mirror_and_dirty_state() {
        let temp = tempdir().expect("temp dir");
        let mut graph = RedbGraph::open(temp.path().join("test.redb")).expect("open db");

        graph.begin().expect("begin");
        let kept = graph.add_vertex("ENTITY").expect("vertex");
        graph.commit().expect("commit");

        graph.begin().expect("begin");
        graph.add_vertex("ENTITY").expect("vertex");
        graph.delete_vertex(kept).expect("delete");
        graph.rollback().expect("rollback");

        assert_eq!(graph.vertex_count().expect("count"), 1);
        assert_eq!(graph.persisted_vertex_count().expect("count"), 1);
    }

    #[test]
    fn deletes_are_persisted() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            graph.begin().expect("begin");
            let a = graph.add_vertex("ATTRIBUTE").expect("vertex");
            graph.claim_unique(a, PropertyKey::Index, "age_3").expect("claim");
            graph.commit().expect("commit");

            graph.begin().expect("begin");
            graph.delete_vertex(a).expect("delete");
            graph.commit().expect("commit");
        }

        let graph = RedbGraph::open(&db_path).expect("reopen db");
        assert_eq!(graph.vertex_count().expect("count"), 0);
        assert_eq!(
            graph.lookup_unique(PropertyKey::Index, "age_3").expect("lookup"),
            None
        );
    }

    #[test]
    fn next_id_preserved_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let first;
        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            graph.begin().expect("begin");
            first = graph.add_vertex("ENTITY").expect("vertex");
            graph.commit().expect("commit");
        }

        let mut graph = RedbGraph::open(&db_path).expect("reopen db");
        graph.begin().expect("begin");
        let second = graph.add_vertex("ENTITY").expect("vertex");
        assert!(second > first);
    }

    #[test]
    fn compact_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        {
            let mut graph = RedbGraph::open(&db_path).expect("open db");
            graph.begin().expect("begin");
            for _ in 0..10 {
                graph.add_vertex("ENTITY").expect("vertex");
            }
            graph.commit().expect("commit");
            graph.compact().expect("compact");
        }
        let graph = RedbGraph::open(&db_path).expect("reopen db");
        assert_eq!(graph.vertex_count().expect("count"), 10);
    }
}
