//! Per-type instance sharding.
//!
//! Instances never link their ISA edge to the type vertex. They link to the
//! type's current shard, a vertex of its own that points at the type through
//! a SHARD edge. Rotating to a fresh shard is decided by the caller; the core
//! only reports when the configured threshold is reached.

use super::TypeHandle;
use crate::cache::{Counter, CounterDelta};
use crate::graph::GraphStore;
use crate::schema::{BaseType, EdgeLabel, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{ConceptId, Direction, ElementId, ElementRef, OntographError, Value};

/// Add a shard vertex for `type_vertex` and make it the stored current shard.
pub(crate) fn create_shard_vertex<S: GraphStore>(
    store: &mut S,
    type_vertex: ElementId,
) -> Result<ElementId, OntographError> {
    let shard = store.add_vertex(BaseType::Shard.as_str())?;
    store.add_edge(shard, type_vertex, EdgeLabel::Shard.as_str())?;
    store.set_property(
        ElementRef::Vertex(type_vertex),
        PropertyKey::CurrentShard,
        Value::Long(shard.0 as i64),
    )?;
    Ok(shard)
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    /// Allocate a new shard and make it the type's current shard.
    pub fn create_shard<T: TypeHandle>(&mut self, ty: &T) -> Result<ElementId, OntographError> {
        self.create_shard_for(ty.concept_id())
    }

    pub(crate) fn create_shard_for(&mut self, id: &ConceptId) -> Result<ElementId, OntographError> {
        let type_vertex = self.live(id)?.element().id();
        let shard = create_shard_vertex(&mut *self.store, type_vertex)?;
        let concept = self.live(id)?;
        concept.current_shard.set(shard);
        concept.shard_count.apply(CounterDelta::Increment);
        tracing::debug!(concept = %id, %shard, "created shard");
        Ok(shard)
    }

    /// Every shard of a type.
    pub fn shards<T: TypeHandle>(&mut self, ty: &T) -> Result<Vec<ElementId>, OntographError> {
        self.shard_vertices(ty.concept_id())
    }

    pub(crate) fn shard_vertices(&mut self, id: &ConceptId) -> Result<Vec<ElementId>, OntographError> {
        let vertex = self.live(id)?.element().id();
        self.adjacent(vertex, Direction::In, EdgeLabel::Shard)
    }

    /// Number of shards of a type, shared across the session.
    pub fn shard_count<T: TypeHandle>(&mut self, ty: &T) -> Result<u64, OntographError> {
        let id = ty.concept_id();
        let vertex = self.live(id)?.element().id();
        let tier = self.tier.entry(id).and_then(|e| e.shard_count);
        let store = &*self.store;
        let concept = self
            .arena
            .get_mut(id)
            .ok_or_else(|| OntographError::ConceptNotFound(id.clone()))?;
        if !concept.shard_count.load_snapshot(tier.as_ref()) {
            let stored = store.edges(vertex, Direction::In, Some(EdgeLabel::Shard.as_str()))?;
            concept.shard_count.load_fresh(Counter(stored.len() as u64));
        }
        Ok(concept.shard_count.get().map_or(0, |c| c.0))
    }

    /// The shard new instances of a type link to.
    ///
    /// A type without a shard is a corrupted graph.
    pub fn current_shard<T: TypeHandle>(&mut self, ty: &T) -> Result<ElementId, OntographError> {
        self.current_shard_of(ty.concept_id())
    }

    pub(crate) fn current_shard_of(&mut self, id: &ConceptId) -> Result<ElementId, OntographError> {
        let concept = self.live(id)?;
        if let Some(shard) = concept.current_shard.get() {
            return Ok(*shard);
        }
        let element = concept.element();
        let stored = self
            .store
            .property(element, PropertyKey::CurrentShard)?
            .and_then(|v| v.as_long())
            .map(|n| ElementId(n as u64));
        let shard = match stored {
            Some(shard) if self.store.vertex(shard)?.is_some() => shard,
            _ => {
                tracing::error!(concept = %id, "type has no shard");
                return Err(OntographError::MissingShard(id.clone()));
            }
        };
        self.live(id)?.current_shard.set(shard);
        Ok(shard)
    }

    /// Whether the current shard holds at least the configured number of
    /// instances.
    pub fn shard_rotation_due<T: TypeHandle>(&mut self, ty: &T) -> Result<bool, OntographError> {
        let shard = self.current_shard(ty)?;
        let members = self
            .store
            .edges(shard, Direction::In, Some(EdgeLabel::Isa.as_str()))?
            .len() as u64;
        Ok(members >= self.config.sharding_threshold)
    }
}

// =============================================================================
// TESTS
// =============================================================================
