//! # Transaction
//!
//! The context object every concept operation runs in.
//!
//! A transaction exclusively owns:
//! - the identity cache (the concept arena, keyed by `ConceptId`)
//! - the validation tracking set
//! - every transaction-tier cache (inside the arena's concepts)
//!
//! It borrows the session's store, session cache tier and configuration for
//! its whole lifetime. Dropping a transaction without committing rolls the
//! store back and discards every session-cache delta.

use crate::cache::SessionTier;
use crate::concept::Concept;
use crate::config::EngineConfig;
use crate::graph::{EdgeRecord, GraphStore};
use crate::schema::{EdgeLabel, PropertyKey};
use crate::types::{ConceptId, Direction, ElementId, ElementRef, Label, OntographError, Value};
use crate::validation::{ValidationTracking, Validator};
use std::collections::{BTreeMap, BTreeSet};

/// One unit of work over a session's graph.
pub struct Transaction<'s, S: GraphStore> {
    pub(crate) store: &'s mut S,
    pub(crate) tier: &'s mut SessionTier,
    pub(crate) config: &'s EngineConfig,
    pub(crate) validator: &'s dyn Validator<S>,
    /// Identity cache: exactly one concept object per id.
    pub(crate) arena: BTreeMap<ConceptId, Box<Concept>>,
    pub(crate) tracking: ValidationTracking,
    /// Concepts deleted in this transaction. Never re-resolved.
    pub(crate) deleted: BTreeSet<ConceptId>,
    /// Schema label lookups made in this transaction.
    pub(crate) labels: BTreeMap<Label, ConceptId>,
    committed: bool,
}

impl<S: GraphStore> std::fmt::Debug for Transaction<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("cached_concepts", &self.arena.len())
            .field("deleted", &self.deleted.len())
            .field("tracking", &self.tracking)
            .finish_non_exhaustive()
    }
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    pub(crate) fn open(
        store: &'s mut S,
        tier: &'s mut SessionTier,
        config: &'s EngineConfig,
        validator: &'s dyn Validator<S>,
    ) -> Result<Self, OntographError> {
        store.begin()?;
        Ok(Self {
            store,
            tier,
            config,
            validator,
            arena: BTreeMap::new(),
            tracking: ValidationTracking::default(),
            deleted: BTreeSet::new(),
            labels: BTreeMap::new(),
            committed: false,
        })
    }

    /// Engine configuration in effect.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Concepts registered for commit-time validation so far.
    #[must_use]
    pub fn tracking(&self) -> &ValidationTracking {
        &self.tracking
    }

    /// Number of concepts in the identity cache.
    #[must_use]
    pub fn cached_concepts(&self) -> usize {
        self.arena.len()
    }

    /// Read-only access to the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        self.store
    }

    /// Validate, persist and publish this transaction.
    ///
    /// Relationships emptied by role-player removal are deleted first. Then
    /// the validator runs over the tracked concepts; any violation aborts the
    /// commit and names every violating concept. On success the store commits
    /// and session-cache deltas are folded into the session tier.
    pub fn commit(mut self) -> Result<(), OntographError> {
        self.clean_up_relationships()?;

        if self.config.validate_on_commit {
            let validator = self.validator;
            let tracking = std::mem::take(&mut self.tracking);
            let errors = validator.validate(&mut self, &tracking)?;
            if !errors.is_empty() {
                tracing::debug!(violations = errors.len(), "commit rejected by validation");
                return Err(OntographError::Validation(errors));
            }
        }

        self.store.commit()?;
        self.committed = true;
        self.publish_session_state();
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Discard every write and every session-cache delta.
    pub fn rollback(mut self) -> Result<(), OntographError> {
        self.committed = true;
        self.store.rollback()
    }

    fn publish_session_state(&mut self) {
        let arena = std::mem::take(&mut self.arena);
        for (id, concept) in arena {
            (*concept).fold_into(self.tier.entry_mut(&id));
        }
        for id in &self.deleted {
            self.tier.evict(id);
        }
    }

    // =========================================================================
    // IDENTITY CACHE ACCESS
    // =========================================================================

    /// The live concept for `id`, loading it into the arena if needed.
    pub(crate) fn live(&mut self, id: &ConceptId) -> Result<&mut Concept, OntographError> {
        if !self.ensure(id)? {
            return Err(OntographError::ConceptNotFound(id.clone()));
        }
        self.arena
            .get_mut(id)
            .map(|c| c.as_mut())
            .ok_or_else(|| OntographError::ConceptNotFound(id.clone()))
    }

    /// Whether `id` names a live concept.
    pub fn contains(&mut self, id: &ConceptId) -> Result<bool, OntographError> {
        self.ensure(id)
    }

    /// Evict a concept from the identity cache, then remove its element.
    ///
    /// Eviction comes first so that nothing in this transaction re-caches a
    /// half-deleted element.
    pub(crate) fn delete_concept_element(&mut self, id: &ConceptId) -> Result<(), OntographError> {
        let element = self.live(id)?.element();
        self.arena.remove(id);
        self.deleted.insert(id.clone());
        self.tracking.forget(id);
        match element {
            ElementRef::Vertex(v) => self.store.delete_vertex(v),
            ElementRef::Edge(e) => self.store.delete_edge(e),
        }
    }

    /// Evict a concept whose element is about to disappear with another one.
    pub(crate) fn evict(&mut self, id: &ConceptId) {
        self.arena.remove(id);
        self.deleted.insert(id.clone());
        self.tracking.forget(id);
    }

    // =========================================================================
    // EDGE HELPERS
    // =========================================================================

    /// Create an edge unless one with the same label and endpoints exists.
    pub(crate) fn put_edge(
        &mut self,
        from: ElementId,
        to: ElementId,
        label: EdgeLabel,
    ) -> Result<ElementId, OntographError> {
        let existing = self
            .store
            .edges(from, Direction::Out, Some(label.as_str()))?
            .into_iter()
            .find(|e| e.to == to);
        match existing {
            Some(edge) => Ok(edge.id),
            None => self.store.add_edge(from, to, label.as_str()),
        }
    }

    /// Always create an edge, setting the given long properties on it.
    pub(crate) fn add_edge_with(
        &mut self,
        from: ElementId,
        to: ElementId,
        label: EdgeLabel,
        properties: &[(PropertyKey, Value)],
    ) -> Result<ElementId, OntographError> {
        let edge = self.store.add_edge(from, to, label.as_str())?;
        for (key, value) in properties {
            self.store
                .set_property(ElementRef::Edge(edge), *key, value.clone())?;
        }
        Ok(edge)
    }

    /// Delete `label` edges leaving `from`, all of them or only those to `to`.
    pub(crate) fn delete_edges(
        &mut self,
        from: ElementId,
        label: EdgeLabel,
        to: Option<ElementId>,
    ) -> Result<usize, OntographError> {
        let doomed: Vec<EdgeRecord> = self
            .store
            .edges(from, Direction::Out, Some(label.as_str()))?
            .into_iter()
            .filter(|e| to.is_none_or(|t| e.to == t))
            .collect();
        for edge in &doomed {
            self.store.delete_edge(edge.id)?;
        }
        Ok(doomed.len())
    }

    /// Vertices at the far end of `label` edges.
    pub(crate) fn adjacent(
        &self,
        vertex: ElementId,
        direction: Direction,
        label: EdgeLabel,
    ) -> Result<Vec<ElementId>, OntographError> {
        Ok(self
            .store
            .edges(vertex, direction, Some(label.as_str()))?
            .into_iter()
            .map(|e| e.other(vertex))
            .collect())
    }
}

impl<S: GraphStore> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.store.rollback() {
                tracing::warn!(error = %e, "rollback on drop failed");
            }
        }
    }
}
