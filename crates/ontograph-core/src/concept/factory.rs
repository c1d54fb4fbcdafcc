//! Graph element -> concept resolution.
//!
//! The single entry point through which concepts come into existence in a
//! transaction. Every resolution consults the identity cache first, so within
//! one transaction the same id always yields the same concept object.

use super::{
    AnyConcept, AttributeState, AttributeTypeState, Concept, ConceptHandle, ConceptState,
    ConceptStream, EdgeRelationship, ReifiedRelationship, RelatesState, RelationshipStructure,
    RoleState, RuleState, SchemaState, ThingState, TypeState, TypedHandle,
};
use crate::cache::{PermanentCache, SessionCache, TxCache};
use crate::graph::{EdgeRecord, GraphStore, VertexRecord};
use crate::schema::{BaseType, EdgeLabel, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{
    ConceptId, DataType, Direction, ElementRef, Label, LabelId, OntographError, Value,
};

impl<'s, S: GraphStore> Transaction<'s, S> {
    /// Resolve a graph element to its concept object.
    ///
    /// Returns `None` for elements that are not concepts (shards, orphaned
    /// or unrecognized vertices, structural edges).
    pub fn resolve(&mut self, element: ElementRef) -> Result<Option<&Concept>, OntographError> {
        let Some(id) = self.resolve_id(element)? else {
            return Ok(None);
        };
        Ok(self.arena.get(&id).map(|c| c.as_ref()))
    }

    /// Resolve a graph element to a handle of its kind.
    pub(crate) fn resolve_any(
        &mut self,
        element: ElementRef,
    ) -> Result<Option<AnyConcept>, OntographError> {
        let Some(id) = self.resolve_id(element)? else {
            return Ok(None);
        };
        Ok(self
            .arena
            .get(&id)
            .map(|c| AnyConcept::from_kind(c.kind(), id.clone())))
    }

    /// Resolve a graph element to a handle of a statically known kind.
    pub(crate) fn resolve_as<H: TypedHandle>(
        &mut self,
        element: ElementRef,
    ) -> Result<Option<H>, OntographError> {
        Ok(self.resolve_any(element)?.and_then(H::from_any))
    }

    /// Look up a concept by id.
    ///
    /// Ids of relationships promoted from edge form keep resolving after the
    /// promotion, including in later transactions.
    pub fn concept(&mut self, id: &ConceptId) -> Result<Option<AnyConcept>, OntographError> {
        if !self.ensure(id)? {
            return Ok(None);
        }
        Ok(self
            .arena
            .get(id)
            .map(|c| AnyConcept::from_kind(c.kind(), id.clone())))
    }

    /// Look up a concept by id, narrowed to a kind.
    pub fn get<H: TypedHandle>(&mut self, id: &ConceptId) -> Result<Option<H>, OntographError> {
        Ok(self.concept(id)?.and_then(H::from_any))
    }

    /// The element currently backing the concept `id`.
    ///
    /// For a promoted relationship this is its vertex, not the edge its id
    /// was derived from.
    pub fn resolve_element(&mut self, id: &ConceptId) -> Result<ElementRef, OntographError> {
        Ok(self.live(id)?.element())
    }

    /// Concepts adjacent to `concept` over `label` edges, resolved lazily.
    ///
    /// Edge-backed relationships have no adjacency of their own and yield an
    /// empty sequence.
    pub fn neighbours<H: ConceptHandle>(
        &mut self,
        concept: &H,
        direction: Direction,
        label: EdgeLabel,
    ) -> Result<ConceptStream<'_, 's, S, AnyConcept>, OntographError> {
        let elements = match self.live(concept.concept_id())?.element() {
            ElementRef::Vertex(vertex) => self
                .adjacent(vertex, direction, label)?
                .into_iter()
                .map(ElementRef::Vertex)
                .collect(),
            ElementRef::Edge(_) => Vec::new(),
        };
        Ok(self.stream_of::<AnyConcept>(elements))
    }

    /// A lazy sequence over `elements`, narrowed to one kind.
    pub(crate) fn stream_of<H: TypedHandle + 's>(
        &mut self,
        elements: Vec<ElementRef>,
    ) -> ConceptStream<'_, 's, S, H> {
        ConceptStream::new(self, elements, |_, concept| Ok(H::from_any(concept)))
    }

    /// Make sure the concept named by `id` is in the identity cache.
    ///
    /// Returns `false` if no live concept has that id.
    pub(crate) fn ensure(&mut self, id: &ConceptId) -> Result<bool, OntographError> {
        if self.arena.contains_key(id) {
            return Ok(true);
        }
        if self.deleted.contains(id) {
            return Ok(false);
        }
        let element = match id.origin() {
            Some(ElementRef::Vertex(v)) => ElementRef::Vertex(v),
            Some(ElementRef::Edge(e)) => {
                if self.store.edge(e)?.is_some() {
                    ElementRef::Edge(e)
                } else {
                    match self.store.lookup_unique(PropertyKey::Id, id.as_str())? {
                        Some(v) => ElementRef::Vertex(v),
                        None => return Ok(false),
                    }
                }
            }
            None => return Ok(false),
        };
        Ok(self.resolve_id(element)?.as_ref() == Some(id))
    }

    /// Derive the id of `element` and make sure its concept is cached.
    pub(crate) fn resolve_id(
        &mut self,
        element: ElementRef,
    ) -> Result<Option<ConceptId>, OntographError> {
        let id = match element {
            ElementRef::Vertex(_) => match self.store.property(element, PropertyKey::Id)? {
                Some(Value::String(raw)) => ConceptId::new(raw),
                _ => ConceptId::from_element(element),
            },
            ElementRef::Edge(_) => ConceptId::from_element(element),
        };
        if self.arena.contains_key(&id) {
            return Ok(Some(id));
        }
        if self.deleted.contains(&id) {
            return Ok(None);
        }

        let Some(concept) = self.build(element, id.clone())? else {
            return Ok(None);
        };
        tracing::debug!(concept = %id, kind = concept.kind().name(), "built concept");
        self.arena.insert(id.clone(), Box::new(concept));
        Ok(Some(id))
    }

    /// Construct the concept backed by `element`, without caching it.
    fn build(
        &self,
        element: ElementRef,
        id: ConceptId,
    ) -> Result<Option<Concept>, OntographError> {
        let state = match element {
            ElementRef::Vertex(v) => {
                let Some(record) = self.store.vertex(v)? else {
                    return Ok(None);
                };
                let Some(base) = self.base_type(&record)? else {
                    return Ok(None);
                };
                match self.vertex_state(base, &record)? {
                    Some(state) => state,
                    None => return Ok(None),
                }
            }
            ElementRef::Edge(e) => {
                let Some(record) = self.store.edge(e)? else {
                    return Ok(None);
                };
                match EdgeLabel::from_label(&record.label) {
                    Some(EdgeLabel::Attribute) => edge_relationship_state(&record)?,
                    _ => return Ok(None),
                }
            }
        };
        Ok(Some(Concept::new(id, element, state)))
    }

    /// Base type by vertex label, falling back to the label of the type an
    /// outgoing SHARD edge points at.
    fn base_type(&self, record: &VertexRecord) -> Result<Option<BaseType>, OntographError> {
        if let Some(base) = BaseType::from_label(&record.label) {
            return Ok(Some(base));
        }
        for target in self.adjacent(record.id, Direction::Out, EdgeLabel::Shard)? {
            if let Some(owner) = self.store.vertex(target)? {
                let instance = BaseType::from_label(&owner.label).and_then(BaseType::instance_kind);
                if instance.is_some() {
                    return Ok(instance);
                }
            }
        }
        Ok(None)
    }

    fn vertex_state(
        &self,
        base: BaseType,
        record: &VertexRecord,
    ) -> Result<Option<ConceptState>, OntographError> {
        let vertex = record.id;
        Ok(Some(match base {
            BaseType::Shard => return Ok(None),
            BaseType::Type => ConceptState::MetaType(type_state(record)?),
            BaseType::EntityType => ConceptState::EntityType(type_state(record)?),
            BaseType::RelationshipType => {
                ConceptState::RelationshipType(type_state(record)?, RelatesState::default())
            }
            BaseType::AttributeType => {
                let data_type = record
                    .properties
                    .get(&PropertyKey::DataType)
                    .and_then(Value::as_str)
                    .and_then(DataType::from_name);
                let attribute = AttributeTypeState {
                    data_type: data_type.map(PermanentCache::with).unwrap_or_default(),
                    regex: TxCache::new(),
                };
                ConceptState::AttributeType(type_state(record)?, attribute)
            }
            BaseType::Role => ConceptState::Role(schema_state(record)?, RoleState::default()),
            BaseType::RuleType => ConceptState::Rule(schema_state(record)?, RuleState::default()),
            BaseType::Entity => ConceptState::Entity(thing_state(record)),
            BaseType::Relationship => ConceptState::Relationship(
                thing_state(record),
                RelationshipStructure::Reified(ReifiedRelationship { vertex }),
            ),
            BaseType::Attribute => {
                ConceptState::Attribute(thing_state(record), AttributeState::default())
            }
        }))
    }
}

fn schema_state(record: &VertexRecord) -> Result<SchemaState, OntographError> {
    let label = record
        .properties
        .get(&PropertyKey::SchemaLabel)
        .and_then(Value::as_str)
        .ok_or(OntographError::CorruptedElement {
            element: ElementRef::Vertex(record.id),
            property: PropertyKey::SchemaLabel.as_str(),
        })?;
    let is_implicit = record
        .properties
        .get(&PropertyKey::IsImplicit)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(SchemaState {
        label: Label::new(label),
        label_id: LabelId(record.id.0),
        is_implicit,
        sup: TxCache::new(),
    })
}

fn type_state(record: &VertexRecord) -> Result<TypeState, OntographError> {
    let mut is_abstract = TxCache::new();
    is_abstract.set(
        record
            .properties
            .get(&PropertyKey::IsAbstract)
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );
    Ok(TypeState {
        schema: schema_state(record)?,
        is_abstract,
        plays: SessionCache::new(),
    })
}

fn thing_state(record: &VertexRecord) -> ThingState {
    ThingState {
        type_id: TxCache::new(),
        is_inferred: record
            .properties
            .get(&PropertyKey::IsInferred)
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn edge_relationship_state(record: &EdgeRecord) -> Result<ConceptState, OntographError> {
    let label_id = |key: PropertyKey| {
        record
            .long(key)
            .filter(|n| *n >= 0)
            .map(|n| LabelId(n as u64))
            .ok_or(OntographError::CorruptedElement {
                element: ElementRef::Edge(record.id),
                property: key.as_str(),
            })
    };
    let relationship_type = label_id(PropertyKey::RelationshipTypeLabelId)?;
    let structure = EdgeRelationship {
        edge: record.id,
        relationship_type,
        owner_role: label_id(PropertyKey::RelationshipRoleOwnerLabelId)?,
        owner: record.from,
        value_role: label_id(PropertyKey::RelationshipRoleValueLabelId)?,
        value: record.to,
    };
    let mut type_id = TxCache::new();
    type_id.set(ConceptId::from_element(ElementRef::Vertex(
        relationship_type.vertex(),
    )));
    let thing = ThingState {
        type_id,
        is_inferred: record
            .properties
            .get(&PropertyKey::IsInferred)
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };
    Ok(ConceptState::Relationship(
        thing,
        RelationshipStructure::Edge(structure),
    ))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::concept::{AnyConcept, ConceptKind, EntityType};
    use crate::graph::GraphStore;
    use crate::schema::EdgeLabel;
    use crate::session::Session;
    use crate::types::{ConceptId, Direction, ElementRef};

    #[test]
    fn same_element_resolves_to_same_object() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("type");
        let alice = tx.add_entity(&person).expect("entity");
        let element = tx.resolve_element(alice.id()).expect("element");

        let first: *const _ = tx.resolve(element).expect("resolve").expect("concept");
        let second: *const _ = tx.resolve(element).expect("resolve").expect("concept");
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn shard_vertices_are_not_concepts() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("type");
        let shard = tx.current_shard(&person).expect("shard");
        assert!(tx.resolve(ElementRef::Vertex(shard)).expect("resolve").is_none());
    }

    #[test]
    fn unknown_label_falls_back_to_shard_edge() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person: EntityType = tx.put_entity_type("person").expect("type");
        let type_vertex = tx.resolve_element(person.id()).expect("element").id();

        let odd = tx.store.add_vertex("person").expect("vertex");
        tx.store
            .add_edge(odd, type_vertex, EdgeLabel::Shard.as_str())
            .expect("edge");

        let concept = tx
            .resolve(ElementRef::Vertex(odd))
            .expect("resolve")
            .expect("concept");
        assert_eq!(concept.kind(), ConceptKind::Entity);
    }

    #[test]
    fn unrecognized_vertex_is_not_a_concept() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let odd = tx.store.add_vertex("MYSTERY").expect("vertex");
        assert!(tx.resolve(ElementRef::Vertex(odd)).expect("resolve").is_none());
        assert!(
            tx.concept(&ConceptId::from_element(ElementRef::Vertex(odd)))
                .expect("lookup")
                .is_none()
        );
    }

    #[test]
    fn neighbours_skip_elements_that_are_not_concepts() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("type");

        // SUB leads to the meta root; SHARD edges come from shard vertices.
        let sups: Vec<_> = tx
            .neighbours(&person, Direction::Out, EdgeLabel::Sub)
            .expect("neighbours")
            .collect::<Result<_, _>>()
            .expect("resolve");
        let entity = tx
            .get_entity_type("entity")
            .expect("get")
            .expect("meta entity");
        assert_eq!(sups, vec![AnyConcept::EntityType(entity)]);

        let shards = tx
            .neighbours(&person, Direction::In, EdgeLabel::Shard)
            .expect("neighbours");
        assert_eq!(shards.count(), 0);
    }
}
