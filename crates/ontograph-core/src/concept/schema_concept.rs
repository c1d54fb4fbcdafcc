//! Schema concepts: labels, the supertype hierarchy, roles and rules.

use super::{
    ConceptKind, EntityType, MetaType, RelationshipType, Role, Rule, SchemaConcept, SchemaHandle,
    SetSlot, Type, TypedHandle,
};
use crate::cache::SetDelta;
use crate::graph::{Claim, GraphStore};
use crate::primitives::MAX_HIERARCHY_DEPTH;
use crate::schema::{BaseType, EdgeLabel, ImplicitType, MetaSchema, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{
    ConceptId, Direction, ElementId, ElementRef, Label, LabelId, OntographError, Value,
};
use std::collections::{BTreeSet, VecDeque};

/// Concept kind of the schema concepts stored under a vertex label.
const fn schema_kind(base: BaseType) -> Option<ConceptKind> {
    match base {
        BaseType::Type => Some(ConceptKind::MetaType),
        BaseType::EntityType => Some(ConceptKind::EntityType),
        BaseType::RelationshipType => Some(ConceptKind::RelationshipType),
        BaseType::AttributeType => Some(ConceptKind::AttributeType),
        BaseType::Role => Some(ConceptKind::Role),
        BaseType::RuleType => Some(ConceptKind::Rule),
        _ => None,
    }
}

/// Meta root a new schema concept of `base` is created under.
const fn meta_parent(base: BaseType) -> Option<MetaSchema> {
    match base {
        BaseType::EntityType => Some(MetaSchema::Entity),
        BaseType::RelationshipType => Some(MetaSchema::Relationship),
        BaseType::AttributeType => Some(MetaSchema::Attribute),
        BaseType::Role => Some(MetaSchema::Role),
        BaseType::RuleType => Some(MetaSchema::Rule),
        _ => None,
    }
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    // =========================================================================
    // LABEL LOOKUP
    // =========================================================================

    /// Id of the schema concept labelled `label`.
    pub(crate) fn schema_id_by_label(
        &mut self,
        label: &Label,
    ) -> Result<Option<ConceptId>, OntographError> {
        if let Some(id) = self.labels.get(label) {
            if !self.deleted.contains(id) {
                return Ok(Some(id.clone()));
            }
        }
        let Some(vertex) = self
            .store
            .lookup_unique(PropertyKey::SchemaLabel, label.as_str())?
        else {
            return Ok(None);
        };
        let Some(id) = self.resolve_id(ElementRef::Vertex(vertex))? else {
            return Ok(None);
        };
        self.labels.insert(label.clone(), id.clone());
        Ok(Some(id))
    }

    pub(crate) fn meta_id(&mut self, meta: MetaSchema) -> Result<ConceptId, OntographError> {
        self.schema_id_by_label(&meta.label())?
            .ok_or_else(|| OntographError::ConceptNotFound(ConceptId::new(meta.label_str())))
    }

    /// Look up a schema concept by label, narrowed to a kind.
    pub fn get_schema<H: SchemaHandle>(&mut self, label: &str) -> Result<Option<H>, OntographError> {
        match self.schema_id_by_label(&Label::new(label))? {
            Some(id) => self.get::<H>(&id),
            None => Ok(None),
        }
    }

    pub fn get_schema_concept(&mut self, label: &str) -> Result<Option<SchemaConcept>, OntographError> {
        self.get_schema(label)
    }

    pub fn get_type(&mut self, label: &str) -> Result<Option<Type>, OntographError> {
        self.get_schema(label)
    }

    pub fn get_entity_type(&mut self, label: &str) -> Result<Option<EntityType>, OntographError> {
        self.get_schema(label)
    }

    pub fn get_relationship_type(
        &mut self,
        label: &str,
    ) -> Result<Option<RelationshipType>, OntographError> {
        self.get_schema(label)
    }

    pub fn get_role(&mut self, label: &str) -> Result<Option<Role>, OntographError> {
        self.get_schema(label)
    }

    pub fn get_rule(&mut self, label: &str) -> Result<Option<Rule>, OntographError> {
        self.get_schema(label)
    }

    /// The root of every type hierarchy.
    pub fn meta_type(&mut self) -> Result<MetaType, OntographError> {
        let id = self.meta_id(MetaSchema::Thing)?;
        Ok(MetaType(id))
    }

    /// The meta concept `meta`.
    pub fn meta_concept(&mut self, meta: MetaSchema) -> Result<SchemaConcept, OntographError> {
        let id = self.meta_id(meta)?;
        self.get::<SchemaConcept>(&id)?
            .ok_or(OntographError::ConceptNotFound(id))
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Return the schema concept labelled `label`, creating it if absent.
    ///
    /// New concepts are placed directly under their meta root. Types get their
    /// first shard straight away.
    pub(crate) fn put_schema_concept(
        &mut self,
        label: &Label,
        base: BaseType,
        implicit: bool,
    ) -> Result<ConceptId, OntographError> {
        let expected = schema_kind(base).ok_or_else(|| {
            OntographError::Storage(format!("{} is not a schema vertex label", base))
        })?;
        if MetaSchema::is_meta_label(label.as_str()) {
            return Err(OntographError::MetaTypeImmutable(label.clone()));
        }
        if let Some(id) = self.schema_id_by_label(label)? {
            let kind = self.live(&id)?.kind();
            if kind != expected {
                return Err(OntographError::LabelTaken {
                    label: label.clone(),
                    existing: kind.name().to_string(),
                });
            }
            return Ok(id);
        }

        let vertex = self.store.add_vertex(base.as_str())?;
        if let Claim::Taken(_) =
            self.store
                .claim_unique(vertex, PropertyKey::SchemaLabel, label.as_str())?
        {
            self.store.delete_vertex(vertex)?;
            return Err(OntographError::LabelTaken {
                label: label.clone(),
                existing: "schema concept".to_string(),
            });
        }
        let element = ElementRef::Vertex(vertex);
        self.store
            .set_property(element, PropertyKey::LabelId, LabelId(vertex.0).to_value())?;
        if implicit {
            self.store
                .set_property(element, PropertyKey::IsImplicit, Value::Boolean(true))?;
        }
        if let Some(meta) = meta_parent(base) {
            let meta_id = self.meta_id(meta)?;
            let meta_vertex = self.live(&meta_id)?.element().id();
            self.store.add_edge(vertex, meta_vertex, EdgeLabel::Sub.as_str())?;
        }

        let id = self
            .resolve_id(element)?
            .ok_or(OntographError::ElementNotFound(element))?;
        self.labels.insert(label.clone(), id.clone());
        if expected.is_type() {
            self.create_shard_for(&id)?;
        }
        match expected {
            ConceptKind::Role => {
                self.tracking.roles.insert(id.clone());
            }
            ConceptKind::RelationshipType => {
                self.tracking.relationship_types.insert(id.clone());
            }
            _ => {}
        }
        tracing::debug!(label = %label, kind = expected.name(), "created schema concept");
        Ok(id)
    }

    pub fn put_entity_type(&mut self, label: &str) -> Result<EntityType, OntographError> {
        let id = self.put_schema_concept(&Label::new(label), BaseType::EntityType, false)?;
        Ok(EntityType(id))
    }

    pub fn put_relationship_type(
        &mut self,
        label: &str,
    ) -> Result<RelationshipType, OntographError> {
        let id = self.put_schema_concept(&Label::new(label), BaseType::RelationshipType, false)?;
        Ok(RelationshipType(id))
    }

    pub fn put_role(&mut self, label: &str) -> Result<Role, OntographError> {
        let id = self.put_schema_concept(&Label::new(label), BaseType::Role, false)?;
        Ok(Role(id))
    }

    /// Create a rule storing its `when` and `then` pattern text.
    ///
    /// An existing rule with the same label is returned unchanged.
    pub fn put_rule(&mut self, label: &str, when: &str, then: &str) -> Result<Rule, OntographError> {
        let label = Label::new(label);
        let existed = self.schema_id_by_label(&label)?.is_some();
        let id = self.put_schema_concept(&label, BaseType::RuleType, false)?;
        if !existed {
            let element = self.live(&id)?.element();
            self.store
                .set_property(element, PropertyKey::RuleWhen, Value::from(when))?;
            self.store
                .set_property(element, PropertyKey::RuleThen, Value::from(then))?;
        }
        Ok(Rule(id))
    }

    // =========================================================================
    // LABELS
    // =========================================================================

    pub(crate) fn schema_label(&mut self, id: &ConceptId) -> Result<Label, OntographError> {
        let concept = self.live(id)?;
        let kind = concept.kind();
        concept
            .label()
            .cloned()
            .ok_or_else(|| OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "schema concept",
                actual: kind.name(),
            })
    }

    pub(crate) fn schema_label_id(&mut self, id: &ConceptId) -> Result<LabelId, OntographError> {
        let concept = self.live(id)?;
        let kind = concept.kind();
        concept
            .schema()
            .map(|s| s.label_id)
            .ok_or_else(|| OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "schema concept",
                actual: kind.name(),
            })
    }

    pub fn label<H: SchemaHandle>(&mut self, concept: &H) -> Result<Label, OntographError> {
        self.schema_label(concept.concept_id())
    }

    /// Rename a schema concept.
    ///
    /// Renaming an attribute type also renames its implicit has/key concepts
    /// and moves the index of each direct instance under the new label.
    /// Implicit concepts cannot be renamed on their own.
    pub fn set_label<H: SchemaHandle>(&mut self, concept: &H, label: &str) -> Result<(), OntographError> {
        let id = concept.concept_id();
        let label = Label::new(label);
        self.reject_meta(id)?;
        if MetaSchema::is_meta_label(label.as_str()) {
            return Err(OntographError::MetaTypeImmutable(label));
        }
        let current = self.schema_label(id)?;
        if current == label {
            return Ok(());
        }
        if self.live(id)?.schema().is_some_and(|s| s.is_implicit) {
            return Err(OntographError::ImplicitLabel(current));
        }

        let is_attribute_type = self.live(id)?.kind() == ConceptKind::AttributeType;
        let mut renames = vec![(id.clone(), label.clone())];
        if is_attribute_type {
            for implicit in ImplicitType::ALL {
                if let Some(existing) = self.schema_id_by_label(&implicit.label(&current))? {
                    renames.push((existing, implicit.label(&label)));
                }
            }
        }
        for (_, target) in &renames {
            if let Some(holder) = self.schema_id_by_label(target)? {
                if renames.iter().any(|(renamed, _)| *renamed == holder) {
                    continue;
                }
                let kind = self.live(&holder)?.kind();
                return Err(OntographError::LabelTaken {
                    label: target.clone(),
                    existing: kind.name().to_string(),
                });
            }
        }

        // Release every old label first: the new set may reuse one of them.
        for (renamed, _) in &renames {
            let element = self.live(renamed)?.element();
            self.store.remove_property(element, PropertyKey::SchemaLabel)?;
            self.labels.retain(|_, cached| cached != renamed);
        }
        for (renamed, target) in &renames {
            self.claim_label(renamed, target)?;
        }
        if is_attribute_type {
            self.reindex_attributes(id, &label)?;
        }
        tracing::debug!(from = %current, to = %label, renamed = renames.len(), "relabelled schema concept");
        Ok(())
    }

    fn claim_label(&mut self, id: &ConceptId, label: &Label) -> Result<(), OntographError> {
        let vertex = self.live(id)?.element().id();
        if let Claim::Taken(_) =
            self.store
                .claim_unique(vertex, PropertyKey::SchemaLabel, label.as_str())?
        {
            return Err(OntographError::LabelTaken {
                label: label.clone(),
                existing: "schema concept".to_string(),
            });
        }
        if let Some(schema) = self.live(id)?.schema_mut() {
            schema.label = label.clone();
        }
        self.labels.insert(label.clone(), id.clone());
        Ok(())
    }

    /// The compact id written onto role-player and attribute edges.
    pub fn label_id<H: SchemaHandle>(&mut self, concept: &H) -> Result<LabelId, OntographError> {
        self.schema_label_id(concept.concept_id())
    }

    /// Whether the concept was generated for has/key attachment.
    pub fn is_implicit<H: SchemaHandle>(&mut self, concept: &H) -> Result<bool, OntographError> {
        let id = concept.concept_id();
        Ok(self.live(id)?.schema().is_some_and(|s| s.is_implicit))
    }

    pub(crate) fn is_meta(&mut self, id: &ConceptId) -> Result<bool, OntographError> {
        let concept = self.live(id)?;
        Ok(concept
            .schema()
            .is_some_and(|s| !s.is_implicit && MetaSchema::is_meta_label(s.label.as_str())))
    }

    /// Fail with `MetaTypeImmutable` if `id` names a meta concept.
    pub(crate) fn reject_meta(&mut self, id: &ConceptId) -> Result<(), OntographError> {
        if self.is_meta(id)? {
            return Err(OntographError::MetaTypeImmutable(self.schema_label(id)?));
        }
        Ok(())
    }

    /// Schema concept carrying `label_id`.
    pub(crate) fn schema_by_label_id(
        &mut self,
        label_id: LabelId,
    ) -> Result<Option<ConceptId>, OntographError> {
        self.resolve_id(ElementRef::Vertex(label_id.vertex()))
    }

    // =========================================================================
    // HIERARCHY
    // =========================================================================

    pub(crate) fn sup_id(&mut self, id: &ConceptId) -> Result<Option<ConceptId>, OntographError> {
        let concept = self.live(id)?;
        if let Some(cached) = concept.schema().and_then(|s| s.sup.get()) {
            return Ok(cached.clone());
        }
        let vertex = concept.element().id();
        let sup = match self.adjacent(vertex, Direction::Out, EdgeLabel::Sub)?.first() {
            Some(target) => self.resolve_id(ElementRef::Vertex(*target))?,
            None => None,
        };
        if let Some(schema) = self.live(id)?.schema_mut() {
            schema.sup.set(sup.clone());
        }
        Ok(sup)
    }

    /// `id` followed by its supertypes, nearest first.
    pub(crate) fn sup_chain(&mut self, id: &ConceptId) -> Result<Vec<ConceptId>, OntographError> {
        let mut chain = vec![id.clone()];
        let mut current = id.clone();
        while let Some(next) = self.sup_id(&current)? {
            if chain.len() > MAX_HIERARCHY_DEPTH || chain.contains(&next) {
                let element = self.live(id)?.element();
                return Err(OntographError::CorruptedElement {
                    element,
                    property: EdgeLabel::Sub.as_str(),
                });
            }
            chain.push(next.clone());
            current = next;
        }
        Ok(chain)
    }

    /// `id` and every transitive subtype, breadth first.
    pub(crate) fn sub_ids(&mut self, id: &ConceptId) -> Result<Vec<ConceptId>, OntographError> {
        let mut seen = BTreeSet::from([id.clone()]);
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            let vertex = self.live(&current)?.element().id();
            for source in self.adjacent(vertex, Direction::In, EdgeLabel::Sub)? {
                if let Some(sub) = self.resolve_id(ElementRef::Vertex(source))? {
                    if seen.insert(sub.clone()) {
                        queue.push_back(sub);
                    }
                }
            }
            out.push(current);
        }
        Ok(out)
    }

    /// Direct supertype.
    ///
    /// The meta root of a kind sits under `thing`, which is not of that kind;
    /// its supertype is reported as `None` for that reason.
    pub fn sup<H: SchemaHandle>(&mut self, concept: &H) -> Result<Option<H>, OntographError> {
        match self.sup_id(concept.concept_id())? {
            Some(id) => self.get::<H>(&id),
            None => Ok(None),
        }
    }

    /// The concept and its supertypes, nearest first.
    pub fn sups<H: SchemaHandle>(&mut self, concept: &H) -> Result<Vec<H>, OntographError> {
        let ids = self.sup_chain(concept.concept_id())?;
        self.narrow_all(ids)
    }

    /// The concept and all of its transitive subtypes.
    pub fn subs<H: SchemaHandle>(&mut self, concept: &H) -> Result<Vec<H>, OntographError> {
        let ids = self.sub_ids(concept.concept_id())?;
        self.narrow_all(ids)
    }

    pub(crate) fn narrow_all<H: TypedHandle>(
        &mut self,
        ids: Vec<ConceptId>,
    ) -> Result<Vec<H>, OntographError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(handle) = self.get::<H>(&id)? {
                out.push(handle);
            }
        }
        Ok(out)
    }

    /// Make `sup` the direct supertype of `sub`.
    pub fn set_sup<H: SchemaHandle>(&mut self, sub: &H, sup: &H) -> Result<(), OntographError> {
        let (sub_id, sup_id) = (sub.concept_id(), sup.concept_id());
        self.reject_meta(sub_id)?;
        if self.sup_chain(sup_id)?.contains(sub_id) {
            return Err(OntographError::SupLoop {
                sub: self.schema_label(sub_id)?,
                sup: self.schema_label(sup_id)?,
            });
        }
        if self.live(sub_id)?.kind() == ConceptKind::AttributeType && !self.is_meta(sup_id)? {
            let existing = self.attribute_data_type(sub_id)?;
            let requested = self.attribute_data_type(sup_id)?;
            if existing != requested {
                return Err(OntographError::DataTypeMismatch {
                    label: self.schema_label(sub_id)?,
                    existing,
                    requested,
                });
            }
        }
        self.set_sup_raw(sub_id, sup_id)?;
        match self.live(sub_id)?.kind() {
            ConceptKind::Role => {
                self.tracking.roles.insert(sub_id.clone());
            }
            ConceptKind::RelationshipType => {
                self.tracking.relationship_types.insert(sub_id.clone());
            }
            _ => {}
        }
        Ok(())
    }

    /// Replace the SUB edge of `sub` without any checks.
    pub(crate) fn set_sup_raw(
        &mut self,
        sub: &ConceptId,
        sup: &ConceptId,
    ) -> Result<(), OntographError> {
        let sub_vertex = self.live(sub)?.element().id();
        let sup_vertex = self.live(sup)?.element().id();
        self.delete_edges(sub_vertex, EdgeLabel::Sub, None)?;
        self.store.add_edge(sub_vertex, sup_vertex, EdgeLabel::Sub.as_str())?;
        if let Some(schema) = self.live(sub)?.schema_mut() {
            schema.sup.set(Some(sup.clone()));
        }
        Ok(())
    }

    // =========================================================================
    // SESSION-SHARED SETS
    // =========================================================================

    /// Read a session-shared set, seeding it from the session tier or the graph.
    pub(crate) fn session_set(
        &mut self,
        id: &ConceptId,
        slot: SetSlot,
    ) -> Result<BTreeSet<ConceptId>, OntographError> {
        let vertex = self.live(id)?.element().id();
        let tier = &*self.tier;
        let store = &*self.store;
        let concept = self
            .arena
            .get_mut(id)
            .ok_or_else(|| OntographError::ConceptNotFound(id.clone()))?;
        let kind = concept.kind();
        let Some(cache) = concept.set_cache_mut(slot) else {
            return Err(OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "schema concept",
                actual: kind.name(),
            });
        };
        if !cache.load_snapshot(tier.entry(id).and_then(|e| slot.tier_value(e))) {
            cache.load_fresh(fresh_set(store, vertex, slot)?);
        }
        Ok(cache.get().cloned().unwrap_or_default())
    }

    /// Record an incremental change to a session-shared set.
    pub(crate) fn change_session_set(
        &mut self,
        id: &ConceptId,
        slot: SetSlot,
        delta: SetDelta<ConceptId>,
    ) -> Result<(), OntographError> {
        if let Some(cache) = self.live(id)?.set_cache_mut(slot) {
            cache.apply(delta);
        }
        Ok(())
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    /// Relationship types relating `role`.
    pub fn relationship_types(&mut self, role: &Role) -> Result<Vec<RelationshipType>, OntographError> {
        let ids = self.session_set(role.id(), SetSlot::RelationshipTypes)?;
        self.narrow_all(ids.into_iter().collect())
    }

    /// Types that play `role` directly.
    pub fn players(&mut self, role: &Role) -> Result<Vec<Type>, OntographError> {
        let ids = self.session_set(role.id(), SetSlot::Players)?;
        self.narrow_all(ids.into_iter().collect())
    }

    /// Delete a role that no relationship type relates and no type plays.
    pub fn delete_role(&mut self, role: &Role) -> Result<(), OntographError> {
        let id = role.id();
        self.reject_meta(id)?;
        let in_use = !self.session_set(id, SetSlot::RelationshipTypes)?.is_empty()
            || !self.session_set(id, SetSlot::Players)?.is_empty()
            || self.sub_ids(id)?.len() > 1;
        if in_use {
            return Err(OntographError::DeletionNotAllowed(id.clone()));
        }
        self.delete_schema_element(id)
    }

    // =========================================================================
    // RULES
    // =========================================================================

    /// Pattern text of the rule body.
    pub fn when(&mut self, rule: &Rule) -> Result<String, OntographError> {
        self.rule_text(rule.id(), PropertyKey::RuleWhen)
    }

    /// Pattern text of the rule head.
    pub fn then(&mut self, rule: &Rule) -> Result<String, OntographError> {
        self.rule_text(rule.id(), PropertyKey::RuleThen)
    }

    fn rule_text(&mut self, id: &ConceptId, key: PropertyKey) -> Result<String, OntographError> {
        let element = self.live(id)?.element();
        let store = &*self.store;
        let concept = self
            .arena
            .get(id)
            .ok_or_else(|| OntographError::ConceptNotFound(id.clone()))?;
        let super::ConceptState::Rule(_, rule) = &concept.state else {
            return Err(OntographError::WrongConceptKind {
                id: id.clone(),
                expected: Rule::EXPECTED,
                actual: concept.kind().name(),
            });
        };
        let cell = match key {
            PropertyKey::RuleWhen => &rule.when,
            _ => &rule.then,
        };
        cell.get_or_try_init(|| match store.property(element, key)? {
            Some(Value::String(text)) => Ok(text),
            _ => Err(OntographError::CorruptedElement {
                element,
                property: key.as_str(),
            }),
        })
        .cloned()
    }

    pub fn delete_rule(&mut self, rule: &Rule) -> Result<(), OntographError> {
        self.reject_meta(rule.id())?;
        self.delete_schema_element(rule.id())
    }

    /// Drop label lookups of a schema concept, then delete it.
    pub(crate) fn delete_schema_element(&mut self, id: &ConceptId) -> Result<(), OntographError> {
        self.labels.retain(|_, cached| cached != id);
        self.delete_concept_element(id)
    }
}

/// A session-shared set as the graph currently stores it.
fn fresh_set<S: GraphStore>(
    store: &S,
    vertex: ElementId,
    slot: SetSlot,
) -> Result<BTreeSet<ConceptId>, OntographError> {
    let (direction, label) = match slot {
        SetSlot::Plays => (Direction::Out, EdgeLabel::Plays),
        SetSlot::Relates => (Direction::Out, EdgeLabel::Relates),
        SetSlot::RelationshipTypes => (Direction::In, EdgeLabel::Relates),
        SetSlot::Players => (Direction::In, EdgeLabel::Plays),
    };
    Ok(store
        .edges(vertex, direction, Some(label.as_str()))?
        .into_iter()
        .map(|e| ConceptId::from_element(ElementRef::Vertex(e.other(vertex))))
        .collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::concept::{EntityType, Role};
    use crate::schema::MetaSchema;
    use crate::session::Session;
    use crate::types::{DataType, OntographError};

    #[test]
    fn put_is_idempotent_by_label() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let a = tx.put_entity_type("person").expect("first");
        let b = tx.put_entity_type("person").expect("second");
        assert_eq!(a, b);
        assert_eq!(tx.get_entity_type("person").expect("get"), Some(a));
    }

    #[test]
    fn label_of_another_kind_is_taken() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        tx.put_entity_type("person").expect("type");
        let err = tx.put_role("person").expect_err("kind clash");
        assert!(matches!(err, OntographError::LabelTaken { .. }));
    }

    #[test]
    fn meta_labels_cannot_be_redeclared() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let err = tx.put_entity_type("entity").expect_err("meta");
        assert!(matches!(err, OntographError::MetaTypeImmutable(_)));
    }

    #[test]
    fn relabel_moves_the_unique_label() {
        let mut session = Session::in_memory().expect("session");
        {
            let mut tx = session.transaction().expect("tx");
            let person = tx.put_entity_type("person").expect("person");
            tx.put_role("employee").expect("role");
            tx.set_label(&person, "human").expect("relabel");

            assert_eq!(tx.label(&person).expect("label").as_str(), "human");
            assert_eq!(tx.get_entity_type("human").expect("get"), Some(person.clone()));
            assert!(tx.get_entity_type("person").expect("get").is_none());
            tx.set_label(&person, "human").expect("same label");

            let err = tx.set_label(&person, "employee").expect_err("taken");
            assert!(matches!(err, OntographError::LabelTaken { .. }));
            assert_eq!(tx.label(&person).expect("label").as_str(), "human");
            tx.commit().expect("commit");
        }

        let mut tx = session.transaction().expect("tx");
        assert!(tx.get_entity_type("human").expect("get").is_some());
        let person = tx.put_entity_type("person").expect("label is free again");
        assert_eq!(tx.label(&person).expect("label").as_str(), "person");
    }

    #[test]
    fn relabel_rejects_meta_and_implicit_concepts() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let entity: EntityType = tx
            .get_entity_type(MetaSchema::Entity.label_str())
            .expect("get")
            .expect("meta entity");
        let err = tx.set_label(&entity, "being").expect_err("meta concept");
        assert!(matches!(err, OntographError::MetaTypeImmutable(_)));

        let person = tx.put_entity_type("person").expect("person");
        let err = tx.set_label(&person, "entity").expect_err("meta label");
        assert!(matches!(err, OntographError::MetaTypeImmutable(_)));

        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let owner: Role = tx.get_role("@has-name-owner").expect("get").expect("implicit");
        let err = tx.set_label(&owner, "@has-alias-owner").expect_err("implicit");
        assert!(matches!(err, OntographError::ImplicitLabel(_)));
    }

    #[test]
    fn relabelled_attribute_types_keep_their_instances() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        tx.has_attribute(&alice, &value).expect("attach");

        tx.set_label(&name, "alias").expect("relabel");

        assert!(tx.get_relationship_type("@has-name").expect("get").is_none());
        assert!(tx.get_relationship_type("@has-alias").expect("get").is_some());
        assert!(tx.get_role("@has-alias-owner").expect("get").is_some());
        assert!(tx.get_role("@has-alias-value").expect("get").is_some());
        assert_eq!(tx.get_attribute(&name, "Alice").expect("get"), Some(value.clone()));
        assert_eq!(tx.put_attribute(&name, "Alice").expect("put"), value);
        assert_eq!(tx.attributes(&alice, &[]).expect("attributes"), vec![value.clone()]);

        let bob = tx.add_entity(&person).expect("bob");
        tx.has_attribute(&bob, &value).expect("attach under the new label");
        assert_eq!(tx.owners(&value).expect("owners").len(), 2);
        tx.commit().expect("commit");
    }

    #[test]
    fn sup_chain_and_subs() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let animal = tx.put_entity_type("animal").expect("animal");
        let dog = tx.put_entity_type("dog").expect("dog");
        let puppy = tx.put_entity_type("puppy").expect("puppy");
        tx.set_sup(&dog, &animal).expect("dog sub animal");
        tx.set_sup(&puppy, &dog).expect("puppy sub dog");

        assert_eq!(tx.sup(&puppy).expect("sup"), Some(dog.clone()));
        let sups: Vec<EntityType> = tx.sups(&puppy).expect("sups");
        assert_eq!(sups.len(), 4, "puppy, dog, animal, entity");
        let subs = tx.subs(&animal).expect("subs");
        assert_eq!(subs, vec![animal.clone(), dog.clone(), puppy.clone()]);

        let err = tx.set_sup(&animal, &puppy).expect_err("loop");
        assert!(matches!(err, OntographError::SupLoop { .. }));
    }

    #[test]
    fn meta_concepts_are_immutable() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let entity: EntityType = tx
            .get_entity_type(MetaSchema::Entity.label_str())
            .expect("get")
            .expect("meta entity");
        let person = tx.put_entity_type("person").expect("person");
        let err = tx.set_sup(&entity, &person).expect_err("meta");
        assert!(matches!(err, OntographError::MetaTypeImmutable(_)));
    }

    #[test]
    fn roles_in_use_cannot_be_deleted() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let marriage = tx.put_relationship_type("marriage").expect("rt");
        let spouse: Role = tx.put_role("spouse").expect("role");
        tx.relates(&marriage, &spouse).expect("relates");
        let err = tx.delete_role(&spouse).expect_err("in use");
        assert!(matches!(err, OntographError::DeletionNotAllowed(_)));

        tx.unrelate(&marriage, &spouse).expect("unrelate");
        tx.delete_role(&spouse).expect("delete");
        assert!(tx.get_role("spouse").expect("get").is_none());
    }

    #[test]
    fn rules_store_pattern_text() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let rule = tx
            .put_rule("transitive", "{$x sub $y;};", "{$y sub $x;};")
            .expect("rule");
        assert_eq!(tx.when(&rule).expect("when"), "{$x sub $y;};");
        assert_eq!(tx.then(&rule).expect("then"), "{$y sub $x;};");
    }
}
