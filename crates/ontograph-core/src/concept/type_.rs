//! Type behaviour: instances, plays, has/key, abstractness and deletion.

use super::{
    AttributeType, ConceptKind, ConceptStream, Entity, EntityType, Role, SetSlot, Thing,
    TypeHandle,
};
use crate::cache::SetDelta;
use crate::graph::GraphStore;
use crate::schema::{BaseType, EdgeLabel, ImplicitType, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{ConceptId, Direction, ElementRef, Label, OntographError, Value};
use std::collections::BTreeSet;

/// Implicit relationship type, owner role and value role of one attachment.
#[derive(Debug, Clone)]
pub(crate) struct ImplicitTriple {
    pub(crate) relationship_type: ConceptId,
    pub(crate) owner: ConceptId,
    pub(crate) value: ConceptId,
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    // =========================================================================
    // INSTANCES
    // =========================================================================

    /// Create an instance vertex of `type_id`, linked to the type's current shard.
    pub(crate) fn add_instance(
        &mut self,
        type_id: &ConceptId,
        base: BaseType,
        inferred: bool,
    ) -> Result<ConceptId, OntographError> {
        self.reject_meta(type_id)?;
        if self.is_abstract_id(type_id)? {
            return Err(OntographError::AbstractInstance(self.schema_label(type_id)?));
        }
        let shard = self.current_shard_of(type_id)?;
        let label_id = self.schema_label_id(type_id)?;

        let vertex = self.store.add_vertex(base.as_str())?;
        let element = ElementRef::Vertex(vertex);
        self.store.add_edge(vertex, shard, EdgeLabel::Isa.as_str())?;
        self.store
            .set_property(element, PropertyKey::ThingTypeLabelId, label_id.to_value())?;
        if inferred {
            self.store
                .set_property(element, PropertyKey::IsInferred, Value::Boolean(true))?;
        }

        let id = self
            .resolve_id(element)?
            .ok_or(OntographError::ElementNotFound(element))?;
        if let Some(thing) = self.live(&id)?.thing_mut() {
            thing.type_id.set(type_id.clone());
        }
        if !self.implicit_attribute_types(type_id, true)?.is_empty() {
            self.tracking.things.insert(id.clone());
        }
        Ok(id)
    }

    pub fn add_entity(&mut self, ty: &EntityType) -> Result<Entity, OntographError> {
        let id = self.add_instance(ty.id(), BaseType::Entity, false)?;
        Ok(Entity(id))
    }

    /// Create an entity derived by reasoning.
    pub fn add_entity_inferred(&mut self, ty: &EntityType) -> Result<Entity, OntographError> {
        let id = self.add_instance(ty.id(), BaseType::Entity, true)?;
        Ok(Entity(id))
    }

    /// Instances whose ISA edge points at one of the type's own shards.
    pub(crate) fn direct_instance_vertices(
        &mut self,
        id: &ConceptId,
    ) -> Result<Vec<ElementRef>, OntographError> {
        let mut out = Vec::new();
        for shard in self.shard_vertices(id)? {
            for member in self.adjacent(shard, Direction::In, EdgeLabel::Isa)? {
                out.push(ElementRef::Vertex(member));
            }
        }
        Ok(out)
    }

    /// Edge-form relationships of an implicit relationship type.
    ///
    /// They have no ISA edge. They are found from the instances of every type
    /// playing one of the relationship type's roles.
    fn edge_instances(&mut self, id: &ConceptId) -> Result<Vec<ElementRef>, OntographError> {
        let label_id = self.schema_label_id(id)?;
        let mut edges = BTreeSet::new();
        for role in self.session_set(id, SetSlot::Relates)? {
            for player in self.session_set(&role, SetSlot::Players)? {
                for sub in self.sub_ids(&player)? {
                    for owner in self.direct_instance_vertices(&sub)? {
                        for edge in self.store.edges_by_property(
                            owner.id(),
                            Direction::Out,
                            EdgeLabel::Attribute.as_str(),
                            PropertyKey::RelationshipTypeLabelId,
                            label_id.0 as i64,
                        )? {
                            edges.insert(edge.id);
                        }
                    }
                }
            }
        }
        Ok(edges.into_iter().map(ElementRef::Edge).collect())
    }

    pub(crate) fn direct_instance_elements(
        &mut self,
        id: &ConceptId,
    ) -> Result<Vec<ElementRef>, OntographError> {
        let mut out = self.direct_instance_vertices(id)?;
        let concept = self.live(id)?;
        let implicit_relationship = concept.kind() == ConceptKind::RelationshipType
            && concept.schema().is_some_and(|s| s.is_implicit);
        if implicit_relationship {
            out.extend(self.edge_instances(id)?);
        }
        Ok(out)
    }

    /// Instances of the type and of all its subtypes.
    pub(crate) fn instance_elements(
        &mut self,
        id: &ConceptId,
    ) -> Result<Vec<ElementRef>, OntographError> {
        let mut out = Vec::new();
        for sub in self.sub_ids(id)? {
            out.extend(self.direct_instance_elements(&sub)?);
        }
        Ok(out)
    }

    /// Every instance of a type and its subtypes, resolved lazily.
    pub fn instances<T: TypeHandle>(
        &mut self,
        ty: &T,
    ) -> Result<ConceptStream<'_, 's, S, Thing>, OntographError> {
        let elements = self.instance_elements(ty.concept_id())?;
        Ok(self.stream_of::<Thing>(elements))
    }

    // =========================================================================
    // ABSTRACTNESS
    // =========================================================================

    pub(crate) fn is_abstract_id(&mut self, id: &ConceptId) -> Result<bool, OntographError> {
        let concept = self.live(id)?;
        let kind = concept.kind();
        let state = concept
            .type_state_mut()
            .ok_or_else(|| OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "type",
                actual: kind.name(),
            })?;
        Ok(state.is_abstract.get().copied().unwrap_or(false))
    }

    pub fn is_abstract<T: TypeHandle>(&mut self, ty: &T) -> Result<bool, OntographError> {
        self.is_abstract_id(ty.concept_id())
    }

    /// Mark a type abstract or concrete.
    ///
    /// A type with direct instances cannot become abstract.
    pub fn set_abstract<T: TypeHandle>(&mut self, ty: &T, value: bool) -> Result<(), OntographError> {
        let id = ty.concept_id();
        self.reject_meta(id)?;
        if value && !self.direct_instance_elements(id)?.is_empty() {
            return Err(OntographError::AbstractInstance(self.schema_label(id)?));
        }
        let concept = self.live(id)?;
        let element = concept.element();
        let kind = concept.kind();
        if let Some(state) = concept.type_state_mut() {
            state.is_abstract.set(value);
        }
        self.store
            .set_property(element, PropertyKey::IsAbstract, Value::Boolean(value))?;
        if kind == ConceptKind::RelationshipType {
            if value {
                self.tracking.relationship_types.remove(id);
            } else {
                self.tracking.relationship_types.insert(id.clone());
            }
        }
        Ok(())
    }

    // =========================================================================
    // PLAYS
    // =========================================================================

    /// Link a type to a role it may play, without schema mutation checks.
    pub(crate) fn play(
        &mut self,
        type_id: &ConceptId,
        role_id: &ConceptId,
        required: bool,
    ) -> Result<(), OntographError> {
        let type_vertex = self.live(type_id)?.element().id();
        let role_vertex = self.live(role_id)?.element().id();
        let edge = self.put_edge(type_vertex, role_vertex, EdgeLabel::Plays)?;
        if required {
            self.store
                .set_property(ElementRef::Edge(edge), PropertyKey::Required, Value::Boolean(true))?;
        }
        self.change_session_set(type_id, SetSlot::Plays, SetDelta::Insert(role_id.clone()))?;
        self.change_session_set(role_id, SetSlot::Players, SetDelta::Insert(type_id.clone()))?;
        self.tracking.roles.insert(role_id.clone());
        Ok(())
    }

    pub(crate) fn unplay_raw(
        &mut self,
        type_id: &ConceptId,
        role_id: &ConceptId,
    ) -> Result<(), OntographError> {
        let type_vertex = self.live(type_id)?.element().id();
        let role_vertex = self.live(role_id)?.element().id();
        self.delete_edges(type_vertex, EdgeLabel::Plays, Some(role_vertex))?;
        self.change_session_set(type_id, SetSlot::Plays, SetDelta::Remove(role_id.clone()))?;
        self.change_session_set(role_id, SetSlot::Players, SetDelta::Remove(type_id.clone()))?;

        for element in self.instance_elements(type_id)? {
            if let Some(thing) = self.resolve_id(element)? {
                self.track_castings_of(&thing)?;
            }
        }
        Ok(())
    }

    /// Allow instances of `ty` to play `role`.
    pub fn plays<T: TypeHandle>(&mut self, ty: &T, role: &Role) -> Result<(), OntographError> {
        self.reject_meta(ty.concept_id())?;
        self.reject_meta(role.id())?;
        self.play(ty.concept_id(), role.id(), false)
    }

    /// Stop instances of `ty` from playing `role`.
    ///
    /// Existing castings of the type's instances are re-checked at commit.
    pub fn unplay<T: TypeHandle>(&mut self, ty: &T, role: &Role) -> Result<(), OntographError> {
        self.reject_meta(ty.concept_id())?;
        self.unplay_raw(ty.concept_id(), role.id())
    }

    /// Roles the type plays, directly or through a supertype.
    pub(crate) fn playing_ids(&mut self, id: &ConceptId) -> Result<BTreeSet<ConceptId>, OntographError> {
        let mut roles = BTreeSet::new();
        for ancestor in self.sup_chain(id)? {
            roles.extend(self.session_set(&ancestor, SetSlot::Plays)?);
        }
        Ok(roles)
    }

    pub fn playing<T: TypeHandle>(&mut self, ty: &T) -> Result<Vec<Role>, OntographError> {
        let ids = self.playing_ids(ty.concept_id())?;
        self.narrow_all(ids.into_iter().collect())
    }

    // =========================================================================
    // HAS / KEY
    // =========================================================================

    /// Return the implicit triple of `attribute_label`, creating it if absent.
    pub(crate) fn put_implicit_triple(
        &mut self,
        attribute_label: &Label,
        is_key: bool,
    ) -> Result<ImplicitTriple, OntographError> {
        let (rel, owner, value) = ImplicitType::triple(is_key);
        let triple = ImplicitTriple {
            relationship_type: self.put_schema_concept(
                &rel.label(attribute_label),
                BaseType::RelationshipType,
                true,
            )?,
            owner: self.put_schema_concept(&owner.label(attribute_label), BaseType::Role, true)?,
            value: self.put_schema_concept(&value.label(attribute_label), BaseType::Role, true)?,
        };
        self.relate(&triple.relationship_type, &triple.owner)?;
        self.relate(&triple.relationship_type, &triple.value)?;
        Ok(triple)
    }

    /// The implicit triple of `attribute_label`, if it exists.
    pub(crate) fn implicit_triple(
        &mut self,
        attribute_label: &Label,
        is_key: bool,
    ) -> Result<Option<ImplicitTriple>, OntographError> {
        let (rel, owner, value) = ImplicitType::triple(is_key);
        let lookup = (
            self.schema_id_by_label(&rel.label(attribute_label))?,
            self.schema_id_by_label(&owner.label(attribute_label))?,
            self.schema_id_by_label(&value.label(attribute_label))?,
        );
        Ok(match lookup {
            (Some(relationship_type), Some(owner), Some(value)) => Some(ImplicitTriple {
                relationship_type,
                owner,
                value,
            }),
            _ => None,
        })
    }

    fn declare_attribute(
        &mut self,
        owner: &ConceptId,
        attribute_type: &ConceptId,
        is_key: bool,
    ) -> Result<(), OntographError> {
        self.reject_meta(owner)?;
        self.reject_meta(attribute_type)?;
        if self
            .implicit_attribute_types(owner, !is_key)?
            .contains(attribute_type)
        {
            return Err(OntographError::DuplicateHas {
                owner: self.schema_label(owner)?,
                attribute_type: self.schema_label(attribute_type)?,
            });
        }

        let label = self.schema_label(attribute_type)?;
        let triple = self.put_implicit_triple(&label, is_key)?;
        self.play(owner, &triple.owner, is_key)?;
        self.play(attribute_type, &triple.value, false)?;

        // Link every implicit triple to the one of the attribute supertype.
        let (mut current, mut triple) = (attribute_type.clone(), triple);
        while let Some(sup) = self.sup_id(&current)? {
            let sup_label = self.schema_label(&sup)?;
            let sup_triple = self.put_implicit_triple(&sup_label, is_key)?;
            self.set_sup_raw(&triple.owner, &sup_triple.owner)?;
            self.set_sup_raw(&triple.value, &sup_triple.value)?;
            self.set_sup_raw(&triple.relationship_type, &sup_triple.relationship_type)?;
            if self.is_meta(&sup)? {
                break;
            }
            self.play(&sup, &sup_triple.value, false)?;
            current = sup;
            triple = sup_triple;
        }
        Ok(())
    }

    /// Allow instances of `ty` to own attributes of `attribute_type`.
    pub fn has<T: TypeHandle>(
        &mut self,
        ty: &T,
        attribute_type: &AttributeType,
    ) -> Result<(), OntographError> {
        self.declare_attribute(ty.concept_id(), attribute_type.id(), false)
    }

    /// Require instances of `ty` to own exactly one attribute of `attribute_type`.
    pub fn key<T: TypeHandle>(
        &mut self,
        ty: &T,
        attribute_type: &AttributeType,
    ) -> Result<(), OntographError> {
        self.declare_attribute(ty.concept_id(), attribute_type.id(), true)
    }

    /// Attribute types linked to `id` through has (or key) owner roles it plays.
    pub(crate) fn implicit_attribute_types(
        &mut self,
        id: &ConceptId,
        is_key: bool,
    ) -> Result<Vec<ConceptId>, OntographError> {
        let (_, owner, _) = ImplicitType::triple(is_key);
        let mut out = Vec::new();
        for role in self.playing_ids(id)? {
            let role_label = self.schema_label(&role)?;
            let Some(attribute_label) = owner.attribute_label(&role_label) else {
                continue;
            };
            if let Some(attribute_type) = self.schema_id_by_label(&attribute_label)? {
                if !out.contains(&attribute_type) {
                    out.push(attribute_type);
                }
            }
        }
        Ok(out)
    }

    /// Attribute types instances of `ty` may own, keys included.
    pub fn attribute_types<T: TypeHandle>(
        &mut self,
        ty: &T,
    ) -> Result<Vec<AttributeType>, OntographError> {
        let mut ids = self.implicit_attribute_types(ty.concept_id(), false)?;
        for key in self.implicit_attribute_types(ty.concept_id(), true)? {
            if !ids.contains(&key) {
                ids.push(key);
            }
        }
        self.narrow_all(ids)
    }

    pub fn key_types<T: TypeHandle>(&mut self, ty: &T) -> Result<Vec<AttributeType>, OntographError> {
        let ids = self.implicit_attribute_types(ty.concept_id(), true)?;
        self.narrow_all(ids)
    }

    fn unlink_attribute(
        &mut self,
        owner: &ConceptId,
        attribute_type: &ConceptId,
        is_key: bool,
    ) -> Result<(), OntographError> {
        self.reject_meta(owner)?;
        if !self
            .implicit_attribute_types(owner, is_key)?
            .contains(attribute_type)
        {
            return Ok(());
        }
        let owner_label = self.schema_label(owner)?;
        let attribute_label = self.schema_label(attribute_type)?;
        let illegal = |reason| OntographError::IllegalUnhas {
            owner: owner_label.clone(),
            attribute_type: attribute_label.clone(),
            reason,
        };

        for element in self.instance_elements(attribute_type)? {
            let Some(attribute) = self.resolve_id(element)? else {
                continue;
            };
            for holder in self.owner_ids(&attribute)? {
                if self.thing_type_id(&holder)? == *owner {
                    return Err(illegal("instances of the type still own such attributes"));
                }
            }
        }

        let Some(triple) = self.implicit_triple(&attribute_label, is_key)? else {
            return Err(illegal("the attribute type is not linked"));
        };
        if !self.session_set(owner, SetSlot::Plays)?.contains(&triple.owner) {
            return Err(illegal("the link is inherited from a supertype"));
        }

        self.unplay_raw(owner, &triple.owner)?;
        if self.session_set(&triple.owner, SetSlot::Players)?.is_empty() {
            self.unplay_raw(attribute_type, &triple.value)?;
            self.unrelate_raw(&triple.relationship_type, &triple.owner)?;
            self.unrelate_raw(&triple.relationship_type, &triple.value)?;
            for role in [&triple.owner, &triple.value] {
                if self.sub_ids(role)?.len() == 1
                    && self.session_set(role, SetSlot::Players)?.is_empty()
                {
                    self.delete_schema_element(role)?;
                }
            }
            if self.sub_ids(&triple.relationship_type)?.len() == 1
                && self.instance_elements(&triple.relationship_type)?.is_empty()
            {
                self.delete_type_id(&triple.relationship_type)?;
            }
        }
        Ok(())
    }

    /// Remove a has declaration.
    pub fn unhas<T: TypeHandle>(
        &mut self,
        ty: &T,
        attribute_type: &AttributeType,
    ) -> Result<(), OntographError> {
        self.unlink_attribute(ty.concept_id(), attribute_type.id(), false)
    }

    /// Remove a key declaration.
    pub fn unkey<T: TypeHandle>(
        &mut self,
        ty: &T,
        attribute_type: &AttributeType,
    ) -> Result<(), OntographError> {
        self.unlink_attribute(ty.concept_id(), attribute_type.id(), true)
    }

    // =========================================================================
    // DELETION
    // =========================================================================

    /// Delete a type with no subtypes and no instances.
    pub fn delete_type<T: TypeHandle>(&mut self, ty: &T) -> Result<(), OntographError> {
        let id = ty.concept_id();
        self.reject_meta(id)?;
        if self.sub_ids(id)?.len() > 1 || !self.direct_instance_elements(id)?.is_empty() {
            return Err(OntographError::DeletionNotAllowed(id.clone()));
        }
        self.delete_type_id(id)
    }

    pub(crate) fn delete_type_id(&mut self, id: &ConceptId) -> Result<(), OntographError> {
        for role in self.session_set(id, SetSlot::Plays)? {
            self.change_session_set(&role, SetSlot::Players, SetDelta::Remove(id.clone()))?;
        }
        if self.live(id)?.kind() == ConceptKind::RelationshipType {
            for role in self.session_set(id, SetSlot::Relates)? {
                self.change_session_set(
                    &role,
                    SetSlot::RelationshipTypes,
                    SetDelta::Remove(id.clone()),
                )?;
                self.tracking.roles.insert(role);
            }
        }
        for shard in self.shard_vertices(id)? {
            self.store.delete_vertex(shard)?;
        }
        self.delete_schema_element(id)
    }
}

impl ImplicitType {
    /// Attribute type label encoded in an implicit label of this kind.
    pub(crate) fn attribute_label(self, implicit: &Label) -> Option<Label> {
        let (prefix, suffix) = match self {
            Self::HasRelationship => ("@has-", ""),
            Self::HasOwner => ("@has-", "-owner"),
            Self::HasValue => ("@has-", "-value"),
            Self::KeyRelationship => ("@key-", ""),
            Self::KeyOwner => ("@key-", "-owner"),
            Self::KeyValue => ("@key-", "-value"),
        };
        implicit
            .as_str()
            .strip_prefix(prefix)?
            .strip_suffix(suffix)
            .filter(|rest| !rest.is_empty())
            .map(Label::new)
    }
}

// =============================================================================
// TESTS
// =============================================================================
