//! Things: their type, attribute attachment, navigation and deletion.
//!
//! Attaching an attribute is relationship creation. The owner and the
//! attribute are joined by an edge-form relationship of the implicit
//! relationship type derived from the attribute type's label.

use super::{
    Attribute, AttributeType, ConceptKind, Relationship, Role, Thing, ThingHandle, Type,
};
use crate::graph::{EdgeRecord, GraphStore};
use crate::schema::{EdgeLabel, ImplicitType, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{ConceptId, Direction, ElementId, ElementRef, LabelId, OntographError, Value};
use std::collections::BTreeSet;

impl<'s, S: GraphStore> Transaction<'s, S> {
    // =========================================================================
    // TYPE
    // =========================================================================

    /// Direct type of a thing: ISA to its shard, SHARD to the type.
    pub(crate) fn thing_type_id(&mut self, id: &ConceptId) -> Result<ConceptId, OntographError> {
        let concept = self.live(id)?;
        let element = concept.element();
        let kind = concept.kind();
        let Some(thing) = concept.thing_mut() else {
            return Err(OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "thing",
                actual: kind.name(),
            });
        };
        if let Some(type_id) = thing.type_id.get() {
            return Ok(type_id.clone());
        }

        let corrupted = || OntographError::CorruptedElement {
            element,
            property: EdgeLabel::Isa.as_str(),
        };
        let shard = self
            .adjacent(element.id(), Direction::Out, EdgeLabel::Isa)?
            .first()
            .copied()
            .ok_or_else(corrupted)?;
        let type_vertex = self
            .adjacent(shard, Direction::Out, EdgeLabel::Shard)?
            .first()
            .copied()
            .ok_or_else(corrupted)?;
        let type_id = self
            .resolve_id(ElementRef::Vertex(type_vertex))?
            .ok_or_else(corrupted)?;
        if let Some(thing) = self.live(id)?.thing_mut() {
            thing.type_id.set(type_id.clone());
        }
        Ok(type_id)
    }

    /// The direct type of a thing.
    pub fn type_of<T: ThingHandle>(&mut self, thing: &T) -> Result<Type, OntographError> {
        let type_id = self.thing_type_id(thing.concept_id())?;
        self.get::<Type>(&type_id)?
            .ok_or(OntographError::ConceptNotFound(type_id))
    }

    /// Whether the thing was derived by reasoning.
    pub fn is_inferred<T: ThingHandle>(&mut self, thing: &T) -> Result<bool, OntographError> {
        let id = thing.concept_id();
        Ok(self
            .live(id)?
            .thing_mut()
            .is_some_and(|state| state.is_inferred))
    }

    /// The vertex backing a thing, reifying an edge-form relationship first.
    pub(crate) fn thing_vertex(&mut self, id: &ConceptId) -> Result<ElementId, OntographError> {
        if let ElementRef::Edge(_) = self.live(id)?.element() {
            self.reify(id)?;
        }
        Ok(self.live(id)?.element().id())
    }

    // =========================================================================
    // ATTRIBUTE ATTACHMENT
    // =========================================================================

    /// Attach `attribute` to `owner`.
    ///
    /// The owner's type must play the implicit owner role of the attribute's
    /// type. It is the key owner role when the owner's type declares the
    /// attribute type as a key.
    pub fn has_attribute<T: ThingHandle>(
        &mut self,
        owner: &T,
        attribute: &Attribute,
    ) -> Result<Relationship, OntographError> {
        self.attach(owner.concept_id(), attribute.id(), false)
    }

    pub fn has_attribute_inferred<T: ThingHandle>(
        &mut self,
        owner: &T,
        attribute: &Attribute,
    ) -> Result<Relationship, OntographError> {
        self.attach(owner.concept_id(), attribute.id(), true)
    }

    fn attach(
        &mut self,
        owner: &ConceptId,
        attribute: &ConceptId,
        inferred: bool,
    ) -> Result<Relationship, OntographError> {
        let owner_type = self.thing_type_id(owner)?;
        let attribute_type = self.thing_type_id(attribute)?;
        let attribute_label = self.schema_label(&attribute_type)?;
        let not_allowed = || OntographError::HasNotAllowed {
            owner: owner.clone(),
            attribute: attribute.clone(),
            attribute_type: attribute_label.clone(),
        };

        let is_key = self
            .implicit_attribute_types(&owner_type, true)?
            .contains(&attribute_type);
        let Some(triple) = self.implicit_triple(&attribute_label, is_key)? else {
            return Err(not_allowed());
        };
        if !self.playing_ids(&owner_type)?.contains(&triple.owner) {
            return Err(not_allowed());
        }

        let relationship_type = self.schema_label_id(&triple.relationship_type)?;
        let owner_role = self.schema_label_id(&triple.owner)?;
        let value_role = self.schema_label_id(&triple.value)?;
        let owner_vertex = self.thing_vertex(owner)?;
        let attribute_vertex = self.live(attribute)?.element().id();

        if let Some(id) =
            self.reified_link(owner_vertex, attribute_vertex, owner_role, value_role)?
        {
            return Ok(Relationship(id));
        }

        let existing = self
            .store
            .edges_by_property(
                owner_vertex,
                Direction::Out,
                EdgeLabel::Attribute.as_str(),
                PropertyKey::RelationshipTypeLabelId,
                relationship_type.0 as i64,
            )?
            .into_iter()
            .find(|e| e.to == attribute_vertex);
        let edge = match existing {
            Some(edge) => edge.id,
            None => {
                let edge = self.add_edge_with(
                    owner_vertex,
                    attribute_vertex,
                    EdgeLabel::Attribute,
                    &[
                        (PropertyKey::RelationshipTypeLabelId, relationship_type.to_value()),
                        (PropertyKey::RelationshipRoleOwnerLabelId, owner_role.to_value()),
                        (PropertyKey::RelationshipRoleValueLabelId, value_role.to_value()),
                    ],
                )?;
                if inferred {
                    self.store.set_property(
                        ElementRef::Edge(edge),
                        PropertyKey::IsInferred,
                        Value::Boolean(true),
                    )?;
                }
                edge
            }
        };

        let element = ElementRef::Edge(edge);
        let id = self
            .resolve_id(element)?
            .ok_or(OntographError::ElementNotFound(element))?;
        if is_key {
            self.tracking.things.insert(owner.clone());
        }
        self.tracking
            .castings
            .insert((id.clone(), triple.owner.clone(), owner.clone()));
        self.tracking
            .castings
            .insert((id.clone(), triple.value.clone(), attribute.clone()));
        Ok(Relationship(id))
    }

    /// A promoted implicit relationship in which `owner` plays `owner_role`
    /// and `attribute` plays `value_role`.
    fn reified_link(
        &mut self,
        owner: ElementId,
        attribute: ElementId,
        owner_role: LabelId,
        value_role: LabelId,
    ) -> Result<Option<ConceptId>, OntographError> {
        for casting in self.store.edges_by_property(
            owner,
            Direction::In,
            EdgeLabel::RolePlayer.as_str(),
            PropertyKey::RoleLabelId,
            owner_role.0 as i64,
        )? {
            let holds_value = self
                .store
                .edges_by_property(
                    casting.from,
                    Direction::Out,
                    EdgeLabel::RolePlayer.as_str(),
                    PropertyKey::RoleLabelId,
                    value_role.0 as i64,
                )?
                .iter()
                .any(|e| e.to == attribute);
            if holds_value {
                if let Some(id) = self.resolve_id(ElementRef::Vertex(casting.from))? {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    /// Detach `attribute` from `owner`, in whichever form the link has.
    pub fn unhas_attribute<T: ThingHandle>(
        &mut self,
        owner: &T,
        attribute: &Attribute,
    ) -> Result<(), OntographError> {
        let owner = owner.concept_id();
        let attribute_vertex = self.live(attribute.id())?.element().id();
        let links: Vec<ConceptId> = self
            .attribute_links(owner)?
            .into_iter()
            .filter(|(_, vertex)| *vertex == attribute_vertex)
            .map(|(relationship, _)| relationship)
            .collect();
        for relationship in links {
            if self.contains(&relationship)? {
                self.delete_thing_id(&relationship)?;
            }
        }
        self.tracking.things.insert(owner.clone());
        Ok(())
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Implicit relationships through which `owner` owns attributes, paired
    /// with the attribute vertex.
    ///
    /// Direct attribute edges and reified implicit relationships in which the
    /// thing plays an owner role are both followed.
    fn attribute_links(
        &mut self,
        owner: &ConceptId,
    ) -> Result<Vec<(ConceptId, ElementId)>, OntographError> {
        let element = self.live(owner)?.element();
        let ElementRef::Vertex(vertex) = element else {
            return Ok(Vec::new());
        };
        let mut links = Vec::new();
        for edge in self
            .store
            .edges(vertex, Direction::Out, Some(EdgeLabel::Attribute.as_str()))?
        {
            if let Some(relationship) = self.resolve_id(ElementRef::Edge(edge.id))? {
                links.push((relationship, edge.to));
            }
        }
        for casting in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::RolePlayer.as_str()))?
        {
            if !self.is_implicit_role(&casting, ImplicitRole::Owner)? {
                continue;
            }
            let Some(relationship) = self.resolve_id(ElementRef::Vertex(casting.from))? else {
                continue;
            };
            for sibling in self.store.edges(
                casting.from,
                Direction::Out,
                Some(EdgeLabel::RolePlayer.as_str()),
            )? {
                if sibling.to != vertex && self.is_implicit_role(&sibling, ImplicitRole::Value)? {
                    links.push((relationship.clone(), sibling.to));
                }
            }
        }
        Ok(links)
    }

    fn is_implicit_role(
        &mut self,
        role_player: &EdgeRecord,
        side: ImplicitRole,
    ) -> Result<bool, OntographError> {
        let Some(role) = role_player
            .long(PropertyKey::RoleLabelId)
            .filter(|n| *n >= 0)
            .map(|n| LabelId(n as u64))
        else {
            return Ok(false);
        };
        let Some(role) = self.schema_by_label_id(role)? else {
            return Ok(false);
        };
        let label = self.schema_label(&role)?;
        let kinds = match side {
            ImplicitRole::Owner => [ImplicitType::HasOwner, ImplicitType::KeyOwner],
            ImplicitRole::Value => [ImplicitType::HasValue, ImplicitType::KeyValue],
        };
        Ok(kinds.iter().any(|k| k.attribute_label(&label).is_some()))
    }

    /// Ids of the filter types and all their subtypes.
    fn type_filter(&mut self, types: &[AttributeType]) -> Result<BTreeSet<ConceptId>, OntographError> {
        let mut ids = BTreeSet::new();
        for ty in types {
            ids.extend(self.sub_ids(ty.id())?);
        }
        Ok(ids)
    }

    fn owned_attributes(
        &mut self,
        owner: &ConceptId,
        allowed: Option<&BTreeSet<ConceptId>>,
    ) -> Result<Vec<Attribute>, OntographError> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        for (_, vertex) in self.attribute_links(owner)? {
            let Some(id) = self.resolve_id(ElementRef::Vertex(vertex))? else {
                continue;
            };
            if self.live(&id)?.kind() != ConceptKind::Attribute || !seen.insert(id.clone()) {
                continue;
            }
            if let Some(allowed) = allowed {
                if !allowed.contains(&self.thing_type_id(&id)?) {
                    continue;
                }
            }
            out.push(Attribute(id));
        }
        Ok(out)
    }

    /// Attributes the thing owns, optionally only those of the given types
    /// (and their subtypes).
    pub fn attributes<T: ThingHandle>(
        &mut self,
        thing: &T,
        types: &[AttributeType],
    ) -> Result<Vec<Attribute>, OntographError> {
        let allowed = if types.is_empty() {
            None
        } else {
            Some(self.type_filter(types)?)
        };
        self.owned_attributes(thing.concept_id(), allowed.as_ref())
    }

    /// Attributes the thing owns whose type its type declares as a key.
    pub fn keys<T: ThingHandle>(
        &mut self,
        thing: &T,
        types: &[AttributeType],
    ) -> Result<Vec<Attribute>, OntographError> {
        let type_id = self.thing_type_id(thing.concept_id())?;
        let key_types: Vec<AttributeType> = self
            .implicit_attribute_types(&type_id, true)?
            .into_iter()
            .map(AttributeType)
            .collect();
        let mut allowed = self.type_filter(&key_types)?;
        if !types.is_empty() {
            let requested = self.type_filter(types)?;
            allowed.retain(|id| requested.contains(id));
        }
        self.owned_attributes(thing.concept_id(), Some(&allowed))
    }

    /// Relationships the thing plays a role in, in either form, optionally
    /// only through the given roles (and their subroles).
    pub fn relationships<T: ThingHandle>(
        &mut self,
        thing: &T,
        roles: &[Role],
    ) -> Result<Vec<Relationship>, OntographError> {
        let mut allowed = BTreeSet::new();
        for role in roles {
            for sub in self.sub_ids(role.id())? {
                allowed.insert(self.schema_label_id(&sub)?.0 as i64);
            }
        }
        let permits = |label_id: Option<i64>| {
            roles.is_empty() || label_id.is_some_and(|n| allowed.contains(&n))
        };

        let ElementRef::Vertex(vertex) = self.live(thing.concept_id())?.element() else {
            return Ok(Vec::new());
        };
        let mut elements = Vec::new();
        for edge in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::RolePlayer.as_str()))?
        {
            if permits(edge.long(PropertyKey::RoleLabelId)) {
                elements.push(ElementRef::Vertex(edge.from));
            }
        }
        for edge in self
            .store
            .edges(vertex, Direction::Both, Some(EdgeLabel::Attribute.as_str()))?
        {
            let role = if edge.from == vertex {
                edge.long(PropertyKey::RelationshipRoleOwnerLabelId)
            } else {
                edge.long(PropertyKey::RelationshipRoleValueLabelId)
            };
            if permits(role) {
                elements.push(ElementRef::Edge(edge.id));
            }
        }

        let mut out = Vec::new();
        for element in elements {
            if let Some(relationship) = self.resolve_as::<Relationship>(element)? {
                if !out.contains(&relationship) {
                    out.push(relationship);
                }
            }
        }
        Ok(out)
    }

    /// Roles the thing currently plays.
    pub fn roles_played<T: ThingHandle>(&mut self, thing: &T) -> Result<Vec<Role>, OntographError> {
        let ElementRef::Vertex(vertex) = self.live(thing.concept_id())?.element() else {
            return Ok(Vec::new());
        };
        let mut label_ids = BTreeSet::new();
        for edge in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::RolePlayer.as_str()))?
        {
            label_ids.extend(edge.long(PropertyKey::RoleLabelId));
        }
        for edge in self
            .store
            .edges(vertex, Direction::Both, Some(EdgeLabel::Attribute.as_str()))?
        {
            label_ids.extend(if edge.from == vertex {
                edge.long(PropertyKey::RelationshipRoleOwnerLabelId)
            } else {
                edge.long(PropertyKey::RelationshipRoleValueLabelId)
            });
        }

        let mut roles = Vec::new();
        for label_id in label_ids.into_iter().filter(|n| *n >= 0) {
            if let Some(id) = self.schema_by_label_id(LabelId(label_id as u64))? {
                if let Some(role) = self.get::<Role>(&id)? {
                    roles.push(role);
                }
            }
        }
        Ok(roles)
    }

    pub(crate) fn owner_ids(&mut self, attribute: &ConceptId) -> Result<Vec<ConceptId>, OntographError> {
        let ElementRef::Vertex(vertex) = self.live(attribute)?.element() else {
            return Ok(Vec::new());
        };
        let mut owners = Vec::new();
        for edge in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::Attribute.as_str()))?
        {
            owners.push(ElementRef::Vertex(edge.from));
        }
        for casting in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::RolePlayer.as_str()))?
        {
            if !self.is_implicit_role(&casting, ImplicitRole::Value)? {
                continue;
            }
            for sibling in self.store.edges(
                casting.from,
                Direction::Out,
                Some(EdgeLabel::RolePlayer.as_str()),
            )? {
                if sibling.to != vertex && self.is_implicit_role(&sibling, ImplicitRole::Owner)? {
                    owners.push(ElementRef::Vertex(sibling.to));
                }
            }
        }

        let mut out = Vec::new();
        for element in owners {
            if let Some(id) = self.resolve_id(element)? {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    /// Things owning the attribute.
    pub fn owners(&mut self, attribute: &Attribute) -> Result<Vec<Thing>, OntographError> {
        let ids = self.owner_ids(attribute.id())?;
        self.narrow_all(ids)
    }

    // =========================================================================
    // DELETION
    // =========================================================================

    /// Delete a thing and everything that only existed to connect it.
    ///
    /// Castings of the thing disappear with its vertex. A reified relationship
    /// it played in is deleted as well when it is implicit or has no role
    /// players left.
    pub fn delete_thing<T: ThingHandle>(&mut self, thing: &T) -> Result<(), OntographError> {
        self.delete_thing_id(thing.concept_id())
    }

    pub(crate) fn delete_thing_id(&mut self, id: &ConceptId) -> Result<(), OntographError> {
        let element = self.live(id)?.element();
        let ElementRef::Vertex(vertex) = element else {
            if let Some(edge) = self.store.edge(element.id())? {
                if let Some(owner) = self.resolve_id(ElementRef::Vertex(edge.from))? {
                    self.tracking.things.insert(owner);
                }
            }
            return self.delete_concept_element(id);
        };

        let mut relationships = Vec::new();
        for edge in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::RolePlayer.as_str()))?
        {
            if let Some(relationship) = self.resolve_id(ElementRef::Vertex(edge.from))? {
                if !relationships.contains(&relationship) {
                    relationships.push(relationship);
                }
            }
        }
        for edge in self
            .store
            .edges(vertex, Direction::Both, Some(EdgeLabel::Attribute.as_str()))?
        {
            self.evict(&ConceptId::from_element(ElementRef::Edge(edge.id)));
            if edge.to == vertex {
                if let Some(owner) = self.resolve_id(ElementRef::Vertex(edge.from))? {
                    self.tracking.things.insert(owner);
                }
            }
        }

        self.delete_concept_element(id)?;

        for relationship in relationships {
            if !self.contains(&relationship)? {
                continue;
            }
            let type_id = self.thing_type_id(&relationship)?;
            let implicit = self.live(&type_id)?.schema().is_some_and(|s| s.is_implicit);
            if implicit || self.casting_count(&relationship)? == 0 {
                self.delete_thing_id(&relationship)?;
            } else {
                self.tracking.relationships_to_clean.insert(relationship);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ImplicitRole {
    Owner,
    Value,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::concept::{Thing, Type};
    use crate::graph::GraphStore;
    use crate::session::Session;
    use crate::types::{DataType, OntographError};

    #[test]
    fn type_of_follows_the_shard() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("type");
        let alice = tx.add_entity(&person).expect("alice");
        assert_eq!(tx.type_of(&alice).expect("type"), Type::Entity(person.clone()));
        tx.commit().expect("commit");

        let mut tx = session.transaction().expect("tx");
        assert_eq!(tx.type_of(&alice).expect("type"), Type::Entity(person));
    }

    #[test]
    fn attaching_requires_the_has_declaration() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");

        let err = tx.has_attribute(&alice, &value).expect_err("not declared");
        assert!(matches!(err, OntographError::HasNotAllowed { .. }));
        assert!(tx.attributes(&alice, &[]).expect("attributes").is_empty());
    }

    #[test]
    fn attached_attributes_are_navigable_both_ways() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        let age = tx.put_attribute_type("age", DataType::Long).expect("age");
        tx.has(&person, &name).expect("has name");
        tx.has(&person, &age).expect("has age");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("name value");
        let years = tx.put_attribute(&age, 30_i64).expect("age value");

        let link = tx.has_attribute(&alice, &value).expect("attach");
        tx.has_attribute(&alice, &years).expect("attach age");
        assert!(!tx.is_reified(&link).expect("form"));
        assert_eq!(
            tx.attributes(&alice, &[name.clone()]).expect("names"),
            vec![value.clone()]
        );
        assert_eq!(tx.attributes(&alice, &[]).expect("all").len(), 2);
        assert_eq!(
            tx.owners(&value).expect("owners"),
            vec![Thing::Entity(alice.clone())]
        );
        let rel = tx.get_relationship_type("@has-name").expect("get").expect("rt");
        assert_eq!(tx.type_of(&link).expect("type"), Type::Relationship(rel));
        assert_eq!(tx.relationships(&alice, &[]).expect("rels").len(), 2);
        assert_eq!(tx.roles_played(&alice).expect("roles").len(), 2);
    }

    #[test]
    fn attaching_twice_reuses_the_link() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let first = tx.has_attribute(&alice, &value).expect("first");
        let second = tx.has_attribute(&alice, &value).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn attaching_again_reuses_a_promoted_link() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let witness = tx.put_role("witness").expect("witness");
        let has_name = tx.get_relationship_type("@has-name").expect("get").expect("rt");
        tx.relates(&has_name, &witness).expect("relates");
        tx.plays(&person, &witness).expect("plays");
        let alice = tx.add_entity(&person).expect("alice");
        let carol = tx.add_entity(&person).expect("carol");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");
        tx.add_role_player(&link, &witness, &carol).expect("promote");
        let edges_before = tx.store().edge_count().expect("edges");

        let again = tx.has_attribute(&alice, &value).expect("attach again");
        assert_eq!(again, link);
        assert_eq!(tx.store().edge_count().expect("edges"), edges_before);
        assert_eq!(tx.relationships(&alice, &[]).expect("rels"), vec![link]);
        assert_eq!(tx.attributes(&alice, &[]).expect("attributes"), vec![value]);
    }

    #[test]
    fn unhas_attribute_removes_the_link() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");

        tx.unhas_attribute(&alice, &value).expect("detach");
        assert!(tx.attributes(&alice, &[]).expect("attributes").is_empty());
        assert!(!tx.contains(link.id()).expect("contains"));
        assert!(tx.contains(value.id()).expect("attribute survives"));
    }

    #[test]
    fn deleting_an_attribute_drops_its_links() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");

        tx.delete_thing(&value).expect("delete");
        assert!(!tx.contains(link.id()).expect("contains"));
        assert!(tx.attributes(&alice, &[]).expect("attributes").is_empty());
        assert!(tx.get_attribute(&name, "Alice").expect("get").is_none());
    }
}
