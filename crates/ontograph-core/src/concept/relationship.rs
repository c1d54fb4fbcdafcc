//! # Relationship Reification
//!
//! A relationship has one of two physical forms:
//!
//! - **Edge**: a single ATTRIBUTE edge from owner to value, carrying the
//!   relationship type and both role label ids. Implicit has/key attachments
//!   start here.
//! - **Reified**: a RELATIONSHIP vertex with one ROLE_PLAYER edge per casting.
//!   Explicitly created relationships start here.
//!
//! The only transition is Edge -> Reified, taken the first time a role
//! player outside the two existing pairs is added, or one of the two
//! castings is removed. The promoted vertex keeps
//! the relationship's id through a unique `Id` property.

use super::{ConceptState, Relationship, RelationshipType, Role, Thing, ThingHandle};
use crate::graph::{Claim, GraphStore};
use crate::schema::{BaseType, EdgeLabel, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{ConceptId, Direction, ElementId, ElementRef, LabelId, OntographError, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STRUCTURE
// =============================================================================

/// An edge-form relationship: exactly two castings on one ATTRIBUTE edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRelationship {
    pub edge: ElementId,
    pub relationship_type: LabelId,
    pub owner_role: LabelId,
    pub owner: ElementId,
    pub value_role: LabelId,
    pub value: ElementId,
}

impl EdgeRelationship {
    /// The reified structure that replaces this edge once promoted.
    #[must_use]
    pub const fn promote(self, vertex: ElementId) -> ReifiedRelationship {
        ReifiedRelationship { vertex }
    }

    /// Both castings as (role, player) pairs.
    #[must_use]
    pub const fn pairs(&self) -> [(LabelId, ElementId); 2] {
        [(self.owner_role, self.owner), (self.value_role, self.value)]
    }
}

/// A reified relationship: a vertex with ROLE_PLAYER edges to its players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReifiedRelationship {
    pub vertex: ElementId,
}

/// Physical form of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipStructure {
    Edge(EdgeRelationship),
    Reified(ReifiedRelationship),
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    pub(crate) fn structure(
        &mut self,
        id: &ConceptId,
    ) -> Result<RelationshipStructure, OntographError> {
        let concept = self.live(id)?;
        match &concept.state {
            ConceptState::Relationship(_, structure) => Ok(*structure),
            _ => Err(OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "relationship",
                actual: concept.kind().name(),
            }),
        }
    }

    /// Current physical form of a relationship.
    pub fn relationship_structure(
        &mut self,
        relationship: &Relationship,
    ) -> Result<RelationshipStructure, OntographError> {
        self.structure(relationship.id())
    }

    pub fn is_reified(&mut self, relationship: &Relationship) -> Result<bool, OntographError> {
        Ok(matches!(
            self.structure(relationship.id())?,
            RelationshipStructure::Reified(_)
        ))
    }

    // =========================================================================
    // PROMOTION
    // =========================================================================

    /// Promote an edge-form relationship to a vertex, returning the vertex.
    ///
    /// The id, the relationship type, the inferred flag and both castings are
    /// carried over. Already reified relationships are returned unchanged.
    pub(crate) fn reify(&mut self, id: &ConceptId) -> Result<ElementId, OntographError> {
        let edge = match self.structure(id)? {
            RelationshipStructure::Reified(reified) => return Ok(reified.vertex),
            RelationshipStructure::Edge(edge) => edge,
        };
        let type_id = self.thing_type_id(id)?;
        let shard = self.current_shard_of(&type_id)?;
        let inferred = self.live(id)?.thing_mut().is_some_and(|t| t.is_inferred);

        let vertex = self.store.add_vertex(BaseType::Relationship.as_str())?;
        let element = ElementRef::Vertex(vertex);
        if let Claim::Taken(holder) = self.store.claim_unique(vertex, PropertyKey::Id, id.as_str())? {
            return Err(OntographError::CorruptedElement {
                element: ElementRef::Vertex(holder),
                property: PropertyKey::Id.as_str(),
            });
        }
        self.store.add_edge(vertex, shard, EdgeLabel::Isa.as_str())?;
        self.store.set_property(
            element,
            PropertyKey::ThingTypeLabelId,
            edge.relationship_type.to_value(),
        )?;
        if inferred {
            self.store
                .set_property(element, PropertyKey::IsInferred, Value::Boolean(true))?;
        }
        for (role, player) in edge.pairs() {
            self.add_edge_with(
                vertex,
                player,
                EdgeLabel::RolePlayer,
                &[
                    (PropertyKey::RelationshipTypeLabelId, edge.relationship_type.to_value()),
                    (PropertyKey::RoleLabelId, role.to_value()),
                ],
            )?;
        }
        self.store.delete_edge(edge.edge)?;

        let concept = self.live(id)?;
        concept.set_element(element);
        if let ConceptState::Relationship(_, structure) = &mut concept.state {
            *structure = RelationshipStructure::Reified(edge.promote(vertex));
        }
        tracing::debug!(relationship = %id, %vertex, "reified edge relationship");
        Ok(vertex)
    }

    // =========================================================================
    // ROLE PLAYERS
    // =========================================================================

    /// Make `player` play `role` in `relationship`.
    ///
    /// Idempotent. An edge-form relationship is reified first unless the pair
    /// is already one of its two castings.
    pub fn add_role_player<T: ThingHandle>(
        &mut self,
        relationship: &Relationship,
        role: &Role,
        player: &T,
    ) -> Result<(), OntographError> {
        let (relationship_id, role_id, player_id) =
            (relationship.id(), role.id(), player.concept_id());
        self.reject_meta(role_id)?;
        let role_label = self.schema_label_id(role_id)?;
        let player_element = self.live(player_id)?.element();

        if let RelationshipStructure::Edge(edge) = self.structure(relationship_id)? {
            if player_element.is_vertex()
                && edge.pairs().contains(&(role_label, player_element.id()))
            {
                return Ok(());
            }
        }

        let vertex = self.reify(relationship_id)?;
        let player_vertex = self.thing_vertex(player_id)?;
        let exists = self
            .store
            .edges_by_property(
                vertex,
                Direction::Out,
                EdgeLabel::RolePlayer.as_str(),
                PropertyKey::RoleLabelId,
                role_label.0 as i64,
            )?
            .iter()
            .any(|e| e.to == player_vertex);
        if !exists {
            let type_id = self.thing_type_id(relationship_id)?;
            let type_label = self.schema_label_id(&type_id)?;
            self.add_edge_with(
                vertex,
                player_vertex,
                EdgeLabel::RolePlayer,
                &[
                    (PropertyKey::RelationshipTypeLabelId, type_label.to_value()),
                    (PropertyKey::RoleLabelId, role_label.to_value()),
                ],
            )?;
        }
        self.tracking.castings.insert((
            relationship_id.clone(),
            role_id.clone(),
            player_id.clone(),
        ));
        Ok(())
    }

    /// Stop `player` from playing `role` in `relationship`. No-op if it does not.
    ///
    /// Removing one of an edge-form relationship's two castings reifies it
    /// first, keeping the other casting. A relationship left without role
    /// players is deleted at commit.
    pub fn remove_role_player<T: ThingHandle>(
        &mut self,
        relationship: &Relationship,
        role: &Role,
        player: &T,
    ) -> Result<(), OntographError> {
        let (relationship_id, role_id, player_id) =
            (relationship.id(), role.id(), player.concept_id());
        let role_label = self.schema_label_id(role_id)?;
        let player_element = self.live(player_id)?.element();

        // Only a casting the edge actually carries forces promotion.
        if let RelationshipStructure::Edge(edge) = self.structure(relationship_id)? {
            if !player_element.is_vertex()
                || !edge.pairs().contains(&(role_label, player_element.id()))
            {
                return Ok(());
            }
        }

        let vertex = self.reify(relationship_id)?;
        let doomed: Vec<ElementId> = self
            .store
            .edges_by_property(
                vertex,
                Direction::Out,
                EdgeLabel::RolePlayer.as_str(),
                PropertyKey::RoleLabelId,
                role_label.0 as i64,
            )?
            .into_iter()
            .filter(|e| e.to == player_element.id())
            .map(|e| e.id)
            .collect();
        for edge in doomed {
            self.store.delete_edge(edge)?;
        }

        self.tracking.castings.remove(&(
            relationship_id.clone(),
            role_id.clone(),
            player_id.clone(),
        ));
        self.tracking.things.insert(player_id.clone());
        self.tracking
            .relationships_to_clean
            .insert(relationship_id.clone());
        Ok(())
    }

    /// Every role the relationship's type relates, mapped to its players.
    ///
    /// Roles nobody plays map to an empty set.
    pub fn all_role_players(
        &mut self,
        relationship: &Relationship,
    ) -> Result<BTreeMap<Role, BTreeSet<Thing>>, OntographError> {
        let type_id = self.thing_type_id(relationship.id())?;
        let relationship_type = self
            .get::<RelationshipType>(&type_id)?
            .ok_or(OntographError::ConceptNotFound(type_id))?;
        let mut players: BTreeMap<Role, BTreeSet<Thing>> = self
            .roles(&relationship_type)?
            .into_iter()
            .map(|role| (role, BTreeSet::new()))
            .collect();
        for casting in self.castings(relationship, &[])? {
            let (role, player) = casting.into_role_and_player();
            players.entry(role).or_default().insert(player);
        }
        Ok(players)
    }

    /// Players of the given roles, or of every role when none are given.
    pub fn role_players(
        &mut self,
        relationship: &Relationship,
        roles: &[Role],
    ) -> Result<Vec<Thing>, OntographError> {
        let mut out = Vec::new();
        for casting in self.castings(relationship, roles)? {
            let player = casting.player().clone();
            if !out.contains(&player) {
                out.push(player);
            }
        }
        Ok(out)
    }

    /// Delete the tracked relationships that ended up with no role players.
    pub(crate) fn clean_up_relationships(&mut self) -> Result<(), OntographError> {
        let pending = std::mem::take(&mut self.tracking.relationships_to_clean);
        for id in pending {
            if self.contains(&id)? && self.casting_count(&id)? == 0 {
                tracing::debug!(relationship = %id, "deleting relationship without role players");
                self.delete_thing_id(&id)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::concept::{RelationshipStructure, Thing};
    use crate::session::Session;
    use crate::types::{DataType, OntographError};
    use std::collections::BTreeSet;

    #[test]
    fn promotion_keeps_id_and_castings() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let witness = tx.put_role("witness").expect("role");
        let rel_type = tx.get_relationship_type("@has-name").expect("get").expect("rt");
        tx.relates(&rel_type, &witness).expect("relates");
        tx.plays(&person, &witness).expect("plays");

        let alice = tx.add_entity(&person).expect("alice");
        let bob = tx.add_entity(&person).expect("bob");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");
        let before = tx.relationship_structure(&link).expect("structure");
        assert!(matches!(before, RelationshipStructure::Edge(_)));

        tx.add_role_player(&link, &witness, &bob).expect("add");
        assert!(tx.is_reified(&link).expect("form"));
        let players = tx.all_role_players(&link).expect("players");
        let owner = tx.get_role("@has-name-owner").expect("get").expect("owner");
        let value_role = tx.get_role("@has-name-value").expect("get").expect("value");
        assert_eq!(players[&owner], BTreeSet::from([Thing::Entity(alice.clone())]));
        assert_eq!(players[&value_role], BTreeSet::from([Thing::Attribute(value.clone())]));
        assert_eq!(players[&witness], BTreeSet::from([Thing::Entity(bob)]));
        assert_eq!(tx.attributes(&alice, &[]).expect("attributes"), vec![value]);
    }

    #[test]
    fn re_adding_an_existing_pair_keeps_edge_form() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");

        let owner = tx.get_role("@has-name-owner").expect("get").expect("owner");
        tx.add_role_player(&link, &owner, &alice).expect("same pair");
        assert!(!tx.is_reified(&link).expect("form"));
    }

    #[test]
    fn removing_an_absent_pair_keeps_edge_form() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let bob = tx.add_entity(&person).expect("bob");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");

        let owner = tx.get_role("@has-name-owner").expect("get").expect("owner");
        let value_role = tx.get_role("@has-name-value").expect("get").expect("value");
        tx.remove_role_player(&link, &owner, &bob).expect("absent player");
        tx.remove_role_player(&link, &value_role, &alice).expect("absent role");

        assert!(!tx.is_reified(&link).expect("form"));
        assert_eq!(tx.castings(&link, &[]).expect("castings").len(), 2);
        assert_eq!(tx.attributes(&alice, &[]).expect("attributes"), vec![value]);
    }

    #[test]
    fn removing_an_edge_casting_reifies_the_rest() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let name = tx.put_attribute_type("name", DataType::String).expect("name");
        tx.has(&person, &name).expect("has");
        let alice = tx.add_entity(&person).expect("alice");
        let value = tx.put_attribute(&name, "Alice").expect("value");
        let link = tx.has_attribute(&alice, &value).expect("attach");
        let id_before = link.id().clone();

        let owner = tx.get_role("@has-name-owner").expect("get").expect("owner");
        let value_role = tx.get_role("@has-name-value").expect("get").expect("value");
        tx.remove_role_player(&link, &owner, &alice).expect("remove owner");

        assert!(tx.is_reified(&link).expect("form"));
        assert_eq!(link.id(), &id_before);
        let castings = tx.castings(&link, &[]).expect("castings");
        assert_eq!(castings.len(), 1);
        assert_eq!(castings[0].role(), &value_role);
        assert_eq!(castings[0].player(), &Thing::Attribute(value.clone()));
        assert!(tx.attributes(&alice, &[]).expect("attributes").is_empty());
        assert!(tx.owners(&value).expect("owners").is_empty());
    }

    #[test]
    fn role_players_are_idempotent_and_removable() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let marriage = tx.put_relationship_type("marriage").expect("rt");
        let spouse = tx.put_role("spouse").expect("role");
        tx.relates(&marriage, &spouse).expect("relates");
        tx.plays(&person, &spouse).expect("plays");
        let alice = tx.add_entity(&person).expect("alice");
        let wedding = tx.add_relationship(&marriage).expect("wedding");

        tx.add_role_player(&wedding, &spouse, &alice).expect("first");
        tx.add_role_player(&wedding, &spouse, &alice).expect("second");
        assert_eq!(tx.castings(&wedding, &[]).expect("castings").len(), 1);
        assert_eq!(
            tx.role_players(&wedding, &[spouse.clone()]).expect("players"),
            vec![Thing::Entity(alice.clone())]
        );

        tx.remove_role_player(&wedding, &spouse, &alice).expect("remove");
        tx.remove_role_player(&wedding, &spouse, &alice).expect("absent is a no-op");
        assert!(tx.castings(&wedding, &[]).expect("castings").is_empty());
        let players = tx.all_role_players(&wedding).expect("players");
        assert!(players[&spouse].is_empty());
    }

    #[test]
    fn emptied_relationships_are_deleted_at_commit() {
        let mut session = Session::in_memory().expect("session");
        let wedding_id;
        {
            let mut tx = session.transaction().expect("tx");
            let person = tx.put_entity_type("person").expect("person");
            let marriage = tx.put_relationship_type("marriage").expect("rt");
            let spouse = tx.put_role("spouse").expect("role");
            tx.relates(&marriage, &spouse).expect("relates");
            tx.plays(&person, &spouse).expect("plays");
            let alice = tx.add_entity(&person).expect("alice");
            let wedding = tx.add_relationship(&marriage).expect("wedding");
            tx.add_role_player(&wedding, &spouse, &alice).expect("add");
            tx.remove_role_player(&wedding, &spouse, &alice).expect("remove");
            wedding_id = wedding.id().clone();
            tx.commit().expect("commit");
        }
        let mut tx = session.transaction().expect("tx");
        assert!(tx.concept(&wedding_id).expect("lookup").is_none());
    }

    #[test]
    fn meta_role_cannot_be_played() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let marriage = tx.put_relationship_type("marriage").expect("rt");
        let alice = tx.add_entity(&person).expect("alice");
        let wedding = tx.add_relationship(&marriage).expect("wedding");
        let meta_role = tx.get_role("role").expect("get").expect("meta role");
        assert!(matches!(
            tx.add_role_player(&wedding, &meta_role, &alice),
            Err(OntographError::MetaTypeImmutable(_))
        ));
    }
}
