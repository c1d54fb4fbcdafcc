//! Relationship types: the roles they relate and their instances.

use super::{ConceptStream, Relationship, RelationshipType, Role, SetSlot};
use crate::cache::SetDelta;
use crate::graph::GraphStore;
use crate::schema::{BaseType, EdgeLabel};
use crate::transaction::Transaction;
use crate::types::{ConceptId, OntographError};

impl<'s, S: GraphStore> Transaction<'s, S> {
    pub(crate) fn relate(
        &mut self,
        relationship_type: &ConceptId,
        role: &ConceptId,
    ) -> Result<(), OntographError> {
        let from = self.live(relationship_type)?.element().id();
        let to = self.live(role)?.element().id();
        self.put_edge(from, to, EdgeLabel::Relates)?;
        self.change_session_set(
            relationship_type,
            SetSlot::Relates,
            SetDelta::Insert(role.clone()),
        )?;
        self.change_session_set(
            role,
            SetSlot::RelationshipTypes,
            SetDelta::Insert(relationship_type.clone()),
        )?;
        self.tracking.roles.insert(role.clone());
        self.tracking
            .relationship_types
            .insert(relationship_type.clone());
        Ok(())
    }

    pub(crate) fn unrelate_raw(
        &mut self,
        relationship_type: &ConceptId,
        role: &ConceptId,
    ) -> Result<(), OntographError> {
        let from = self.live(relationship_type)?.element().id();
        let to = self.live(role)?.element().id();
        self.delete_edges(from, EdgeLabel::Relates, Some(to))?;
        self.change_session_set(
            relationship_type,
            SetSlot::Relates,
            SetDelta::Remove(role.clone()),
        )?;
        self.change_session_set(
            role,
            SetSlot::RelationshipTypes,
            SetDelta::Remove(relationship_type.clone()),
        )?;
        self.tracking.roles.insert(role.clone());
        self.tracking
            .relationship_types
            .insert(relationship_type.clone());
        Ok(())
    }

    /// Declare that relationships of `relationship_type` may have `role` players.
    pub fn relates(
        &mut self,
        relationship_type: &RelationshipType,
        role: &Role,
    ) -> Result<(), OntographError> {
        self.reject_meta(relationship_type.id())?;
        self.reject_meta(role.id())?;
        self.relate(relationship_type.id(), role.id())
    }

    pub fn unrelate(
        &mut self,
        relationship_type: &RelationshipType,
        role: &Role,
    ) -> Result<(), OntographError> {
        self.reject_meta(relationship_type.id())?;
        self.unrelate_raw(relationship_type.id(), role.id())
    }

    /// Roles the relationship type relates directly.
    pub fn roles(&mut self, relationship_type: &RelationshipType) -> Result<Vec<Role>, OntographError> {
        let ids = self.session_set(relationship_type.id(), SetSlot::Relates)?;
        self.narrow_all(ids.into_iter().collect())
    }

    /// Create a relationship. It starts reified and has no role players.
    pub fn add_relationship(
        &mut self,
        relationship_type: &RelationshipType,
    ) -> Result<Relationship, OntographError> {
        self.new_relationship(relationship_type.id(), false)
    }

    /// Create a relationship derived by reasoning.
    pub fn add_relationship_inferred(
        &mut self,
        relationship_type: &RelationshipType,
    ) -> Result<Relationship, OntographError> {
        self.new_relationship(relationship_type.id(), true)
    }

    fn new_relationship(
        &mut self,
        relationship_type: &ConceptId,
        inferred: bool,
    ) -> Result<Relationship, OntographError> {
        let id = self.add_instance(relationship_type, BaseType::Relationship, inferred)?;
        self.tracking.relationships_to_clean.insert(id.clone());
        Ok(Relationship(id))
    }

    /// Relationships of the type and its subtypes, in both physical forms.
    pub fn relationships_of(
        &mut self,
        relationship_type: &RelationshipType,
    ) -> Result<ConceptStream<'_, 's, S, Relationship>, OntographError> {
        let elements = self.instance_elements(relationship_type.id())?;
        Ok(self.stream_of::<Relationship>(elements))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::concept::Relationship;
    use crate::session::Session;
    use crate::types::OntographError;

    #[test]
    fn relates_is_visible_from_both_sides() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let marriage = tx.put_relationship_type("marriage").expect("rt");
        let spouse = tx.put_role("spouse").expect("role");
        tx.relates(&marriage, &spouse).expect("relates");
        assert_eq!(tx.roles(&marriage).expect("roles"), vec![spouse.clone()]);
        assert_eq!(
            tx.relationship_types(&spouse).expect("rts"),
            vec![marriage.clone()]
        );

        tx.unrelate(&marriage, &spouse).expect("unrelate");
        assert!(tx.roles(&marriage).expect("roles").is_empty());
        assert!(tx.relationship_types(&spouse).expect("rts").is_empty());
    }

    #[test]
    fn relates_survives_into_the_next_transaction() {
        let mut session = Session::in_memory().expect("session");
        {
            let mut tx = session.transaction().expect("tx");
            let marriage = tx.put_relationship_type("marriage").expect("rt");
            let spouse = tx.put_role("spouse").expect("role");
            tx.relates(&marriage, &spouse).expect("relates");
            assert_eq!(tx.roles(&marriage).expect("roles").len(), 1);
            tx.commit().expect("commit");
        }
        let mut tx = session.transaction().expect("tx");
        let marriage = tx
            .get_relationship_type("marriage")
            .expect("get")
            .expect("rt");
        assert_eq!(tx.roles(&marriage).expect("roles").len(), 1);
    }

    #[test]
    fn new_relationships_are_listed() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let marriage = tx.put_relationship_type("marriage").expect("rt");
        let first = tx.add_relationship(&marriage).expect("first");
        let second = tx.add_relationship_inferred(&marriage).expect("second");
        assert!(tx.is_inferred(&second).expect("inferred"));
        assert!(tx.is_reified(&first).expect("reified"));

        let all: Vec<Relationship> = tx
            .relationships_of(&marriage)
            .expect("stream")
            .collect::<Result<_, _>>()
            .expect("relationships");
        assert_eq!(all, vec![first, second]);
    }

    #[test]
    fn meta_relationship_type_is_immutable() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let meta = tx
            .get_relationship_type("relationship")
            .expect("get")
            .expect("meta");
        let role = tx.put_role("member").expect("role");
        assert!(matches!(
            tx.relates(&meta, &role),
            Err(OntographError::MetaTypeImmutable(_))
        ));
        assert!(matches!(
            tx.add_relationship(&meta),
            Err(OntographError::MetaTypeImmutable(_))
        ));
    }
}
