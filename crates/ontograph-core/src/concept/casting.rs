//! Castings: one role played by one thing in one relationship.
//!
//! Castings are read from whichever form the relationship has. Reified
//! relationships serve role-filtered reads from the role label index on
//! their ROLE_PLAYER edges.

use super::{ConceptHandle, Relationship, RelationshipStructure, Role, Thing, ThingHandle};
use crate::graph::GraphStore;
use crate::schema::{EdgeLabel, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{ConceptId, Direction, ElementId, ElementRef, LabelId, OntographError};

/// A (relationship, role, player) triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Casting {
    relationship: Relationship,
    role: Role,
    player: Thing,
}

impl Casting {
    #[must_use]
    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    #[must_use]
    pub fn player(&self) -> &Thing {
        &self.player
    }

    pub(crate) fn into_role_and_player(self) -> (Role, Thing) {
        (self.role, self.player)
    }
}

fn role_label(raw: Option<i64>) -> Option<LabelId> {
    raw.filter(|n| *n >= 0).map(|n| LabelId(n as u64))
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    /// (role, player vertex) pairs of a relationship, optionally one role only.
    fn raw_castings(
        &mut self,
        id: &ConceptId,
        role: Option<LabelId>,
    ) -> Result<Vec<(LabelId, ElementId)>, OntographError> {
        Ok(match self.structure(id)? {
            RelationshipStructure::Edge(edge) => edge
                .pairs()
                .into_iter()
                .filter(|(r, _)| role.is_none_or(|wanted| *r == wanted))
                .collect(),
            RelationshipStructure::Reified(reified) => {
                let edges = match role {
                    Some(wanted) => self.store.edges_by_property(
                        reified.vertex,
                        Direction::Out,
                        EdgeLabel::RolePlayer.as_str(),
                        PropertyKey::RoleLabelId,
                        wanted.0 as i64,
                    )?,
                    None => self.store.edges(
                        reified.vertex,
                        Direction::Out,
                        Some(EdgeLabel::RolePlayer.as_str()),
                    )?,
                };
                edges
                    .into_iter()
                    .filter_map(|e| role_label(e.long(PropertyKey::RoleLabelId)).map(|r| (r, e.to)))
                    .collect()
            }
        })
    }

    pub(crate) fn casting_count(&mut self, id: &ConceptId) -> Result<usize, OntographError> {
        Ok(self.raw_castings(id, None)?.len())
    }

    fn resolve_casting(
        &mut self,
        relationship: &ConceptId,
        role: LabelId,
        player: ElementRef,
    ) -> Result<Option<Casting>, OntographError> {
        let Some(role_id) = self.schema_by_label_id(role)? else {
            return Ok(None);
        };
        let Some(role) = self.get::<Role>(&role_id)? else {
            return Ok(None);
        };
        let Some(player) = self.resolve_as::<Thing>(player)? else {
            tracing::warn!(element = %player, "skipping role player that is not a thing");
            return Ok(None);
        };
        Ok(Some(Casting {
            relationship: Relationship(relationship.clone()),
            role,
            player,
        }))
    }

    /// Castings of a relationship, all of them or only those of `roles`.
    pub fn castings(
        &mut self,
        relationship: &Relationship,
        roles: &[Role],
    ) -> Result<Vec<Casting>, OntographError> {
        let id = relationship.id();
        let mut raw = Vec::new();
        if roles.is_empty() {
            raw = self.raw_castings(id, None)?;
        } else {
            for role in roles {
                let label_id = self.schema_label_id(role.id())?;
                raw.extend(self.raw_castings(id, Some(label_id))?);
            }
        }

        let mut out = Vec::with_capacity(raw.len());
        for (role, player) in raw {
            if let Some(casting) = self.resolve_casting(id, role, ElementRef::Vertex(player))? {
                out.push(casting);
            }
        }
        Ok(out)
    }

    /// Castings in which the thing is the player.
    pub fn castings_of<T: ThingHandle>(&mut self, thing: &T) -> Result<Vec<Casting>, OntographError> {
        self.castings_of_id(thing.concept_id())
    }

    fn castings_of_id(&mut self, id: &ConceptId) -> Result<Vec<Casting>, OntographError> {
        let element = self.live(id)?.element();
        let ElementRef::Vertex(vertex) = element else {
            return Ok(Vec::new());
        };

        let mut raw = Vec::new();
        for edge in self
            .store
            .edges(vertex, Direction::In, Some(EdgeLabel::RolePlayer.as_str()))?
        {
            if let Some(role) = role_label(edge.long(PropertyKey::RoleLabelId)) {
                raw.push((ElementRef::Vertex(edge.from), role));
            }
        }
        for edge in self
            .store
            .edges(vertex, Direction::Both, Some(EdgeLabel::Attribute.as_str()))?
        {
            let key = if edge.from == vertex {
                PropertyKey::RelationshipRoleOwnerLabelId
            } else {
                PropertyKey::RelationshipRoleValueLabelId
            };
            if let Some(role) = role_label(edge.long(key)) {
                raw.push((ElementRef::Edge(edge.id), role));
            }
        }

        let mut out = Vec::with_capacity(raw.len());
        for (relationship, role) in raw {
            let Some(relationship) = self.resolve_id(relationship)? else {
                continue;
            };
            if let Some(casting) = self.resolve_casting(&relationship, role, element)? {
                out.push(casting);
            }
        }
        Ok(out)
    }

    /// Register every casting of a thing for commit-time validation.
    pub(crate) fn track_castings_of(&mut self, id: &ConceptId) -> Result<(), OntographError> {
        for casting in self.castings_of_id(id)? {
            self.tracking.castings.insert((
                casting.relationship.0,
                casting.role.0,
                casting.player.concept_id().clone(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
