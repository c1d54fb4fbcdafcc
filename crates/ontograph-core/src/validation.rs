//! # Commit Validation
//!
//! Mutations register the concepts whose structural rules they may have
//! broken. Nothing is checked at mutation time beyond local preconditions;
//! the whole-transaction rules run once, at commit, over the tracked
//! concepts only.
//!
//! The validator is a seam: a session runs `StructuralValidator` unless it
//! is given another implementation.

use crate::concept::{AttributeType, SetSlot, Thing};
use crate::graph::GraphStore;
use crate::transaction::Transaction;
use crate::types::{ConceptId, OntographError};
use std::collections::BTreeSet;

// =============================================================================
// TRACKING
// =============================================================================

/// Concepts tracked for commit-time validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationTracking {
    /// Things whose key ownership may have changed.
    pub things: BTreeSet<ConceptId>,
    /// (relationship, role, player) castings to re-check.
    pub castings: BTreeSet<(ConceptId, ConceptId, ConceptId)>,
    /// Roles whose relates or plays links changed.
    pub roles: BTreeSet<ConceptId>,
    /// Relationship types whose relates links changed.
    pub relationship_types: BTreeSet<ConceptId>,
    /// Relationships that may have lost their last role player.
    pub relationships_to_clean: BTreeSet<ConceptId>,
}

impl ValidationTracking {
    /// Drop every reference to a deleted concept.
    pub(crate) fn forget(&mut self, id: &ConceptId) {
        self.things.remove(id);
        self.roles.remove(id);
        self.relationship_types.remove(id);
        self.relationships_to_clean.remove(id);
        self.castings
            .retain(|(relationship, role, player)| relationship != id && role != id && player != id);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
            && self.castings.is_empty()
            && self.roles.is_empty()
            && self.relationship_types.is_empty()
            && self.relationships_to_clean.is_empty()
    }
}

// =============================================================================
// VALIDATOR TRAIT
// =============================================================================

/// Whole-transaction structural checks run by `Transaction::commit`.
///
/// Returns one message per violation. An empty list lets the commit proceed.
pub trait Validator<S: GraphStore> {
    fn validate(
        &self,
        tx: &mut Transaction<'_, S>,
        tracking: &ValidationTracking,
    ) -> Result<Vec<String>, OntographError>;
}

/// The default validator.
///
/// Checks, for tracked concepts only:
/// - a thing owns exactly one key of every key type of its type
/// - a casting's player type plays the role, and the relationship's type
///   (or a supertype) relates it
/// - a role is related by at least one relationship type
/// - a relationship type relates at least one role unless it is abstract
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl<S: GraphStore> Validator<S> for StructuralValidator {
    fn validate(
        &self,
        tx: &mut Transaction<'_, S>,
        tracking: &ValidationTracking,
    ) -> Result<Vec<String>, OntographError> {
        let mut errors = Vec::new();

        for thing in &tracking.things {
            if tx.contains(thing)? {
                validate_keys(tx, thing, &mut errors)?;
            }
        }
        for (relationship, role, player) in &tracking.castings {
            if tx.contains(relationship)? && tx.contains(role)? && tx.contains(player)? {
                validate_casting(tx, relationship, role, player, &mut errors)?;
            }
        }
        for role in &tracking.roles {
            if tx.contains(role)? && !tx.is_meta(role)? {
                if tx.session_set(role, SetSlot::RelationshipTypes)?.is_empty() {
                    errors.push(format!(
                        "Role [{}] is not related by any relationship type",
                        tx.schema_label(role)?
                    ));
                }
            }
        }
        for relationship_type in &tracking.relationship_types {
            if !tx.contains(relationship_type)?
                || tx.is_meta(relationship_type)?
                || tx.is_abstract_id(relationship_type)?
            {
                continue;
            }
            if tx.session_set(relationship_type, SetSlot::Relates)?.is_empty() {
                errors.push(format!(
                    "Relationship type [{}] does not relate any role",
                    tx.schema_label(relationship_type)?
                ));
            }
        }

        if !errors.is_empty() {
            tracing::debug!(violations = errors.len(), "structural validation failed");
        }
        Ok(errors)
    }
}

fn validate_keys<S: GraphStore>(
    tx: &mut Transaction<'_, S>,
    id: &ConceptId,
    errors: &mut Vec<String>,
) -> Result<(), OntographError> {
    let Some(thing) = tx.get::<Thing>(id)? else {
        return Ok(());
    };
    let type_id = tx.thing_type_id(id)?;
    for key_type in tx.implicit_attribute_types(&type_id, true)? {
        let owned = tx.keys(&thing, &[AttributeType(key_type.clone())])?.len();
        if owned != 1 {
            errors.push(format!(
                "Thing [{}] of type [{}] does not have exactly one key of type [{}], it has {}",
                id,
                tx.schema_label(&type_id)?,
                tx.schema_label(&key_type)?,
                owned
            ));
        }
    }
    Ok(())
}

fn validate_casting<S: GraphStore>(
    tx: &mut Transaction<'_, S>,
    relationship: &ConceptId,
    role: &ConceptId,
    player: &ConceptId,
    errors: &mut Vec<String>,
) -> Result<(), OntographError> {
    let player_type = tx.thing_type_id(player)?;
    if !tx.playing_ids(&player_type)?.contains(role) {
        errors.push(format!(
            "Type [{}] of role player [{}] is not allowed to play role [{}]",
            tx.schema_label(&player_type)?,
            player,
            tx.schema_label(role)?
        ));
    }

    let relationship_type = tx.thing_type_id(relationship)?;
    let mut related = false;
    for ancestor in tx.sup_chain(&relationship_type)? {
        if tx.session_set(&ancestor, SetSlot::Relates)?.contains(role) {
            related = true;
            break;
        }
    }
    if !related {
        errors.push(format!(
            "Role [{}] is not related by relationship type [{}] of relationship [{}]",
            tx.schema_label(role)?,
            tx.schema_label(&relationship_type)?,
            relationship
        ));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::types::DataType;

    #[test]
    fn forget_drops_castings_naming_the_concept() {
        let mut tracking = ValidationTracking::default();
        let (rel, role, player) = (
            ConceptId::new("V1"),
            ConceptId::new("V2"),
            ConceptId::new("V3"),
        );
        tracking.castings.insert((rel.clone(), role, player.clone()));
        tracking.things.insert(player.clone());
        assert!(!tracking.is_empty());

        tracking.forget(&player);
        assert!(tracking.is_empty());
        tracking.forget(&rel);
        assert!(tracking.is_empty());
    }

    #[test]
    fn role_without_relationship_type_fails_commit() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        tx.put_role("orphan").expect("role");
        let err = tx.commit().expect_err("orphan role");
        match err {
            OntographError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("orphan"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn relationship_type_without_roles_fails_unless_abstract() {
        let mut session = Session::in_memory().expect("session");
        {
            let mut tx = session.transaction().expect("tx");
            tx.put_relationship_type("empty").expect("rt");
            assert!(matches!(tx.commit(), Err(OntographError::Validation(_))));
        }
        let mut tx = session.transaction().expect("tx");
        let empty = tx.put_relationship_type("empty").expect("rt");
        tx.set_abstract(&empty, true).expect("abstract");
        tx.commit().expect("abstract relationship types may relate nothing");
    }

    #[test]
    fn casting_with_unplayable_role_is_reported() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let marriage = tx.put_relationship_type("marriage").expect("rt");
        let spouse = tx.put_role("spouse").expect("role");
        tx.relates(&marriage, &spouse).expect("relates");
        let alice = tx.add_entity(&person).expect("alice");
        let wedding = tx.add_relationship(&marriage).expect("wedding");
        tx.add_role_player(&wedding, &spouse, &alice).expect("locally accepted");

        let err = tx.commit().expect_err("person does not play spouse");
        let OntographError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("person"));
        assert!(errors[0].contains("spouse"));
    }

    #[test]
    fn missing_key_is_reported_for_every_thing() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let person = tx.put_entity_type("person").expect("person");
        let email = tx.put_attribute_type("email", DataType::String).expect("email");
        tx.key(&person, &email).expect("key");
        let first = tx.add_entity(&person).expect("first");
        let second = tx.add_entity(&person).expect("second");

        let err = tx.commit().expect_err("no keys");
        let OntographError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains(first.id().as_str())));
        assert!(errors.iter().any(|e| e.contains(second.id().as_str())));
    }

    #[test]
    fn validation_can_be_disabled() {
        let config = crate::config::EngineConfig {
            validate_on_commit: false,
            ..crate::config::EngineConfig::default()
        };
        let mut session =
            Session::open(crate::graph::Graph::new(), config).expect("session");
        let mut tx = session.transaction().expect("tx");
        tx.put_role("orphan").expect("role");
        tx.commit().expect("unvalidated commit");
    }
}
