//! # Concepts
//!
//! The typed data model laid over the property graph.
//!
//! ## Ownership
//!
//! Concepts live in the transaction-owned arena (the identity cache), boxed so
//! that a concept object keeps its address for the whole transaction. Callers
//! hold typed handles: cheap, cloneable concept ids tagged with their kind.
//! Cross-references between concepts are stored as ids and resolved through
//! the arena, never as owning pointers.
//!
//! ## Layout
//!
//! - `factory`: graph element -> concept resolution
//! - `schema_concept`: labels, the supertype hierarchy, roles, rules
//! - `type_`: plays, has/key, abstractness, instances, deletion
//! - `shard`: per-type instance sharding
//! - `relationship_type` / `attribute_type`: type-specific behaviour
//! - `thing`: instances and attribute attachment
//! - `relationship` / `casting`: the dual relationship representation

mod attribute_type;
mod casting;
mod factory;
mod relationship;
mod relationship_type;
mod schema_concept;
mod shard;
mod thing;
mod type_;

pub use casting::Casting;
pub use relationship::{EdgeRelationship, ReifiedRelationship, RelationshipStructure};
pub(crate) use shard::create_shard_vertex;

use crate::cache::{Counter, PermanentCache, SessionCache, SessionEntry, TxCache};
use crate::graph::GraphStore;
use crate::transaction::Transaction;
use crate::types::{ConceptId, DataType, ElementRef, Label, LabelId, OntographError, Value};
use std::collections::BTreeSet;

// =============================================================================
// CONCEPT KINDS
// =============================================================================

/// The closed set of concept kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConceptKind {
    MetaType,
    EntityType,
    RelationshipType,
    AttributeType,
    Role,
    Rule,
    Entity,
    Relationship,
    Attribute,
}

impl ConceptKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MetaType => "meta type",
            Self::EntityType => "entity type",
            Self::RelationshipType => "relationship type",
            Self::AttributeType => "attribute type",
            Self::Role => "role",
            Self::Rule => "rule",
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Attribute => "attribute",
        }
    }

    #[must_use]
    pub const fn is_schema(self) -> bool {
        !self.is_thing()
    }

    #[must_use]
    pub const fn is_type(self) -> bool {
        matches!(
            self,
            Self::MetaType | Self::EntityType | Self::RelationshipType | Self::AttributeType
        )
    }

    #[must_use]
    pub const fn is_thing(self) -> bool {
        matches!(self, Self::Entity | Self::Relationship | Self::Attribute)
    }
}

// =============================================================================
// CONCEPT STATE
// =============================================================================

/// State shared by every schema concept.
#[derive(Debug)]
pub struct SchemaState {
    pub(crate) label: Label,
    pub(crate) label_id: LabelId,
    pub(crate) is_implicit: bool,
    pub(crate) sup: TxCache<Option<ConceptId>>,
}

/// State shared by every type.
#[derive(Debug)]
pub struct TypeState {
    pub(crate) schema: SchemaState,
    pub(crate) is_abstract: TxCache<bool>,
    pub(crate) plays: SessionCache<BTreeSet<ConceptId>>,
}

#[derive(Debug, Default)]
pub struct RelatesState {
    pub(crate) relates: SessionCache<BTreeSet<ConceptId>>,
}

#[derive(Debug, Default)]
pub struct AttributeTypeState {
    pub(crate) data_type: PermanentCache<DataType>,
    pub(crate) regex: TxCache<Option<String>>,
}

#[derive(Debug, Default)]
pub struct RoleState {
    pub(crate) relationship_types: SessionCache<BTreeSet<ConceptId>>,
    pub(crate) players: SessionCache<BTreeSet<ConceptId>>,
}

#[derive(Debug, Default)]
pub struct RuleState {
    pub(crate) when: PermanentCache<String>,
    pub(crate) then: PermanentCache<String>,
}

/// State shared by every thing.
#[derive(Debug, Default)]
pub struct ThingState {
    /// Direct type. Written once.
    pub(crate) type_id: TxCache<ConceptId>,
    pub(crate) is_inferred: bool,
}

#[derive(Debug, Default)]
pub struct AttributeState {
    pub(crate) value: PermanentCache<Value>,
}

/// Kind-specific state of a concept.
#[derive(Debug)]
pub enum ConceptState {
    MetaType(TypeState),
    EntityType(TypeState),
    RelationshipType(TypeState, RelatesState),
    AttributeType(TypeState, AttributeTypeState),
    Role(SchemaState, RoleState),
    Rule(SchemaState, RuleState),
    Entity(ThingState),
    Relationship(ThingState, RelationshipStructure),
    Attribute(ThingState, AttributeState),
}

/// Which session-shared set of a schema concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetSlot {
    Plays,
    Relates,
    RelationshipTypes,
    Players,
}

// =============================================================================
// CONCEPT
// =============================================================================

/// One concept object, owned by a transaction's identity cache.
#[derive(Debug)]
pub struct Concept {
    id: ConceptId,
    element: ElementRef,
    pub(crate) state: ConceptState,
    pub(crate) current_shard: TxCache<crate::types::ElementId>,
    pub(crate) shard_count: SessionCache<Counter>,
}

impl Concept {
    pub(crate) fn new(id: ConceptId, element: ElementRef, state: ConceptState) -> Self {
        Self {
            id,
            element,
            state,
            current_shard: TxCache::new(),
            shard_count: SessionCache::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ConceptId {
        &self.id
    }

    /// The backing element. Changes only when a relationship is reified.
    #[must_use]
    pub fn element(&self) -> ElementRef {
        self.element
    }

    pub(crate) fn set_element(&mut self, element: ElementRef) {
        self.element = element;
    }

    #[must_use]
    pub fn kind(&self) -> ConceptKind {
        match &self.state {
            ConceptState::MetaType(_) => ConceptKind::MetaType,
            ConceptState::EntityType(_) => ConceptKind::EntityType,
            ConceptState::RelationshipType(..) => ConceptKind::RelationshipType,
            ConceptState::AttributeType(..) => ConceptKind::AttributeType,
            ConceptState::Role(..) => ConceptKind::Role,
            ConceptState::Rule(..) => ConceptKind::Rule,
            ConceptState::Entity(_) => ConceptKind::Entity,
            ConceptState::Relationship(..) => ConceptKind::Relationship,
            ConceptState::Attribute(..) => ConceptKind::Attribute,
        }
    }

    /// The label of a schema concept.
    #[must_use]
    pub fn label(&self) -> Option<&Label> {
        self.schema().map(|s| &s.label)
    }

    pub(crate) fn schema(&self) -> Option<&SchemaState> {
        match &self.state {
            ConceptState::MetaType(t)
            | ConceptState::EntityType(t)
            | ConceptState::RelationshipType(t, _)
            | ConceptState::AttributeType(t, _) => Some(&t.schema),
            ConceptState::Role(s, _) | ConceptState::Rule(s, _) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn schema_mut(&mut self) -> Option<&mut SchemaState> {
        match &mut self.state {
            ConceptState::MetaType(t)
            | ConceptState::EntityType(t)
            | ConceptState::RelationshipType(t, _)
            | ConceptState::AttributeType(t, _) => Some(&mut t.schema),
            ConceptState::Role(s, _) | ConceptState::Rule(s, _) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn type_state_mut(&mut self) -> Option<&mut TypeState> {
        match &mut self.state {
            ConceptState::MetaType(t)
            | ConceptState::EntityType(t)
            | ConceptState::RelationshipType(t, _)
            | ConceptState::AttributeType(t, _) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn thing_mut(&mut self) -> Option<&mut ThingState> {
        match &mut self.state {
            ConceptState::Entity(t)
            | ConceptState::Relationship(t, _)
            | ConceptState::Attribute(t, _) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn set_cache_mut(
        &mut self,
        slot: SetSlot,
    ) -> Option<&mut SessionCache<BTreeSet<ConceptId>>> {
        match (&mut self.state, slot) {
            (
                ConceptState::MetaType(t)
                | ConceptState::EntityType(t)
                | ConceptState::RelationshipType(t, _)
                | ConceptState::AttributeType(t, _),
                SetSlot::Plays,
            ) => Some(&mut t.plays),
            (ConceptState::RelationshipType(_, r), SetSlot::Relates) => Some(&mut r.relates),
            (ConceptState::Role(_, r), SetSlot::RelationshipTypes) => {
                Some(&mut r.relationship_types)
            }
            (ConceptState::Role(_, r), SetSlot::Players) => Some(&mut r.players),
            _ => None,
        }
    }

    /// Fold this concept's session-cache deltas into its session tier entry.
    pub(crate) fn fold_into(self, entry: &mut SessionEntry) {
        let Self {
            state, shard_count, ..
        } = self;
        shard_count.fold_into(&mut entry.shard_count);
        match state {
            ConceptState::MetaType(t) | ConceptState::EntityType(t) => {
                t.plays.fold_into(&mut entry.plays);
            }
            ConceptState::RelationshipType(t, r) => {
                t.plays.fold_into(&mut entry.plays);
                r.relates.fold_into(&mut entry.relates);
            }
            ConceptState::AttributeType(t, _) => t.plays.fold_into(&mut entry.plays),
            ConceptState::Role(_, r) => {
                r.relationship_types
                    .fold_into(&mut entry.relationship_types);
                r.players.fold_into(&mut entry.players);
            }
            ConceptState::Rule(..)
            | ConceptState::Entity(_)
            | ConceptState::Relationship(..)
            | ConceptState::Attribute(..) => {}
        }
    }
}

impl SetSlot {
    pub(crate) fn tier_value(self, entry: &SessionEntry) -> Option<&BTreeSet<ConceptId>> {
        match self {
            Self::Plays => entry.plays.as_ref(),
            Self::Relates => entry.relates.as_ref(),
            Self::RelationshipTypes => entry.relationship_types.as_ref(),
            Self::Players => entry.players.as_ref(),
        }
    }
}

// =============================================================================
// HANDLES
// =============================================================================

/// Anything that names a concept.
pub trait ConceptHandle {
    fn concept_id(&self) -> &ConceptId;
}

/// A handle whose kind is known statically.
pub trait TypedHandle: ConceptHandle + Clone + Sized {
    /// Narrow a concept of any kind.
    fn from_any(concept: AnyConcept) -> Option<Self>;

    fn into_any(self) -> AnyConcept;

    /// Name used in kind mismatch errors.
    const EXPECTED: &'static str;
}

/// Schema concepts: types, roles, rules.
pub trait SchemaHandle: TypedHandle {}

/// Types: the meta root, entity, relationship and attribute types.
pub trait TypeHandle: SchemaHandle {}

/// Instances: entities, relationships, attributes.
pub trait ThingHandle: TypedHandle {}

macro_rules! concept_handle {
    ($(#[$meta:meta])* $name:ident, $expected:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) ConceptId);

        impl $name {
            #[must_use]
            pub fn id(&self) -> &ConceptId {
                &self.0
            }
        }

        impl ConceptHandle for $name {
            fn concept_id(&self) -> &ConceptId {
                &self.0
            }
        }

        impl TypedHandle for $name {
            const EXPECTED: &'static str = $expected;

            fn from_any(concept: AnyConcept) -> Option<Self> {
                match concept {
                    AnyConcept::$name(handle) => Some(handle),
                    _ => None,
                }
            }

            fn into_any(self) -> AnyConcept {
                AnyConcept::$name(self)
            }
        }

        impl From<$name> for AnyConcept {
            fn from(handle: $name) -> Self {
                AnyConcept::$name(handle)
            }
        }
    };
}

concept_handle!(
    /// The meta root `thing`.
    MetaType,
    "meta type"
);
concept_handle!(EntityType, "entity type");
concept_handle!(RelationshipType, "relationship type");
concept_handle!(
    /// A type of attributes with a fixed data type.
    AttributeType,
    "attribute type"
);
concept_handle!(Role, "role");
concept_handle!(Rule, "rule");
concept_handle!(Entity, "entity");
concept_handle!(
    /// A relationship, in either physical form.
    Relationship,
    "relationship"
);
concept_handle!(Attribute, "attribute");

impl SchemaHandle for MetaType {}
impl SchemaHandle for EntityType {}
impl SchemaHandle for RelationshipType {}
impl SchemaHandle for AttributeType {}
impl SchemaHandle for Role {}
impl SchemaHandle for Rule {}
impl TypeHandle for MetaType {}
impl TypeHandle for EntityType {}
impl TypeHandle for RelationshipType {}
impl TypeHandle for AttributeType {}
impl ThingHandle for Entity {}
impl ThingHandle for Relationship {}
impl ThingHandle for Attribute {}

/// A concept of any kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnyConcept {
    MetaType(MetaType),
    EntityType(EntityType),
    RelationshipType(RelationshipType),
    AttributeType(AttributeType),
    Role(Role),
    Rule(Rule),
    Entity(Entity),
    Relationship(Relationship),
    Attribute(Attribute),
}

impl AnyConcept {
    pub(crate) fn from_kind(kind: ConceptKind, id: ConceptId) -> Self {
        match kind {
            ConceptKind::MetaType => Self::MetaType(MetaType(id)),
            ConceptKind::EntityType => Self::EntityType(EntityType(id)),
            ConceptKind::RelationshipType => Self::RelationshipType(RelationshipType(id)),
            ConceptKind::AttributeType => Self::AttributeType(AttributeType(id)),
            ConceptKind::Role => Self::Role(Role(id)),
            ConceptKind::Rule => Self::Rule(Rule(id)),
            ConceptKind::Entity => Self::Entity(Entity(id)),
            ConceptKind::Relationship => Self::Relationship(Relationship(id)),
            ConceptKind::Attribute => Self::Attribute(Attribute(id)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ConceptKind {
        match self {
            Self::MetaType(_) => ConceptKind::MetaType,
            Self::EntityType(_) => ConceptKind::EntityType,
            Self::RelationshipType(_) => ConceptKind::RelationshipType,
            Self::AttributeType(_) => ConceptKind::AttributeType,
            Self::Role(_) => ConceptKind::Role,
            Self::Rule(_) => ConceptKind::Rule,
            Self::Entity(_) => ConceptKind::Entity,
            Self::Relationship(_) => ConceptKind::Relationship,
            Self::Attribute(_) => ConceptKind::Attribute,
        }
    }

    /// Narrow to a statically known kind.
    #[must_use]
    pub fn into_handle<H: TypedHandle>(self) -> Option<H> {
        H::from_any(self)
    }
}

impl ConceptHandle for AnyConcept {
    fn concept_id(&self) -> &ConceptId {
        match self {
            Self::MetaType(h) => h.concept_id(),
            Self::EntityType(h) => h.concept_id(),
            Self::RelationshipType(h) => h.concept_id(),
            Self::AttributeType(h) => h.concept_id(),
            Self::Role(h) => h.concept_id(),
            Self::Rule(h) => h.concept_id(),
            Self::Entity(h) => h.concept_id(),
            Self::Relationship(h) => h.concept_id(),
            Self::Attribute(h) => h.concept_id(),
        }
    }
}

impl TypedHandle for AnyConcept {
    const EXPECTED: &'static str = "concept";

    fn from_any(concept: AnyConcept) -> Option<Self> {
        Some(concept)
    }

    fn into_any(self) -> AnyConcept {
        self
    }
}

/// Any type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Meta(MetaType),
    Entity(EntityType),
    Relationship(RelationshipType),
    Attribute(AttributeType),
}

impl ConceptHandle for Type {
    fn concept_id(&self) -> &ConceptId {
        match self {
            Self::Meta(h) => h.concept_id(),
            Self::Entity(h) => h.concept_id(),
            Self::Relationship(h) => h.concept_id(),
            Self::Attribute(h) => h.concept_id(),
        }
    }
}

impl TypedHandle for Type {
    const EXPECTED: &'static str = "type";

    fn from_any(concept: AnyConcept) -> Option<Self> {
        match concept {
            AnyConcept::MetaType(h) => Some(Self::Meta(h)),
            AnyConcept::EntityType(h) => Some(Self::Entity(h)),
            AnyConcept::RelationshipType(h) => Some(Self::Relationship(h)),
            AnyConcept::AttributeType(h) => Some(Self::Attribute(h)),
            _ => None,
        }
    }

    fn into_any(self) -> AnyConcept {
        match self {
            Self::Meta(h) => h.into_any(),
            Self::Entity(h) => h.into_any(),
            Self::Relationship(h) => h.into_any(),
            Self::Attribute(h) => h.into_any(),
        }
    }
}

impl SchemaHandle for Type {}
impl TypeHandle for Type {}

/// Any instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Thing {
    Entity(Entity),
    Relationship(Relationship),
    Attribute(Attribute),
}

impl ConceptHandle for Thing {
    fn concept_id(&self) -> &ConceptId {
        match self {
            Self::Entity(h) => h.concept_id(),
            Self::Relationship(h) => h.concept_id(),
            Self::Attribute(h) => h.concept_id(),
        }
    }
}

impl TypedHandle for Thing {
    const EXPECTED: &'static str = "thing";

    fn from_any(concept: AnyConcept) -> Option<Self> {
        match concept {
            AnyConcept::Entity(h) => Some(Self::Entity(h)),
            AnyConcept::Relationship(h) => Some(Self::Relationship(h)),
            AnyConcept::Attribute(h) => Some(Self::Attribute(h)),
            _ => None,
        }
    }

    fn into_any(self) -> AnyConcept {
        match self {
            Self::Entity(h) => h.into_any(),
            Self::Relationship(h) => h.into_any(),
            Self::Attribute(h) => h.into_any(),
        }
    }
}

impl ThingHandle for Thing {}

impl From<Entity> for Thing {
    fn from(h: Entity) -> Self {
        Self::Entity(h)
    }
}

impl From<Relationship> for Thing {
    fn from(h: Relationship) -> Self {
        Self::Relationship(h)
    }
}

impl From<Attribute> for Thing {
    fn from(h: Attribute) -> Self {
        Self::Attribute(h)
    }
}

/// Any schema concept.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaConcept {
    Type(Type),
    Role(Role),
    Rule(Rule),
}

impl ConceptHandle for SchemaConcept {
    fn concept_id(&self) -> &ConceptId {
        match self {
            Self::Type(h) => h.concept_id(),
            Self::Role(h) => h.concept_id(),
            Self::Rule(h) => h.concept_id(),
        }
    }
}

impl TypedHandle for SchemaConcept {
    const EXPECTED: &'static str = "schema concept";

    fn from_any(concept: AnyConcept) -> Option<Self> {
        match concept {
            AnyConcept::Role(h) => Some(Self::Role(h)),
            AnyConcept::Rule(h) => Some(Self::Rule(h)),
            other => Type::from_any(other).map(Self::Type),
        }
    }

    fn into_any(self) -> AnyConcept {
        match self {
            Self::Type(h) => h.into_any(),
            Self::Role(h) => h.into_any(),
            Self::Rule(h) => h.into_any(),
        }
    }
}

impl SchemaHandle for SchemaConcept {}

// =============================================================================
// LAZY CONCEPT SEQUENCES
// =============================================================================

type StreamStep<'t, 's, S, T> =
    Box<dyn FnMut(&mut Transaction<'s, S>, AnyConcept) -> Result<Option<T>, OntographError> + 't>;

/// A lazy, finite, non-restartable sequence of concepts.
///
/// Elements are resolved one at a time as the sequence is pulled. Elements
/// that do not resolve to a concept (orphaned or half-deleted vertices) are
/// skipped with a warning.
pub struct ConceptStream<'t, 's, S: GraphStore, T> {
    tx: &'t mut Transaction<'s, S>,
    pending: std::vec::IntoIter<ElementRef>,
    step: StreamStep<'t, 's, S, T>,
}

impl<'t, 's, S: GraphStore, T> ConceptStream<'t, 's, S, T> {
    pub(crate) fn new(
        tx: &'t mut Transaction<'s, S>,
        elements: Vec<ElementRef>,
        step: impl FnMut(&mut Transaction<'s, S>, AnyConcept) -> Result<Option<T>, OntographError>
        + 't,
    ) -> Self {
        Self {
            tx,
            pending: elements.into_iter(),
            step: Box::new(step),
        }
    }

    /// Number of elements not yet pulled.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl<S: GraphStore, T> Iterator for ConceptStream<'_, '_, S, T> {
    type Item = Result<T, OntographError>;

    fn next(&mut self) -> Option<Self::Item> {
        for element in self.pending.by_ref() {
            let concept = match self.tx.resolve_any(element) {
                Ok(Some(concept)) => concept,
                Ok(None) => {
                    tracing::warn!(%element, "skipping element that is not a concept");
                    continue;
                }
                Err(e) => return Some(Err(e)),
            };
            match (self.step)(self.tx, concept) {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pending.len()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
