//! # Persisted Layout Vocabulary
//!
//! Vertex labels, edge labels and property names used to lay concepts out on
//! the property graph. These names are fixed: a store written by one build
//! must be readable by every other.

use crate::types::Label;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// BASE TYPES (vertex labels)
// =============================================================================

/// The kind of concept a vertex backs, stored as the vertex label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseType {
    /// The meta root `thing`.
    Type,
    EntityType,
    RelationshipType,
    AttributeType,
    Role,
    RuleType,
    Entity,
    Relationship,
    Attribute,
    Shard,
}

impl BaseType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Type => "TYPE",
            Self::EntityType => "ENTITY_TYPE",
            Self::RelationshipType => "RELATIONSHIP_TYPE",
            Self::AttributeType => "ATTRIBUTE_TYPE",
            Self::Role => "ROLE",
            Self::RuleType => "RULE_TYPE",
            Self::Entity => "ENTITY",
            Self::Relationship => "RELATIONSHIP",
            Self::Attribute => "ATTRIBUTE",
            Self::Shard => "SHARD",
        }
    }

    /// Map a vertex label back to its base type.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "TYPE" => Self::Type,
            "ENTITY_TYPE" => Self::EntityType,
            "RELATIONSHIP_TYPE" => Self::RelationshipType,
            "ATTRIBUTE_TYPE" => Self::AttributeType,
            "ROLE" => Self::Role,
            "RULE_TYPE" => Self::RuleType,
            "ENTITY" => Self::Entity,
            "RELATIONSHIP" => Self::Relationship,
            "ATTRIBUTE" => Self::Attribute,
            "SHARD" => Self::Shard,
            _ => return None,
        })
    }

    /// The instance kind of a type kind, if it has instances.
    #[must_use]
    pub const fn instance_kind(self) -> Option<Self> {
        match self {
            Self::EntityType => Some(Self::Entity),
            Self::RelationshipType => Some(Self::Relationship),
            Self::AttributeType => Some(Self::Attribute),
            _ => None,
        }
    }

    /// Whether vertices with this label are schema concepts.
    #[must_use]
    pub const fn is_schema(self) -> bool {
        matches!(
            self,
            Self::Type
                | Self::EntityType
                | Self::RelationshipType
                | Self::AttributeType
                | Self::Role
                | Self::RuleType
        )
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EDGE LABELS
// =============================================================================

/// Structural edge labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeLabel {
    /// Instance -> shard of its type.
    Isa,
    /// Subtype -> supertype.
    Sub,
    /// Relationship type -> role.
    Relates,
    /// Type -> role.
    Plays,
    /// Shard -> owning type.
    Shard,
    /// Reified relationship -> player. One edge per casting.
    RolePlayer,
    /// Owner -> attribute. An edge-form relationship.
    Attribute,
}

impl EdgeLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isa => "ISA",
            Self::Sub => "SUB",
            Self::Relates => "RELATES",
            Self::Plays => "PLAYS",
            Self::Shard => "SHARD",
            Self::RolePlayer => "ROLE_PLAYER",
            Self::Attribute => "ATTRIBUTE",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "ISA" => Self::Isa,
            "SUB" => Self::Sub,
            "RELATES" => Self::Relates,
            "PLAYS" => Self::Plays,
            "SHARD" => Self::Shard,
            "ROLE_PLAYER" => Self::RolePlayer,
            "ATTRIBUTE" => Self::Attribute,
            _ => return None,
        })
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PROPERTY KEYS
// =============================================================================

/// Property names on vertices and edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    // Vertex properties
    Id,
    SchemaLabel,
    LabelId,
    IsAbstract,
    IsImplicit,
    Regex,
    DataType,
    Index,
    ThingTypeLabelId,
    CurrentShard,
    IsInferred,
    RuleWhen,
    RuleThen,
    ValueString,
    ValueBoolean,
    ValueInteger,
    ValueLong,
    ValueFloat,
    ValueDouble,
    ValueDate,

    // Edge properties
    RelationshipTypeLabelId,
    RoleLabelId,
    RelationshipRoleOwnerLabelId,
    RelationshipRoleValueLabelId,
    Required,
}

impl PropertyKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::SchemaLabel => "SCHEMA_LABEL",
            Self::LabelId => "LABEL_ID",
            Self::IsAbstract => "IS_ABSTRACT",
            Self::IsImplicit => "IS_IMPLICIT",
            Self::Regex => "REGEX",
            Self::DataType => "DATA_TYPE",
            Self::Index => "INDEX",
            Self::ThingTypeLabelId => "THING_TYPE_LABEL_ID",
            Self::CurrentShard => "CURRENT_SHARD",
            Self::IsInferred => "IS_INFERRED",
            Self::RuleWhen => "RULE_WHEN",
            Self::RuleThen => "RULE_THEN",
            Self::ValueString => "VALUE_STRING",
            Self::ValueBoolean => "VALUE_BOOLEAN",
            Self::ValueInteger => "VALUE_INTEGER",
            Self::ValueLong => "VALUE_LONG",
            Self::ValueFloat => "VALUE_FLOAT",
            Self::ValueDouble => "VALUE_DOUBLE",
            Self::ValueDate => "VALUE_DATE",
            Self::RelationshipTypeLabelId => "RELATIONSHIP_TYPE_LABEL_ID",
            Self::RoleLabelId => "ROLE_LABEL_ID",
            Self::RelationshipRoleOwnerLabelId => "RELATIONSHIP_ROLE_OWNER_LABEL_ID",
            Self::RelationshipRoleValueLabelId => "RELATIONSHIP_ROLE_VALUE_LABEL_ID",
            Self::Required => "REQUIRED",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.as_str() == name)
    }

    /// Every property key, in declaration order.
    pub const ALL: [Self; 25] = [
        Self::Id,
        Self::SchemaLabel,
        Self::LabelId,
        Self::IsAbstract,
        Self::IsImplicit,
        Self::Regex,
        Self::DataType,
        Self::Index,
        Self::ThingTypeLabelId,
        Self::CurrentShard,
        Self::IsInferred,
        Self::RuleWhen,
        Self::RuleThen,
        Self::ValueString,
        Self::ValueBoolean,
        Self::ValueInteger,
        Self::ValueLong,
        Self::ValueFloat,
        Self::ValueDouble,
        Self::ValueDate,
        Self::RelationshipTypeLabelId,
        Self::RoleLabelId,
        Self::RelationshipRoleOwnerLabelId,
        Self::RelationshipRoleValueLabelId,
        Self::Required,
    ];
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// IMPLICIT TYPES
// =============================================================================

/// Auto-generated schema concepts backing `has` and `key` declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImplicitType {
    HasRelationship,
    HasOwner,
    HasValue,
    KeyRelationship,
    KeyOwner,
    KeyValue,
}

impl ImplicitType {
    pub const ALL: [Self; 6] = [
        Self::HasRelationship,
        Self::HasOwner,
        Self::HasValue,
        Self::KeyRelationship,
        Self::KeyOwner,
        Self::KeyValue,
    ];

    /// Implicit relationship type, owner role and value role for an attachment kind.
    #[must_use]
    pub const fn triple(is_key: bool) -> (Self, Self, Self) {
        if is_key {
            (Self::KeyRelationship, Self::KeyOwner, Self::KeyValue)
        } else {
            (Self::HasRelationship, Self::HasOwner, Self::HasValue)
        }
    }

    /// Derive the implicit label for `attribute_type`.
    #[must_use]
    pub fn label(self, attribute_type: &Label) -> Label {
        let label = attribute_type.as_str();
        Label::new(match self {
            Self::HasRelationship => format!("@has-{}", label),
            Self::HasOwner => format!("@has-{}-owner", label),
            Self::HasValue => format!("@has-{}-value", label),
            Self::KeyRelationship => format!("@key-{}", label),
            Self::KeyOwner => format!("@key-{}-owner", label),
            Self::KeyValue => format!("@key-{}-value", label),
        })
    }
}

// =============================================================================
// META SCHEMA
// =============================================================================

/// Roots of every schema hierarchy. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaSchema {
    Thing,
    Entity,
    Relationship,
    Attribute,
    Role,
    Rule,
}

impl MetaSchema {
    pub const ALL: [Self; 6] = [
        Self::Thing,
        Self::Entity,
        Self::Relationship,
        Self::Attribute,
        Self::Role,
        Self::Rule,
    ];

    #[must_use]
    pub const fn label_str(self) -> &'static str {
        match self {
            Self::Thing => "thing",
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Attribute => "attribute",
            Self::Role => "role",
            Self::Rule => "rule",
        }
    }

    #[must_use]
    pub fn label(self) -> Label {
        Label::new(self.label_str())
    }

    /// Vertex label of the meta concept.
    #[must_use]
    pub const fn base_type(self) -> BaseType {
        match self {
            Self::Thing => BaseType::Type,
            Self::Entity => BaseType::EntityType,
            Self::Relationship => BaseType::RelationshipType,
            Self::Attribute => BaseType::AttributeType,
            Self::Role => BaseType::Role,
            Self::Rule => BaseType::RuleType,
        }
    }

    /// The meta concept this one is a direct subtype of.
    #[must_use]
    pub const fn sup(self) -> Option<Self> {
        match self {
            Self::Entity | Self::Relationship | Self::Attribute => Some(Self::Thing),
            Self::Thing | Self::Role | Self::Rule => None,
        }
    }

    #[must_use]
    pub fn is_meta_label(label: &str) -> bool {
        Self::ALL.iter().any(|m| m.label_str() == label)
    }
}

// =============================================================================
// TESTS
// =============================================================================
