//! # Core Type Definitions
//!
//! This module contains the identifiers, value types and the error type shared
//! by every layer of the concept engine:
//! - Graph element identifiers (`ElementId`, `ElementRef`)
//! - Concept identity (`ConceptId`) and schema naming (`Label`, `LabelId`)
//! - Attribute values (`DataType`, `Value`)
//! - Traversal direction (`Direction`)
//! - Error types (`OntographError`)
//!
//! ## Identity Guarantees
//!
//! - A `ConceptId` is derived once from the backing element and never changes.
//! - Two concepts are equal iff their ids are equal.

use crate::primitives::{EDGE_PREFIX, VERTEX_PREFIX};
use crate::schema::PropertyKey;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH ELEMENT IDENTIFIERS
// =============================================================================

/// Native identifier of a vertex or edge, assigned by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to one graph element: either a vertex or an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    Vertex(ElementId),
    Edge(ElementId),
}

impl ElementRef {
    /// The native id regardless of element kind.
    #[must_use]
    pub const fn id(self) -> ElementId {
        match self {
            Self::Vertex(id) | Self::Edge(id) => id,
        }
    }

    #[must_use]
    pub const fn is_vertex(self) -> bool {
        matches!(self, Self::Vertex(_))
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex(id) => write!(f, "vertex {}", id),
            Self::Edge(id) => write!(f, "edge {}", id),
        }
    }
}

// =============================================================================
// CONCEPT IDENTITY
// =============================================================================

/// Stable identifier of a concept.
///
/// Derived from the backing element's native id with a structural prefix
/// (`V` for vertex-backed concepts, `E` for edge-backed ones). A relationship
/// promoted from an edge to a vertex keeps its original `E` id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(String);

impl ConceptId {
    /// Wrap a raw identifier string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derive the identifier of the concept backed by `element`.
    #[must_use]
    pub fn from_element(element: ElementRef) -> Self {
        match element {
            ElementRef::Vertex(id) => Self(format!("{}{}", VERTEX_PREFIX, id.0)),
            ElementRef::Edge(id) => Self(format!("{}{}", EDGE_PREFIX, id.0)),
        }
    }

    /// The element this id was originally derived from.
    ///
    /// Returns `None` for ids that do not carry a known prefix.
    #[must_use]
    pub fn origin(&self) -> Option<ElementRef> {
        if let Some(rest) = self.0.strip_prefix(VERTEX_PREFIX) {
            return rest.parse().ok().map(|n| ElementRef::Vertex(ElementId(n)));
        }
        if let Some(rest) = self.0.strip_prefix(EDGE_PREFIX) {
            return rest.parse().ok().map(|n| ElementRef::Edge(ElementId(n)));
        }
        None
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable name of a schema concept.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label(String);

impl Label {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Compact numeric handle of a schema concept, written onto role-player and
/// attribute edges instead of the full label.
///
/// A label id equals the native id of the schema concept's vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u64);

impl LabelId {
    /// Property encoding of this label id.
    #[must_use]
    pub fn to_value(self) -> Value {
        Value::Long(self.0 as i64)
    }

    /// Decode a label id from a property value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Long(n) if *n >= 0 => Some(Self(*n as u64)),
            _ => None,
        }
    }

    /// The vertex carrying this label id.
    #[must_use]
    pub const fn vertex(self) -> ElementId {
        ElementId(self.0)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Edge direction relative to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Out,
    In,
    Both,
}

// =============================================================================
// DATA TYPES & VALUES
// =============================================================================

/// The closed set of data types an attribute type may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    Date,
}

impl DataType {
    /// Persisted name of the data type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Date => "date",
        }
    }

    /// Parse a persisted data type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    /// The physical property an attribute of this data type stores its value in.
    #[must_use]
    pub const fn value_key(self) -> PropertyKey {
        match self {
            Self::String => PropertyKey::ValueString,
            Self::Boolean => PropertyKey::ValueBoolean,
            Self::Integer => PropertyKey::ValueInteger,
            Self::Long => PropertyKey::ValueLong,
            Self::Float => PropertyKey::ValueFloat,
            Self::Double => PropertyKey::ValueDouble,
            Self::Date => PropertyKey::ValueDate,
        }
    }

    /// Normalise `value` into the representation persisted for this data type.
    ///
    /// Integral types widen from narrower integers but never accept floating
    /// values, even numerically integral ones. Floating types accept any
    /// number and widen it. `Float` also narrows finite doubles in its range.
    pub fn normalize(self, value: Value) -> Result<Value, OntographError> {
        let normalized = match (self, &value) {
            (Self::String, Value::String(_))
            | (Self::Boolean, Value::Boolean(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::Long, Value::Long(_))
            | (Self::Float, Value::Float(_))
            | (Self::Double, Value::Double(_))
            | (Self::Date, Value::Date(_)) => Some(value.clone()),
            (Self::Integer, Value::Long(n)) => i32::try_from(*n).ok().map(Value::Integer),
            (Self::Long, Value::Integer(n)) => Some(Value::Long(i64::from(*n))),
            (Self::Float, Value::Integer(n)) => Some(Value::Float(*n as f32)),
            (Self::Float, Value::Long(n)) => Some(Value::Float(*n as f32)),
            (Self::Float, Value::Double(n)) if n.is_finite() && n.abs() <= f64::from(f32::MAX) => {
                Some(Value::Float(*n as f32))
            }
            (Self::Double, Value::Integer(n)) => Some(Value::Double(f64::from(*n))),
            (Self::Double, Value::Long(n)) => Some(Value::Double(*n as f64)),
            (Self::Double, Value::Float(n)) => Some(Value::Double(f64::from(*n))),
            _ => None,
        };
        normalized.ok_or_else(|| OntographError::InvalidValue {
            value: value.to_string(),
            expected: self,
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed property or attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Date(NaiveDateTime),
}

impl Value {
    /// The data type this value naturally belongs to.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Long(_) => DataType::Long,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::Date(_) => DataType::Date,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Long(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Double(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Long(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Self::Float(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Self::Date(d)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the concept engine.
///
/// - No silent failures
/// - Mutations either complete wholly or fail before any write lands
/// - Resolution failures are reported as absence (`None`), not as errors
#[derive(Debug, Error)]
pub enum OntographError {
    /// Meta concepts (the roots of each hierarchy) cannot be mutated.
    #[error("Meta concept [{0}] is immutable")]
    MetaTypeImmutable(Label),

    /// The owner's type does not allow it to have the given attribute.
    #[error("Thing [{owner}] is not allowed to have attribute [{attribute}] of type [{attribute_type}]")]
    HasNotAllowed {
        owner: ConceptId,
        attribute: ConceptId,
        attribute_type: Label,
    },

    /// An attribute type was declared as both `has` and `key` on one type.
    #[error("Type [{owner}] already links attribute type [{attribute_type}] through another implicit relationship")]
    DuplicateHas { owner: Label, attribute_type: Label },

    /// `unhas`/`unkey` cannot be applied.
    #[error("Cannot remove [{attribute_type}] from [{owner}]: {reason}")]
    IllegalUnhas {
        owner: Label,
        attribute_type: Label,
        reason: &'static str,
    },

    /// Regular expressions only apply to string attribute types.
    #[error("Cannot set a regex on attribute type [{label}] with data type [{data_type}]")]
    RegexOnNonString { label: Label, data_type: DataType },

    /// The supplied regular expression does not compile.
    #[error("Invalid regex [{pattern}]: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// A value does not match the regex declared on its type or a supertype.
    #[error("Value [{value}] does not match regex [{pattern}]")]
    RegexViolation { pattern: String, value: String },

    /// A value cannot be stored under the requested data type.
    #[error("Value [{value}] is not valid for data type [{expected}]")]
    InvalidValue { value: String, expected: DataType },

    /// An attribute type was re-declared with a different data type.
    #[error("Attribute type [{label}] already exists with data type [{existing}], not [{requested}]")]
    DataTypeMismatch {
        label: Label,
        existing: DataType,
        requested: DataType,
    },

    /// Abstract types cannot have direct instances.
    #[error("Type [{0}] is abstract and cannot have instances")]
    AbstractInstance(Label),

    /// A schema label is already used by a concept of another kind.
    #[error("Label [{label}] is already taken by a concept of kind [{existing}]")]
    LabelTaken { label: Label, existing: String },

    /// Implicit concepts take their label from their attribute type.
    #[error("Implicit concept [{0}] is renamed only through its attribute type")]
    ImplicitLabel(Label),

    /// Setting this supertype would create a cycle in the hierarchy.
    #[error("Setting [{sup}] as the supertype of [{sub}] creates a loop")]
    SupLoop { sub: Label, sup: Label },

    /// The concept is still referenced and cannot be deleted.
    #[error("Concept [{0}] cannot be deleted while it is still in use")]
    DeletionNotAllowed(ConceptId),

    /// The concept exists but is not of the kind the operation requires.
    #[error("Concept [{id}] is a [{actual}], expected [{expected}]")]
    WrongConceptKind {
        id: ConceptId,
        expected: &'static str,
        actual: &'static str,
    },

    /// The concept does not exist (or was deleted in this transaction).
    #[error("Concept not found: {0}")]
    ConceptNotFound(ConceptId),

    /// A graph element is missing from the store.
    #[error("Element not found: {0}")]
    ElementNotFound(ElementRef),

    /// A type that must own instances has no shard. The graph is corrupted.
    #[error("Type [{0}] has no shard; the graph is corrupted")]
    MissingShard(ConceptId),

    /// An element lacks a property the concept layout requires.
    #[error("Element {element} is corrupted: missing or malformed [{property}]")]
    CorruptedElement {
        element: ElementRef,
        property: &'static str,
    },

    /// Merge-on-collision for a unique attribute index did not converge.
    #[error("Attribute index [{0}] is contended and could not be resolved")]
    AttributeMergeFailed(String),

    /// Commit-time validation found violations. Every violating concept is named.
    #[error("Validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_id_prefix_distinguishes_elements() {
        let vertex = ConceptId::from_element(ElementRef::Vertex(ElementId(7)));
        let edge = ConceptId::from_element(ElementRef::Edge(ElementId(7)));

        assert_ne!(vertex, edge);
        assert_eq!(vertex.origin(), Some(ElementRef::Vertex(ElementId(7))));
        assert_eq!(edge.origin(), Some(ElementRef::Edge(ElementId(7))));
        assert_eq!(ConceptId::new("bogus").origin(), None);
    }

    #[test]
    fn long_rejects_floating_values() {
        assert!(DataType::Long.normalize(Value::Double(10.0)).is_err());
        assert!(DataType::Long.normalize(Value::Float(3.0)).is_err());
        assert_eq!(
            DataType::Long.normalize(Value::Integer(3)).expect("widen"),
            Value::Long(3)
        );
    }

    #[test]
    fn double_widens_any_number() {
        assert_eq!(
            DataType::Double.normalize(Value::Long(5)).expect("widen"),
            Value::Double(5.0)
        );
        assert_eq!(
            DataType::Double.normalize(Value::Integer(2)).expect("widen"),
            Value::Double(2.0)
        );
    }

    #[test]
    fn float_narrows_finite_doubles() {
        assert_eq!(
            DataType::Float.normalize(Value::from(1.5)).expect("narrow"),
            Value::Float(1.5)
        );
        assert_eq!(
            DataType::Float.normalize(Value::from(2.5_f32)).expect("same type"),
            Value::Float(2.5)
        );
        assert!(DataType::Float.normalize(Value::Double(f64::MAX)).is_err());
        assert!(DataType::Float.normalize(Value::Double(f64::NAN)).is_err());
    }

    #[test]
    fn integer_rejects_out_of_range_long() {
        assert!(DataType::Integer.normalize(Value::Long(i64::MAX)).is_err());
        assert_eq!(
            DataType::Integer.normalize(Value::Long(12)).expect("narrow"),
            Value::Integer(12)
        );
    }

    #[test]
    fn invalid_value_names_value_and_type() {
        let err = DataType::Boolean
            .normalize(Value::from("yes"))
            .expect_err("string is not boolean");
        let message = err.to_string();
        assert!(message.contains("yes"));
        assert!(message.contains("boolean"));
    }

    #[test]
    fn data_type_names_round_trip() {
        for dt in [
            DataType::String,
            DataType::Boolean,
            DataType::Integer,
            DataType::Long,
            DataType::Float,
            DataType::Double,
            DataType::Date,
        ] {
            assert_eq!(DataType::from_name(dt.name()), Some(dt));
        }
    }
}
