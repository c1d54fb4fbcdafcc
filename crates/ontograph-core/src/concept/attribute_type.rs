//! Attribute types: data types, regex constraints and value-unique attributes.
//!
//! Within one attribute type, values with the same string form collapse to
//! one attribute vertex. Uniqueness rests on the store's atomic
//! unique-property claim on the index `"<label>_<value>"`. Losing the claim
//! to a concurrent writer is not an error: the half-built vertex is deleted
//! and the winner is returned.

use super::{Attribute, AttributeType, ConceptKind, ConceptState, TypedHandle};
use crate::cache::PermanentCache;
use crate::graph::{Claim, GraphStore};
use crate::primitives::attribute_index;
use crate::schema::{BaseType, PropertyKey};
use crate::transaction::Transaction;
use crate::types::{ConceptId, DataType, ElementRef, Label, OntographError, Value};
use regex::Regex;

/// Compile a regex constraint. It must match the whole value.
fn compile(pattern: &str) -> Result<Regex, OntographError> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| OntographError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl<'s, S: GraphStore> Transaction<'s, S> {
    // =========================================================================
    // ATTRIBUTE TYPES
    // =========================================================================

    /// Return the attribute type labelled `label`, creating it if absent.
    ///
    /// The data type is fixed at creation.
    pub fn put_attribute_type(
        &mut self,
        label: &str,
        data_type: DataType,
    ) -> Result<AttributeType, OntographError> {
        let label = Label::new(label);
        if let Some(id) = self.schema_id_by_label(&label)? {
            if self.live(&id)?.kind() == ConceptKind::AttributeType {
                let existing = self.attribute_data_type(&id)?;
                if existing != data_type {
                    return Err(OntographError::DataTypeMismatch {
                        label,
                        existing,
                        requested: data_type,
                    });
                }
                return Ok(AttributeType(id));
            }
        }

        let id = self.put_schema_concept(&label, BaseType::AttributeType, false)?;
        let concept = self.live(&id)?;
        let element = concept.element();
        if let ConceptState::AttributeType(_, state) = &mut concept.state {
            state.data_type = PermanentCache::with(data_type);
        }
        self.store
            .set_property(element, PropertyKey::DataType, Value::from(data_type.name()))?;
        Ok(AttributeType(id))
    }

    pub fn get_attribute_type(&mut self, label: &str) -> Result<Option<AttributeType>, OntographError> {
        self.get_schema(label)
    }

    pub(crate) fn attribute_data_type(&mut self, id: &ConceptId) -> Result<DataType, OntographError> {
        let element = self.live(id)?.element();
        let store = &*self.store;
        let concept = self
            .arena
            .get(id)
            .ok_or_else(|| OntographError::ConceptNotFound(id.clone()))?;
        let ConceptState::AttributeType(_, state) = &concept.state else {
            return Err(OntographError::WrongConceptKind {
                id: id.clone(),
                expected: "attribute type",
                actual: concept.kind().name(),
            });
        };
        state
            .data_type
            .get_or_try_init(|| {
                store
                    .property(element, PropertyKey::DataType)?
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(DataType::from_name)
                    .ok_or(OntographError::CorruptedElement {
                        element,
                        property: PropertyKey::DataType.as_str(),
                    })
            })
            .copied()
    }

    /// The data type of an attribute type. The meta attribute type has none.
    pub fn data_type(&mut self, attribute_type: &AttributeType) -> Result<DataType, OntographError> {
        self.reject_meta(attribute_type.id())?;
        self.attribute_data_type(attribute_type.id())
    }

    // =========================================================================
    // REGEX
    // =========================================================================

    fn regex_of(&mut self, id: &ConceptId) -> Result<Option<String>, OntographError> {
        let concept = self.live(id)?;
        let element = concept.element();
        if let ConceptState::AttributeType(_, state) = &concept.state {
            if let Some(cached) = state.regex.get() {
                return Ok(cached.clone());
            }
        }
        let pattern = match self.store.property(element, PropertyKey::Regex)? {
            Some(Value::String(pattern)) => Some(pattern),
            _ => None,
        };
        if let ConceptState::AttributeType(_, state) = &mut self.live(id)?.state {
            state.regex.set(pattern.clone());
        }
        Ok(pattern)
    }

    /// The regex values of this attribute type must match, if any.
    pub fn regex(&mut self, attribute_type: &AttributeType) -> Result<Option<String>, OntographError> {
        self.regex_of(attribute_type.id())
    }

    /// Constrain string values with a regex, or lift the constraint.
    ///
    /// Every existing instance of the type and its subtypes is checked
    /// before the schema changes; the first mismatch aborts the change.
    pub fn set_regex(
        &mut self,
        attribute_type: &AttributeType,
        pattern: Option<&str>,
    ) -> Result<(), OntographError> {
        let id = attribute_type.id();
        self.reject_meta(id)?;
        let data_type = self.attribute_data_type(id)?;
        if data_type != DataType::String {
            return Err(OntographError::RegexOnNonString {
                label: self.schema_label(id)?,
                data_type,
            });
        }

        let element = self.live(id)?.element();
        match pattern {
            Some(pattern) => {
                let compiled = compile(pattern)?;
                for instance in self.instance_elements(id)? {
                    let Some(attribute) = self.resolve_id(instance)? else {
                        continue;
                    };
                    if let Value::String(value) = self.attribute_value(&attribute)? {
                        if !compiled.is_match(&value) {
                            return Err(OntographError::RegexViolation {
                                pattern: pattern.to_string(),
                                value,
                            });
                        }
                    }
                }
                self.store
                    .set_property(element, PropertyKey::Regex, Value::from(pattern))?;
            }
            None => {
                self.store.remove_property(element, PropertyKey::Regex)?;
            }
        }
        if let ConceptState::AttributeType(_, state) = &mut self.live(id)?.state {
            state.regex.set(pattern.map(str::to_string));
        }
        Ok(())
    }

    /// Check `value` against the regex of the type and of every supertype.
    fn check_regex_chain(&mut self, type_id: &ConceptId, value: &Value) -> Result<(), OntographError> {
        let Value::String(text) = value else {
            return Ok(());
        };
        for ancestor in self.sup_chain(type_id)? {
            if self.live(&ancestor)?.kind() != ConceptKind::AttributeType || self.is_meta(&ancestor)? {
                continue;
            }
            if let Some(pattern) = self.regex_of(&ancestor)? {
                if !compile(&pattern)?.is_match(text) {
                    return Err(OntographError::RegexViolation {
                        pattern,
                        value: text.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // ATTRIBUTES
    // =========================================================================

    /// Return the attribute of `attribute_type` holding `value`, creating it
    /// if absent.
    pub fn put_attribute(
        &mut self,
        attribute_type: &AttributeType,
        value: impl Into<Value>,
    ) -> Result<Attribute, OntographError> {
        self.put_attribute_with(attribute_type.id(), value.into(), false)
    }

    /// Like [`Transaction::put_attribute`], marking a new attribute inferred.
    pub fn put_attribute_inferred(
        &mut self,
        attribute_type: &AttributeType,
        value: impl Into<Value>,
    ) -> Result<Attribute, OntographError> {
        self.put_attribute_with(attribute_type.id(), value.into(), true)
    }

    fn put_attribute_with(
        &mut self,
        type_id: &ConceptId,
        value: Value,
        inferred: bool,
    ) -> Result<Attribute, OntographError> {
        self.reject_meta(type_id)?;
        let data_type = self.attribute_data_type(type_id)?;
        let value = data_type.normalize(value)?;
        self.check_regex_chain(type_id, &value)?;
        let label = self.schema_label(type_id)?;
        let index = attribute_index(label.as_str(), &value.to_string());

        for attempt in 1..=self.config.attribute_merge_attempts {
            if let Some(existing) = self.attribute_by_index(&index)? {
                return Ok(Attribute(existing));
            }

            let id = self.add_instance(type_id, BaseType::Attribute, inferred)?;
            let element = self.live(&id)?.element();
            self.store
                .set_property(element, data_type.value_key(), value.clone())?;
            match self
                .store
                .claim_unique(element.id(), PropertyKey::Index, &index)?
            {
                Claim::Claimed => {
                    if let ConceptState::Attribute(_, state) = &mut self.live(&id)?.state {
                        state.value = PermanentCache::with(value);
                    }
                    return Ok(Attribute(id));
                }
                Claim::Taken(holder) => {
                    tracing::debug!(%index, attempt, "attribute index taken, merging into existing attribute");
                    self.delete_concept_element(&id)?;
                    if let Some(existing) = self.resolve_id(ElementRef::Vertex(holder))? {
                        return Ok(Attribute(existing));
                    }
                }
            }
        }
        Err(OntographError::AttributeMergeFailed(index))
    }

    fn attribute_by_index(&mut self, index: &str) -> Result<Option<ConceptId>, OntographError> {
        match self.store.lookup_unique(PropertyKey::Index, index)? {
            Some(vertex) => self.resolve_id(ElementRef::Vertex(vertex)),
            None => Ok(None),
        }
    }

    /// The attribute of `attribute_type` holding `value`, if any.
    pub fn get_attribute(
        &mut self,
        attribute_type: &AttributeType,
        value: impl Into<Value>,
    ) -> Result<Option<Attribute>, OntographError> {
        let id = attribute_type.id();
        let value = self.attribute_data_type(id)?.normalize(value.into())?;
        let label = self.schema_label(id)?;
        let index = attribute_index(label.as_str(), &value.to_string());
        Ok(self.attribute_by_index(&index)?.map(Attribute))
    }

    /// Attributes of every attribute type whose data type accepts `value`.
    pub fn get_attributes_by_value(
        &mut self,
        value: impl Into<Value>,
    ) -> Result<Vec<Attribute>, OntographError> {
        let value = value.into();
        let mut out = Vec::new();
        for vertex in self
            .store
            .vertices_with_label(BaseType::AttributeType.as_str())?
        {
            let Some(type_id) = self.resolve_id(ElementRef::Vertex(vertex))? else {
                continue;
            };
            if self.is_meta(&type_id)? {
                continue;
            }
            let Ok(normalized) = self.attribute_data_type(&type_id)?.normalize(value.clone()) else {
                continue;
            };
            let label = self.schema_label(&type_id)?;
            let index = attribute_index(label.as_str(), &normalized.to_string());
            if let Some(attribute) = self.attribute_by_index(&index)? {
                out.push(Attribute(attribute));
            }
        }
        Ok(out)
    }

    /// Move the index of every direct instance of `type_id` under `label`.
    pub(crate) fn reindex_attributes(
        &mut self,
        type_id: &ConceptId,
        label: &Label,
    ) -> Result<usize, OntographError> {
        let mut moved = 0;
        for element in self.direct_instance_vertices(type_id)? {
            let Some(attribute) = self.resolve_id(element)? else {
                continue;
            };
            let value = self.attribute_value(&attribute)?;
            self.store.remove_property(element, PropertyKey::Index)?;
            let index = attribute_index(label.as_str(), &value.to_string());
            if let Claim::Taken(_) = self
                .store
                .claim_unique(element.id(), PropertyKey::Index, &index)?
            {
                return Err(OntographError::CorruptedElement {
                    element,
                    property: PropertyKey::Index.as_str(),
                });
            }
            moved += 1;
        }
        Ok(moved)
    }

    pub(crate) fn attribute_value(&mut self, id: &ConceptId) -> Result<Value, OntographError> {
        if let ConceptState::Attribute(_, state) = &self.live(id)?.state {
            if let Some(value) = state.value.get() {
                return Ok(value.clone());
            }
        }
        let type_id = self.thing_type_id(id)?;
        let key = self.attribute_data_type(&type_id)?.value_key();
        let element = self.live(id)?.element();
        let store = &*self.store;
        let concept = self
            .arena
            .get(id)
            .ok_or_else(|| OntographError::ConceptNotFound(id.clone()))?;
        let ConceptState::Attribute(_, state) = &concept.state else {
            return Err(OntographError::WrongConceptKind {
                id: id.clone(),
                expected: Attribute::EXPECTED,
                actual: concept.kind().name(),
            });
        };
        state
            .value
            .get_or_try_init(|| {
                store
                    .property(element, key)?
                    .ok_or(OntographError::CorruptedElement {
                        element,
                        property: key.as_str(),
                    })
            })
            .cloned()
    }

    /// The immutable value of an attribute.
    pub fn value(&mut self, attribute: &Attribute) -> Result<Value, OntographError> {
        self.attribute_value(attribute.id())
    }

    /// The data type of an attribute's value.
    pub fn data_type_of(&mut self, attribute: &Attribute) -> Result<DataType, OntographError> {
        let type_id = self.thing_type_id(attribute.id())?;
        self.attribute_data_type(&type_id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use crate::session::Session;
    use crate::types::{DataType, OntographError, Value};

    #[test]
    fn equal_values_collapse_to_one_attribute() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let date = tx.put_attribute_type("date", DataType::String).expect("type");
        let first = tx.put_attribute(&date, "10/10/10").expect("first");
        let second = tx.put_attribute(&date, "10/10/10").expect("second");
        assert_eq!(first, second);
        assert_eq!(tx.value(&first).expect("value"), Value::from("10/10/10"));
        assert_eq!(tx.get_attribute(&date, "10/10/10").expect("get"), Some(first));
    }

    #[test]
    fn long_types_reject_floating_values() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let age = tx.put_attribute_type("age", DataType::Long).expect("type");
        let err = tx.put_attribute(&age, 4.0_f64).expect_err("float");
        assert!(matches!(
            err,
            OntographError::InvalidValue {
                expected: DataType::Long,
                ..
            }
        ));
        let widened = tx.put_attribute(&age, 4_i32).expect("int widens");
        assert_eq!(tx.value(&widened).expect("value"), Value::Long(4));
    }

    #[test]
    fn double_types_widen_integers() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let weight = tx.put_attribute_type("weight", DataType::Double).expect("type");
        let attribute = tx.put_attribute(&weight, 3_i64).expect("widen");
        assert_eq!(tx.value(&attribute).expect("value"), Value::Double(3.0));
        assert_eq!(tx.data_type_of(&attribute).expect("dt"), DataType::Double);
    }

    #[test]
    fn redeclaring_with_another_data_type_fails() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        tx.put_attribute_type("name", DataType::String).expect("type");
        let err = tx
            .put_attribute_type("name", DataType::Long)
            .expect_err("mismatch");
        assert!(matches!(err, OntographError::DataTypeMismatch { .. }));
    }

    #[test]
    fn regex_only_on_string_types() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let age = tx.put_attribute_type("age", DataType::Long).expect("type");
        assert!(matches!(
            tx.set_regex(&age, Some("[0-9]+")),
            Err(OntographError::RegexOnNonString { .. })
        ));
    }

    #[test]
    fn invalid_regex_is_named() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let name = tx.put_attribute_type("name", DataType::String).expect("type");
        match tx.set_regex(&name, Some("[unclosed")) {
            Err(OntographError::InvalidRegex { pattern, .. }) => assert_eq!(pattern, "[unclosed"),
            other => panic!("expected invalid regex, got {:?}", other),
        }
    }

    #[test]
    fn set_regex_checks_existing_instances_of_subtypes() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let parent = tx.put_attribute_type("parent", DataType::String).expect("parent");
        let child = tx.put_attribute_type("child", DataType::String).expect("child");
        tx.set_sup(&child, &parent).expect("sup");
        tx.put_attribute(&child, "xyz").expect("value");

        let err = tx.set_regex(&parent, Some("[abc]+")).expect_err("violates");
        assert!(matches!(err, OntographError::RegexViolation { .. }));
        assert_eq!(tx.regex(&parent).expect("regex"), None);

        tx.set_regex(&parent, Some("[a-z]+")).expect("matches");
        assert_eq!(tx.regex(&parent).expect("regex").as_deref(), Some("[a-z]+"));
        tx.set_regex(&parent, None).expect("lift");
        assert_eq!(tx.regex(&parent).expect("regex"), None);
    }

    #[test]
    fn attributes_by_value_span_types() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let first = tx.put_attribute_type("first-name", DataType::String).expect("first");
        let last = tx.put_attribute_type("last-name", DataType::String).expect("last");
        let age = tx.put_attribute_type("age", DataType::Long).expect("age");
        let a = tx.put_attribute(&first, "Smith").expect("a");
        let b = tx.put_attribute(&last, "Smith").expect("b");
        tx.put_attribute(&age, 7_i64).expect("age value");

        let found = tx.get_attributes_by_value("Smith").expect("lookup");
        assert_eq!(found.len(), 2);
        assert!(found.contains(&a) && found.contains(&b));
    }

    #[test]
    fn meta_attribute_type_has_no_data_type() {
        let mut session = Session::in_memory().expect("session");
        let mut tx = session.transaction().expect("tx");
        let meta = tx
            .get_attribute_type("attribute")
            .expect("get")
            .expect("meta");
        assert!(matches!(
            tx.data_type(&meta),
            Err(OntographError::MetaTypeImmutable(_))
        ));
    }
}
