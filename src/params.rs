use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::FluentDbError;
use crate::types::{DbType, ParameterDirection, RowValues};

const NAME_SIGILS: &[char] = &['@', ':', '$'];

/// Strip one leading `@`, `:` or `$` from a parameter name.
#[must_use]
pub fn normalize_parameter_name(name: &str) -> &str {
    name.strip_prefix(NAME_SIGILS).unwrap_or(name)
}

/// Compare two parameter (or column) names the way the bag does.
#[must_use]
pub fn parameter_names_match(left: &str, right: &str) -> bool {
    normalize_parameter_name(left).eq_ignore_ascii_case(normalize_parameter_name(right))
}

/// One entry of a session's parameter bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: RowValues,
    pub db_type: DbType,
    pub direction: ParameterDirection,
    pub size: Option<u32>,
}

impl Parameter {
    /// Input parameter whose type is inferred from the value.
    #[must_use]
    pub fn input(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            db_type: value.infer_db_type(),
            value,
            direction: ParameterDirection::Input,
            size: None,
        }
    }

    /// Output parameter with no initial value.
    #[must_use]
    pub fn output(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            value: RowValues::Null,
            db_type,
            direction: ParameterDirection::Output,
            size: None,
        }
    }

    /// Name without its leading sigil.
    #[must_use]
    pub fn key(&self) -> &str {
        normalize_parameter_name(&self.name)
    }
}

/// Ordered parameter collection with unique, case-insensitive names.
///
/// Re-adding a name replaces the existing entry in place:
/// ```rust
/// use sql_fluent::prelude::*;
///
/// let mut bag = ParameterBag::new();
/// bag.upsert(Parameter::input("@id", 1));
/// bag.upsert(Parameter::input("ID", 2));
/// assert_eq!(bag.len(), 1);
/// assert_eq!(bag.get("id").map(|p| &p.value), Some(&RowValues::Int(2)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBag {
    entries: Vec<Parameter>,
}

impl ParameterBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a serializable value (struct or map) into input parameters, one per field.
    ///
    /// # Errors
    /// Returns `FluentDbError::Argument` if the value does not serialize to an object.
    pub fn from_serialize<P: Serialize + ?Sized>(params: &P) -> Result<Self, FluentDbError> {
        let value = serde_json::to_value(params).map_err(|e| {
            FluentDbError::Argument(format!("parameter object could not be serialized: {e}"))
        })?;
        let mut bag = Self::new();
        match value {
            JsonValue::Null => {}
            JsonValue::Object(map) => {
                for (name, field) in map {
                    bag.upsert(Parameter::input(name, RowValues::from_json(field)));
                }
            }
            other => {
                return Err(FluentDbError::Argument(format!(
                    "parameter object must serialize to a struct or map, got {other}"
                )));
            }
        }
        Ok(bag)
    }

    /// Insert or replace a parameter; returns its position.
    pub fn upsert(&mut self, parameter: Parameter) -> usize {
        if let Some(idx) = self.position(&parameter.name) {
            self.entries[idx] = parameter;
            idx
        } else {
            self.entries.push(parameter);
            self.entries.len() - 1
        }
    }

    /// Upsert every entry of `other`, later entries winning.
    pub fn merge(&mut self, other: ParameterBag) {
        for parameter in other.entries {
            self.upsert(parameter);
        }
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|p| parameter_names_match(&p.name, name))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.position(name).map(|idx| &self.entries[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.position(name).map(|idx| &mut self.entries[idx])
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.position(name).map(|idx| self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.entries.iter()
    }

    /// Whether any entry expects a value written back by the database.
    #[must_use]
    pub fn has_outputs(&self) -> bool {
        self.entries.iter().any(|p| p.direction.is_output())
    }

    /// Entries the caller supplies values for, in bag order.
    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter().filter(|p| p.direction.is_input())
    }

    /// Entries the database writes back, in bag order.
    pub fn outputs(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter().filter(|p| p.direction.is_output())
    }
}

impl<'a> IntoIterator for &'a ParameterBag {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for ParameterBag {
    type Item = Parameter;
    type IntoIter = std::vec::IntoIter<Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<Parameter> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut bag = Self::new();
        for parameter in iter {
            bag.upsert(parameter);
        }
        bag
    }
}
