//! Resource data handed to CRUD handlers

use std::collections::BTreeMap;

use crate::schema::{Schema, ID_ATTRIBUTE};
use crate::value::Value;

/// Attribute values of one resource instance
///
/// Handlers read configuration through the getters and write back whatever
/// they observed remotely with [`ResourceData::set`]. An empty ID after a
/// handler returns means the resource does not exist.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    values: BTreeMap<String, Value>,
    prior: Option<BTreeMap<String, Value>>,
}

impl ResourceData {
    /// Data built from a single object value (state or configuration)
    pub fn from_value(value: &Value) -> Self {
        Self {
            values: value.as_entries().cloned().unwrap_or_default(),
            prior: None,
        }
    }

    /// Data for an update: planned values compared against the prior state
    pub fn from_change(prior: &Value, planned: &Value) -> Self {
        Self {
            values: planned.as_entries().cloned().unwrap_or_default(),
            prior: prior.as_entries().cloned(),
        }
    }

    /// Value of an attribute, `Null` when unset
    pub fn get(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(key).unwrap_or(&NULL)
    }

    /// Value of an attribute when it is set to something other than its zero value
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        let value = self.get(key);
        (!value.is_zero()).then_some(value)
    }

    /// String attribute, empty when unset
    pub fn get_str(&self, key: &str) -> String {
        self.get(key).as_str().unwrap_or_default().to_string()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.get(key).as_i64().unwrap_or(0)
    }

    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key).to_string_map()
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key).to_string_list()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn id(&self) -> String {
        self.get_str(ID_ATTRIBUTE)
    }

    /// Set the resource ID; an empty ID marks the resource as gone
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if id.is_empty() {
            self.values.insert(ID_ATTRIBUTE.to_string(), Value::Null);
        } else {
            self.values
                .insert(ID_ATTRIBUTE.to_string(), Value::String(id));
        }
    }

    pub fn is_gone(&self) -> bool {
        self.id().is_empty()
    }

    /// Whether an attribute differs from the prior state
    pub fn has_change(&self, key: &str) -> bool {
        match &self.prior {
            Some(prior) => prior.get(key).unwrap_or(&Value::Null) != self.get(key),
            None => !self.get(key).is_null(),
        }
    }

    /// Render the data as a state object for the schema; unknowns become null
    pub fn to_state(&self, schema: &Schema) -> Value {
        Value::Object(
            schema
                .attributes
                .iter()
                .map(|attr| {
                    let value = self.get(&attr.name).clone().unknowns_to_null();
                    (attr.name.clone(), value)
                })
                .collect(),
        )
    }
}
