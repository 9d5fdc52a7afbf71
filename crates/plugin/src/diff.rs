//! Plan-time view of a resource change

use std::collections::BTreeMap;

use crate::value::Value;

/// Prior and planned values exposed to `customize_diff`
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    prior: Option<BTreeMap<String, Value>>,
    planned: BTreeMap<String, Value>,
}

impl ResourceDiff {
    pub fn new(prior: &Value, planned: Value) -> Self {
        let planned = match planned {
            Value::Object(attrs) => attrs,
            _ => BTreeMap::new(),
        };
        Self {
            prior: prior.as_entries().cloned(),
            planned,
        }
    }

    /// Planned value of an attribute
    pub fn get(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.planned.get(key).unwrap_or(&NULL)
    }

    /// Whether the attribute is planned to change
    pub fn has_change(&self, key: &str) -> bool {
        match &self.prior {
            Some(prior) => prior.get(key).unwrap_or(&Value::Null) != self.get(key),
            None => !self.get(key).is_null(),
        }
    }

    /// Mark an attribute as known only after apply
    pub fn set_new_computed(&mut self, key: &str) {
        self.planned.insert(key.to_string(), Value::Unknown);
    }

    /// Mark each attribute in `keys` as new-computed when `trigger` changes
    pub fn computed_if_changed(&mut self, trigger: &str, keys: &[&str]) {
        if self.has_change(trigger) {
            for key in keys {
                self.set_new_computed(key);
            }
        }
    }

    pub fn into_planned(self) -> Value {
        Value::Object(self.planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_computed_if_changed() {
        let prior = object(&[
            ("parameters", Value::from(BTreeMap::<String, String>::new())),
            ("pods", Value::from(vec!["p-0".to_string()])),
        ]);
        let planned = object(&[
            (
                "parameters",
                Value::from(BTreeMap::from([("A".to_string(), "1".to_string())])),
            ),
            ("pods", Value::from(vec!["p-0".to_string()])),
        ]);

        let mut diff = ResourceDiff::new(&prior, planned);
        diff.computed_if_changed("parameters", &["pods"]);
        assert!(diff.get("pods").is_unknown());
    }

    #[test]
    fn test_unchanged_trigger_keeps_values() {
        let state = object(&[("pods", Value::from(vec!["p-0".to_string()]))]);
        let mut diff = ResourceDiff::new(&state, state.clone());
        diff.computed_if_changed("parameters", &["pods"]);
        assert_eq!(diff.into_planned(), state);
    }
}
