//! Planned state computation

use std::collections::BTreeMap;

use crate::schema::{Schema, ID_ATTRIBUTE};
use crate::value::Value;

/// Configuration with declared defaults filled in for null attributes
pub fn apply_defaults(schema: &Schema, config: &Value) -> Value {
    Value::Object(
        schema
            .attributes
            .iter()
            .map(|attr| {
                let value = config.attr(&attr.name);
                let value = if value.is_null() {
                    attr.default_for_null()
                } else {
                    value.clone()
                };
                (attr.name.clone(), value)
            })
            .collect(),
    )
}

/// Planned state for a new resource
///
/// Computed attributes the configuration leaves null are only known after
/// apply.
pub fn plan_create(schema: &Schema, config: &Value) -> Value {
    let mut planned = entries(apply_defaults(schema, config));

    for attr in &schema.attributes {
        if !attr.computed {
            continue;
        }
        let value = planned.entry(attr.name.clone()).or_default();
        if value.is_null() {
            *value = Value::Unknown;
        }
    }

    Value::Object(planned)
}

/// Planned state for an existing resource
///
/// Computed attributes the configuration leaves null keep their prior value.
pub fn plan_update(schema: &Schema, prior: &Value, config: &Value) -> Value {
    let mut planned = entries(apply_defaults(schema, config));

    for attr in &schema.attributes {
        if !attr.computed {
            continue;
        }
        let value = planned.entry(attr.name.clone()).or_default();
        if value.is_null() {
            *value = prior.attr(&attr.name).clone();
        }
    }

    if let Some(id) = prior.as_entries().and_then(|p| p.get(ID_ATTRIBUTE)) {
        planned.insert(ID_ATTRIBUTE.to_string(), id.clone());
    }

    Value::Object(planned)
}

fn entries(value: Value) -> BTreeMap<String, Value> {
    match value {
        Value::Object(attrs) => attrs,
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeType};

    fn schema() -> Schema {
        Schema::new()
            .with_attribute(Attribute::required_string("operator_name"))
            .with_attribute(
                Attribute::optional_string("operator_namespace").default_value("default"),
            )
            .with_attribute(Attribute::optional_string("operator_version").computed())
            .with_attribute(Attribute::optional_bool("skip_instance").default_value(true))
            .with_attribute(Attribute::new("object_name", AttributeType::String).computed())
            .with_id()
    }

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_plan_create_defaults_and_unknowns() {
        let config = object(&[("operator_name", Value::from("kafka"))]);
        let planned = plan_create(&schema(), &config);

        assert_eq!(planned.attr("operator_namespace"), &Value::from("default"));
        assert_eq!(planned.attr("skip_instance"), &Value::Bool(true));
        assert!(planned.attr("operator_version").is_unknown());
        assert!(planned.attr("object_name").is_unknown());
        assert!(planned.attr("id").is_unknown());
    }

    #[test]
    fn test_plan_create_keeps_configured_computed() {
        let config = object(&[
            ("operator_name", Value::from("kafka")),
            ("operator_version", Value::from("1.3.1")),
        ]);
        let planned = plan_create(&schema(), &config);
        assert_eq!(planned.attr("operator_version"), &Value::from("1.3.1"));
    }

    #[test]
    fn test_plan_update_carries_prior_computed() {
        let prior = object(&[
            ("id", Value::from("kafka-1.3.1_default")),
            ("operator_name", Value::from("kafka")),
            ("operator_namespace", Value::from("default")),
            ("operator_version", Value::from("1.3.1")),
            ("skip_instance", Value::Bool(true)),
            ("object_name", Value::from("kafka-1.3.1")),
        ]);
        let config = object(&[("operator_name", Value::from("kafka"))]);

        let planned = plan_update(&schema(), &prior, &config);
        assert_eq!(planned, prior);
    }
}
