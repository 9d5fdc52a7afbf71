//! Schema declarations for providers and resources

use std::collections::BTreeMap;
use std::fmt;

use crate::proto::tfplugin5;
use crate::value::Value;

/// Name of the implicit identifier attribute every resource carries
pub const ID_ATTRIBUTE: &str = "id";

/// cty type of an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Bool,
    Number,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list_of(elem: AttributeType) -> Self {
        AttributeType::List(Box::new(elem))
    }

    pub fn map_of(elem: AttributeType) -> Self {
        AttributeType::Map(Box::new(elem))
    }

    /// JSON type expression used in the wire schema
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Bool => json!("bool"),
            AttributeType::Number => json!("number"),
            AttributeType::List(elem) => json!(["list", elem.to_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_json()]),
            AttributeType::Object(attrs) => {
                let attrs: serde_json::Map<String, serde_json::Value> = attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                json!(["object", attrs])
            }
        }
    }

    /// Parse a raw environment string into a value of this type
    fn parse_env(&self, raw: &str) -> Option<Value> {
        match self {
            AttributeType::String => Some(Value::String(raw.to_string())),
            AttributeType::Bool => match raw.to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => Some(Value::Bool(true)),
                "0" | "f" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            AttributeType::Number => raw.parse::<f64>().ok().map(Value::Number),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Default applied when the configuration leaves an attribute null
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed value
    Static(Value),

    /// The first set environment variable in `vars`, otherwise `fallback`
    Env {
        vars: Vec<&'static str>,
        fallback: Value,
    },
}

impl DefaultValue {
    /// Resolve the default for an attribute of the given type
    pub fn resolve(&self, ty: &AttributeType) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Env { vars, fallback } => vars
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find_map(|raw| ty.parse_env(&raw))
                .unwrap_or_else(|| fallback.clone()),
        }
    }
}

/// Attribute validator returning a human readable complaint
pub type ValidateFn = fn(&Value) -> Result<(), String>;

/// A single schema attribute
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub default: Option<DefaultValue>,
    pub validate: Option<ValidateFn>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            default: None,
            validate: None,
        }
    }

    pub fn required_string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String).required()
    }

    pub fn optional_string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String).optional()
    }

    pub fn optional_bool(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Bool).optional()
    }

    pub fn string_map(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::map_of(AttributeType::String))
    }

    pub fn computed_string_list(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::list_of(AttributeType::String)).computed()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn env_default(mut self, vars: &[&'static str], fallback: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Env {
            vars: vars.to_vec(),
            fallback: fallback.into(),
        });
        self
    }

    pub fn validate_with(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Default for this attribute, `Null` when none is declared
    pub fn default_for_null(&self) -> Value {
        self.default
            .as_ref()
            .map(|d| d.resolve(&self.ty))
            .unwrap_or(Value::Null)
    }

    fn to_proto(&self) -> tfplugin5::schema::Attribute {
        tfplugin5::schema::Attribute {
            name: self.name.clone(),
            r#type: self.ty.to_json().to_string().into_bytes(),
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            description_kind: tfplugin5::StringKind::Plain as i32,
            deprecated: false,
        }
    }
}

/// Schema of a provider configuration block or a resource
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: i64,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add the computed `id` attribute resources expose, unless declared already
    pub fn with_id(mut self) -> Self {
        if self.attribute(ID_ATTRIBUTE).is_none() {
            self.attributes.push(
                Attribute::new(ID_ATTRIBUTE, AttributeType::String)
                    .optional()
                    .computed(),
            );
        }
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Object type describing a whole value of this schema
    pub fn object_type(&self) -> AttributeType {
        AttributeType::Object(
            self.attributes
                .iter()
                .map(|a| (a.name.clone(), a.ty.clone()))
                .collect(),
        )
    }

    pub fn to_proto(&self) -> tfplugin5::Schema {
        let mut attributes: Vec<_> = self.attributes.iter().map(Attribute::to_proto).collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));

        tfplugin5::Schema {
            version: self.version,
            block: Some(tfplugin5::schema::Block {
                version: self.version,
                attributes,
                block_types: Vec::new(),
                description: String::new(),
                description_kind: tfplugin5::StringKind::Plain as i32,
                deprecated: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_json_encoding() {
        assert_eq!(AttributeType::String.to_json().to_string(), r#""string""#);
        assert_eq!(
            AttributeType::map_of(AttributeType::String)
                .to_json()
                .to_string(),
            r#"["map","string"]"#
        );
        assert_eq!(
            AttributeType::list_of(AttributeType::String)
                .to_json()
                .to_string(),
            r#"["list","string"]"#
        );
    }

    #[test]
    fn test_with_id_is_idempotent() {
        let schema = Schema::new()
            .with_attribute(Attribute::required_string("name"))
            .with_id()
            .with_id();
        assert_eq!(schema.attributes.len(), 2);
        assert!(schema.attribute(ID_ATTRIBUTE).unwrap().computed);
    }

    #[test]
    fn test_env_default_falls_back() {
        let default = DefaultValue::Env {
            vars: vec!["KUDO_TFPLUGIN_TEST_UNSET_VARIABLE"],
            fallback: Value::from("~/.kube/config"),
        };
        assert_eq!(
            default.resolve(&AttributeType::String),
            Value::from("~/.kube/config")
        );
    }

    #[test]
    fn test_env_bool_parsing() {
        assert_eq!(AttributeType::Bool.parse_env("TRUE"), Some(Value::Bool(true)));
        assert_eq!(AttributeType::Bool.parse_env("0"), Some(Value::Bool(false)));
        assert_eq!(AttributeType::Bool.parse_env("maybe"), None);
    }

    #[test]
    fn test_proto_attributes_are_sorted() {
        let schema = Schema::new()
            .with_attribute(Attribute::optional_string("zeta"))
            .with_attribute(Attribute::optional_string("alpha"));
        let proto = schema.to_proto();
        let names: Vec<_> = proto
            .block
            .unwrap()
            .attributes
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
