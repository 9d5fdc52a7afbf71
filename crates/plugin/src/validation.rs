//! Configuration validation against a schema

use crate::diagnostics::Diagnostic;
use crate::schema::Schema;
use crate::value::Value;

/// Validate a configuration object
///
/// Unknown values are skipped; they are validated again once known.
pub fn validate_config(schema: &Schema, config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for attr in &schema.attributes {
        let value = config.attr(&attr.name);

        if value.is_unknown() {
            continue;
        }

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required argument {:?}", attr.name))
                        .with_detail(format!(
                            "The argument {:?} is required, but no definition was found.",
                            attr.name
                        ))
                        .with_attribute(&attr.name),
                );
            }
            continue;
        }

        if attr.computed && !attr.optional && !attr.required {
            diagnostics.push(
                Diagnostic::error(format!("Value for unconfigurable attribute {:?}", attr.name))
                    .with_detail("This attribute is computed and cannot be set in configuration.")
                    .with_attribute(&attr.name),
            );
            continue;
        }

        if let Some(validate) = attr.validate {
            if !value.is_wholly_known() {
                continue;
            }
            if let Err(complaint) = validate(value) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for {:?}", attr.name))
                        .with_detail(complaint)
                        .with_attribute(&attr.name),
                );
            }
        }
    }

    diagnostics
}

/// Validator accepting strictly positive numbers
pub fn positive_number(value: &Value) -> Result<(), String> {
    match value.as_f64() {
        Some(n) if n > 0.0 => Ok(()),
        Some(n) => Err(format!("expected a positive number, got {n}")),
        None => Err("expected a number".to_string()),
    }
}

/// Validator accepting non-empty strings
pub fn not_empty(value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some("") => Err("must not be empty".to_string()),
        Some(_) => Ok(()),
        None => Err("expected a string".to_string()),
    }
}
