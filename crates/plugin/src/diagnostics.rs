//! Diagnostics reported back to Terraform

use crate::proto::tfplugin5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A user-facing error or warning, optionally tied to an attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: String::new(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Build an error diagnostic from an error chain
    pub fn from_error(err: &anyhow::Error) -> Self {
        let detail = err
            .chain()
            .skip(1)
            .map(|cause| cause.to_string())
            .collect::<Vec<_>>()
            .join(": ");
        Self::error(err.to_string()).with_detail(detail)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn to_proto(&self) -> tfplugin5::Diagnostic {
        let severity = match self.severity {
            Severity::Error => tfplugin5::diagnostic::Severity::Error,
            Severity::Warning => tfplugin5::diagnostic::Severity::Warning,
        };
        let attribute = self.attribute.as_ref().map(|name| attribute_path(name));

        tfplugin5::Diagnostic {
            severity: severity as i32,
            summary: self.summary.clone(),
            detail: self.detail.clone(),
            attribute,
        }
    }
}

/// Path to a top-level attribute
pub fn attribute_path(name: &str) -> tfplugin5::AttributePath {
    use tfplugin5::attribute_path::{step::Selector, Step};

    tfplugin5::AttributePath {
        steps: vec![Step {
            selector: Some(Selector::AttributeName(name.to_string())),
        }],
    }
}

/// Convert a diagnostic list to its wire form
pub fn to_proto(diagnostics: &[Diagnostic]) -> Vec<tfplugin5::Diagnostic> {
    diagnostics.iter().map(Diagnostic::to_proto).collect()
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
