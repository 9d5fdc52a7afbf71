//! Terraform plugin infrastructure
//!
//! Everything a provider binary needs to be launched by Terraform core:
//! the schema model, the cty value codec, the resource data/diff helpers
//! handed to resource handlers, and the tfplugin5 gRPC server behind the
//! go-plugin handshake.

pub mod data;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod plan;
pub mod proto;
pub mod schema;
pub mod server;
pub mod traits;
pub mod validation;
pub mod value;

pub use data::ResourceData;
pub use diagnostics::{Diagnostic, Severity};
pub use diff::ResourceDiff;
pub use error::{PluginError, PluginResult};
pub use schema::{Attribute, AttributeType, DefaultValue, Schema};
pub use server::{serve, ServeOptions};
pub use traits::{Provider, Resource};
pub use value::Value;

// Re-export async_trait for resource implementations
pub use async_trait::async_trait;
