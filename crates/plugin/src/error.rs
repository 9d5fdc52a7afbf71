//! Plugin error types

use thiserror::Error;

/// Errors raised by the plugin infrastructure itself
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("This binary is a plugin. These are not meant to be executed directly.\nPlease execute the program that consumes these plugins, which will load any plugins automatically")]
    NotLaunchedByHost,

    #[error("incompatible plugin protocol versions offered by host: {0}")]
    IncompatibleProtocol(String),

    #[error("unknown resource type {0:?}")]
    UnknownResourceType(String),

    #[error("provider is not configured")]
    NotConfigured,

    #[error("failed to decode msgpack value: {0}")]
    MsgpackDecode(#[from] rmpv::decode::Error),

    #[error("failed to encode msgpack value: {0}")]
    MsgpackEncode(#[from] rmpv::encode::Error),

    #[error("failed to decode JSON value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("value does not conform to type {expected}: {detail}")]
    TypeMismatch { expected: String, detail: String },

    #[error("certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for plugin infrastructure operations
pub type PluginResult<T> = Result<T, PluginError>;

impl From<PluginError> for tonic::Status {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::UnknownResourceType(_) => tonic::Status::not_found(err.to_string()),
            PluginError::NotConfigured => tonic::Status::failed_precondition(err.to_string()),
            PluginError::MsgpackDecode(_)
            | PluginError::Json(_)
            | PluginError::TypeMismatch { .. } => tonic::Status::invalid_argument(err.to_string()),
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}
