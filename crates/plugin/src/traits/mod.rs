//! Provider and resource traits

pub mod provider;
pub mod resource;

// Re-export main types for convenience
pub use provider::*;
pub use resource::*;
