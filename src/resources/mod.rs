//! Terraform resource types of the provider

mod instance;
mod operator;

pub use instance::InstanceResource;
pub use operator::OperatorResource;

use std::time::Duration;

/// How long handlers wait for an instance plan to finish
pub const INSTANCE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the operator resource waits for the instance it installs
pub const OPERATOR_INSTALL_TIMEOUT: Duration = Duration::from_secs(30);
