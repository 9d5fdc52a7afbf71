//! KUDO custom resources
//!
//! Typed views of the `kudo.dev/v1beta1` Operator, OperatorVersion and
//! Instance resources, the plan status helpers used to follow an Instance
//! through reconciliation, and the CRD manifests that register them.

pub mod schema;
pub mod status;
pub mod types;

pub use schema::{crds, GROUP, VERSION};
pub use status::{ExecutionStatus, PlanStatus};
pub use types::{
    operator_version_name, Instance, InstanceSpec, InstanceStatus, Maintainer, Operator,
    OperatorSpec, OperatorVersion, OperatorVersionSpec, Parameter,
};
