//! CustomResourceDefinitions for the KUDO resources

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceValidation, JSONSchemaProps,
};
use kube::CustomResourceExt;

use crate::types::{Instance, Operator, OperatorVersion};

pub const GROUP: &str = "kudo.dev";
pub const VERSION: &str = "v1beta1";

/// CRDs for Operator, OperatorVersion and Instance
///
/// The schemas accept any object; validation is left to the controller's
/// admission webhook.
pub fn crds() -> Vec<CustomResourceDefinition> {
    [Operator::crd(), OperatorVersion::crd(), Instance::crd()]
        .into_iter()
        .map(with_open_schema)
        .collect()
}

fn with_open_schema(mut crd: CustomResourceDefinition) -> CustomResourceDefinition {
    for version in &mut crd.spec.versions {
        version.schema = Some(CustomResourceValidation {
            open_api_v3_schema: Some(JSONSchemaProps {
                type_: Some("object".to_string()),
                x_kubernetes_preserve_unknown_fields: Some(true),
                ..Default::default()
            }),
        });
    }
    crd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crd_names() {
        let names: Vec<_> = crds()
            .into_iter()
            .map(|crd| crd.metadata.name.unwrap_or_default())
            .collect();
        assert_eq!(
            names,
            vec![
                "operators.kudo.dev",
                "operatorversions.kudo.dev",
                "instances.kudo.dev"
            ]
        );
    }

    #[test]
    fn test_schemas_preserve_unknown_fields() {
        for crd in crds() {
            assert_eq!(crd.spec.group, GROUP);
            assert_eq!(crd.spec.scope, "Namespaced");
            let version = &crd.spec.versions[0];
            assert_eq!(version.name, VERSION);
            let schema = version
                .schema
                .as_ref()
                .and_then(|s| s.open_api_v3_schema.as_ref())
                .unwrap();
            assert_eq!(schema.x_kubernetes_preserve_unknown_fields, Some(true));
        }
    }

    #[test]
    fn test_instance_has_status_subresource() {
        let instance = crds().pop().unwrap();
        let subresources = instance.spec.versions[0].subresources.as_ref().unwrap();
        assert!(subresources.status.is_some());
    }
}
