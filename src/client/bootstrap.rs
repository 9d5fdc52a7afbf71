//! Installing the KUDO controller into the cluster

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams};
use std::time::Duration;
use tracing::{debug, info};

use kudo_init::{controller_selector, manifests, Options, CONTROLLER_NAME};

use super::{KudoClient, POLL_INTERVAL};
use crate::ProviderError;

/// Field manager of the server-side applies
pub const FIELD_MANAGER: &str = "terraform-provider-kudo";

/// Interval between two controller health checks
pub const HEALTH_INTERVAL: Duration = Duration::from_millis(50);

/// How long the controller statefulset gets to become healthy
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(60);

fn pod_is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

fn statefulset_is_healthy(statefulset: &StatefulSet) -> bool {
    statefulset
        .status
        .as_ref()
        .map(|s| s.ready_replicas.unwrap_or(0) == s.current_replicas.unwrap_or(0))
        .unwrap_or(false)
}

impl KudoClient {
    /// Server-side apply every object of the controller installation
    pub async fn install_kudo(&self, opts: &Options) -> Result<()> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        for manifest in manifests(opts)? {
            let api: Api<DynamicObject> = match &manifest.namespace {
                Some(ns) => Api::namespaced_with(self.client.clone(), ns, &manifest.api_resource),
                None => Api::all_with(self.client.clone(), &manifest.api_resource),
            };
            api.patch(&manifest.name, &params, &Patch::Apply(&manifest.object))
                .await
                .with_context(|| format!("Failed to apply {} {}", manifest.kind(), manifest.name))?;
            debug!("Applied {} {}", manifest.kind(), manifest.name);
        }
        info!("KUDO {} installed in namespace {:?}", opts.version, opts.namespace);
        Ok(())
    }

    /// Block until the controller is running and answering
    pub async fn wait_for_controller(&self, namespace: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.poll_controller_pod(namespace))
            .await
            .map_err(|_| ProviderError::Timeout {
                what: format!("KUDO controller in {namespace}"),
                timeout,
            })??;

        tokio::time::timeout(HEALTH_TIMEOUT, self.poll_controller_health(namespace))
            .await
            .map_err(|_| ProviderError::Timeout {
                what: format!("healthy KUDO controller in {namespace}"),
                timeout: HEALTH_TIMEOUT,
            })?;
        info!("KUDO controller in {:?} is ready", namespace);
        Ok(())
    }

    async fn poll_controller_pod(&self, namespace: &str) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&controller_selector());
        loop {
            let list = pods
                .list(&params)
                .await
                .with_context(|| format!("Failed to list KUDO controller pods in {namespace}"))?;
            if list.items.iter().any(pod_is_ready) {
                return Ok(());
            }
            debug!("Waiting for a ready KUDO controller pod in {:?}", namespace);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Lookup errors only delay the check, the controller may still be starting
    async fn poll_controller_health(&self, namespace: &str) {
        let statefulsets: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        loop {
            tokio::time::sleep(HEALTH_INTERVAL).await;
            match statefulsets.get(CONTROLLER_NAME).await {
                Ok(statefulset) if statefulset_is_healthy(&statefulset) => return,
                Ok(_) => {}
                Err(e) => debug!("Error getting KUDO controller: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::StatefulSetStatus;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use rstest::rstest;

    fn pod(ready: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: ready.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_readiness() {
        assert!(pod_is_ready(&pod("True")));
        assert!(!pod_is_ready(&pod("False")));
        assert!(!pod_is_ready(&Pod::default()));
    }

    #[rstest]
    #[case(Some(1), Some(1), true)]
    #[case(Some(0), Some(1), false)]
    #[case(None, Some(1), false)]
    #[case(None, None, true)]
    fn test_statefulset_health(
        #[case] ready: Option<i32>,
        #[case] current: Option<i32>,
        #[case] healthy: bool,
    ) {
        let statefulset = StatefulSet {
            status: Some(StatefulSetStatus {
                ready_replicas: ready,
                current_replicas: current,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(statefulset_is_healthy(&statefulset), healthy);
        assert!(!statefulset_is_healthy(&StatefulSet::default()));
    }
}
