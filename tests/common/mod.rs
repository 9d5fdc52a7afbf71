//! Mock Kubernetes API for the integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::PathBuf;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use terraform_provider_kudo::{KudoClient, KudoMeta};

pub const KUDO_API: &str = "/apis/kudo.dev/v1beta1/namespaces";

pub fn client(server: &MockServer) -> KudoClient {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let config = kube::Config::new(server.uri().parse().unwrap());
    KudoClient::new(kube::Client::try_from(config).unwrap())
}

pub fn meta(server: &MockServer) -> KudoMeta {
    KudoMeta {
        kudo: client(server),
        repo_home: PathBuf::from("/nonexistent/.kudo"),
    }
}

pub fn not_found(name: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("{name} not found"),
        "reason": "NotFound",
        "code": 404
    }))
}

pub fn instance(name: &str, parameters: Value, labels: Value, plan: Option<(&str, &str)>) -> Value {
    let mut instance = json!({
        "apiVersion": "kudo.dev/v1beta1",
        "kind": "Instance",
        "metadata": {"name": name, "namespace": "default", "labels": labels},
        "spec": {
            "operatorVersion": {"name": "zookeeper-3.4.14-0.3.0"},
            "parameters": parameters
        }
    });
    if let Some((status, uid)) = plan {
        instance["status"] = json!({
            "planStatus": {
                "deploy": {
                    "name": "deploy",
                    "status": status,
                    "uid": uid,
                    "message": format!("plan {status}"),
                    "lastUpdatedTimestamp": "2020-06-01T10:00:00Z"
                }
            },
            "aggregatedStatus": {"status": status}
        });
    }
    instance
}

pub fn operator_version() -> Value {
    json!({
        "apiVersion": "kudo.dev/v1beta1",
        "kind": "OperatorVersion",
        "metadata": {"name": "zookeeper-3.4.14-0.3.0", "namespace": "default"},
        "spec": {
            "operator": {"name": "zookeeper", "kind": "Operator"},
            "version": "0.3.0",
            "appVersion": "3.4.14",
            "parameters": [
                {"name": "NODE_COUNT", "default": "3"},
                {"name": "MEMORY", "default": "1Gi"},
                {"name": "ZK_URI", "required": true}
            ]
        }
    })
}

pub fn list(kind: &str, names: &[&str]) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": format!("{kind}List"),
        "metadata": {},
        "items": names
            .iter()
            .map(|n| json!({"metadata": {"name": n, "namespace": "default"}}))
            .collect::<Vec<_>>()
    })
}

pub async fn mount_get(server: &MockServer, url: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(url))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_missing(server: &MockServer, url: &str) {
    Mock::given(method("GET"))
        .and(path(url))
        .respond_with(not_found(url))
        .mount(server)
        .await;
}

/// Empty answer for every child object listing, overridden by [`mount_children`]
pub async fn mount_no_children(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(
            r"^/(api/v1|apis/apps/v1)/namespaces/default/[a-z]+$",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(list("", &[])))
        .with_priority(10)
        .mount(server)
        .await;
}

pub async fn mount_children(server: &MockServer, url: &str, selector: &str, names: &[&str]) {
    Mock::given(method("GET"))
        .and(path(url))
        .and(query_param("labelSelector", selector))
        .respond_with(ResponseTemplate::new(200).set_body_json(list("", names)))
        .with_priority(1)
        .mount(server)
        .await;
}
