mod common;

use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use kudo_tfplugin::{Resource, ResourceData, Value};
use terraform_provider_kudo::resources::InstanceResource;

const INSTANCE: &str = "/apis/kudo.dev/v1beta1/namespaces/default/instances/zk";
const OPERATOR_VERSION: &str =
    "/apis/kudo.dev/v1beta1/namespaces/default/operatorversions/zookeeper-3.4.14-0.3.0";
const PODS: &str = "/api/v1/namespaces/default/pods";
const STATEFULSETS: &str = "/apis/apps/v1/namespaces/default/statefulsets";
const PVCS: &str = "/api/v1/namespaces/default/persistentvolumeclaims";

fn pvc(name: &str) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "metadata": {"name": name, "namespace": "default"}
    })
}

fn state(parameters: &[(&str, &str)]) -> ResourceData {
    let parameters: BTreeMap<String, String> = parameters
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut data = ResourceData::default();
    data.set("name", "zk");
    data.set("namespace", "default");
    data.set("operator_version_name", "zookeeper-3.4.14-0.3.0");
    data.set("operator_version_namespace", "default");
    data.set("labels", BTreeMap::from([("team".to_string(), "data".to_string())]));
    data.set("parameters", parameters);
    data.set("cleanup_pvcs", true);
    data
}

#[tokio::test]
async fn test_read_mirrors_instance() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        INSTANCE,
        instance(
            "zk",
            json!({"NODE_COUNT": "5", "ZK_URI": "zk:2181"}),
            json!({"team": "data"}),
            Some(("COMPLETE", "a1")),
        ),
    )
    .await;
    mount_get(&server, OPERATOR_VERSION, operator_version()).await;
    mount_no_children(&server).await;
    mount_children(&server, PODS, "instance=zk", &["zk-0", "zk-1"]).await;
    mount_children(&server, PODS, "kudo.dev/instance=zk", &["zk-1", "zk-2"]).await;
    mount_children(&server, STATEFULSETS, "kudo.dev/instance=zk", &["zk"]).await;

    let mut data = state(&[]);
    InstanceResource.read(&mut data, &meta(&server)).await.unwrap();

    assert_eq!(data.id(), "default_zk");
    assert_eq!(data.get_string_list("pods"), vec!["zk-0", "zk-1", "zk-2"]);
    assert_eq!(data.get_string_list("statefulsets"), vec!["zk"]);
    assert!(data.get_string_list("services").is_empty());
    assert!(data.get_string_list("pvcs").is_empty());
    assert_eq!(
        data.get_string_map("parameters"),
        BTreeMap::from([
            ("NODE_COUNT".to_string(), "5".to_string()),
            ("ZK_URI".to_string(), "zk:2181".to_string()),
        ])
    );
    assert_eq!(
        data.get_string_map("output_parameters"),
        BTreeMap::from([
            ("MEMORY".to_string(), "1Gi".to_string()),
            ("NODE_COUNT".to_string(), "5".to_string()),
            ("ZK_URI".to_string(), "zk:2181".to_string()),
        ])
    );
    assert_eq!(data.get_str("operator_version_namespace"), "default");
}

#[tokio::test]
async fn test_read_missing_instance_is_gone() {
    let server = MockServer::start().await;
    mount_missing(&server, INSTANCE).await;

    let mut data = state(&[]);
    data.set_id("default_zk");
    InstanceResource.read(&mut data, &meta(&server)).await.unwrap();
    assert!(data.is_gone());
    assert!(!InstanceResource.exists(&data, &meta(&server)).await.unwrap());
}

#[tokio::test]
async fn test_read_missing_operator_version_fails() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        INSTANCE,
        instance("zk", json!({}), json!({}), Some(("COMPLETE", "a1"))),
    )
    .await;
    mount_missing(&server, OPERATOR_VERSION).await;

    let err = InstanceResource
        .read(&mut state(&[]), &meta(&server))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Could not find OV"));
}

#[tokio::test]
async fn test_update_without_changes_does_not_patch() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        INSTANCE,
        instance(
            "zk",
            json!({"NODE_COUNT": "5"}),
            json!({"team": "data"}),
            Some(("COMPLETE", "a1")),
        ),
    )
    .await;
    mount_get(&server, OPERATOR_VERSION, operator_version()).await;
    mount_no_children(&server).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut data = state(&[("NODE_COUNT", "5")]);
    InstanceResource.update(&mut data, &meta(&server)).await.unwrap();
    assert_eq!(data.id(), "default_zk");
    assert_eq!(data.get("labels"), &Value::from(BTreeMap::from([(
        "team".to_string(),
        "data".to_string()
    )])));
}

#[tokio::test]
async fn test_label_change_patches_without_waiting() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        INSTANCE,
        instance(
            "zk",
            json!({"NODE_COUNT": "5"}),
            json!({"team": "data"}),
            Some(("COMPLETE", "a1")),
        ),
    )
    .await;
    mount_get(&server, OPERATOR_VERSION, operator_version()).await;
    mount_no_children(&server).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            json!({"NODE_COUNT": "5"}),
            json!({"team": "search"}),
            Some(("COMPLETE", "a1")),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut data = state(&[("NODE_COUNT", "5")]);
    data.set("labels", BTreeMap::from([("team".to_string(), "search".to_string())]));
    InstanceResource.update(&mut data, &meta(&server)).await.unwrap();
}

#[tokio::test]
async fn test_create_waits_for_deploy_then_reads() {
    let server = MockServer::start().await;
    let parameters = json!({"ZK_URI": "zk:2181"});
    Mock::given(method("POST"))
        .and(path("/apis/kudo.dev/v1beta1/namespaces/default/instances"))
        .and(body_partial_json(json!({
            "metadata": {"name": "zk", "namespace": "default", "labels": {"team": "data"}},
            "spec": {
                "operatorVersion": {"name": "zookeeper-3.4.14-0.3.0", "namespace": "default"},
                "parameters": parameters
            }
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(instance("zk", parameters.clone(), json!({}), None)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(INSTANCE))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            parameters.clone(),
            json!({"team": "data"}),
            Some(("IN_PROGRESS", "a1")),
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        INSTANCE,
        instance("zk", parameters.clone(), json!({"team": "data"}), Some(("COMPLETE", "a1"))),
    )
    .await;
    mount_get(&server, OPERATOR_VERSION, operator_version()).await;
    mount_no_children(&server).await;
    mount_children(&server, PODS, "kudo.dev/instance=zk", &["zk-0"]).await;

    let mut data = state(&[("ZK_URI", "zk:2181")]);
    InstanceResource.create(&mut data, &meta(&server)).await.unwrap();

    assert_eq!(data.id(), "default_zk");
    assert_eq!(data.get_string_list("pods"), vec!["zk-0"]);
    assert_eq!(data.get_string_map("output_parameters")["NODE_COUNT"], "3");
}

#[tokio::test]
async fn test_parameter_change_waits_for_new_plan() {
    let server = MockServer::start().await;
    // The update lookup and the first polls still see the plan that ran before the patch
    Mock::given(method("GET"))
        .and(path(INSTANCE))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            json!({"NODE_COUNT": "5"}),
            json!({"team": "data"}),
            Some(("COMPLETE", "a1")),
        )))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(INSTANCE))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            json!({"NODE_COUNT": "7"}),
            json!({"team": "data"}),
            Some(("IN_PROGRESS", "b2")),
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        INSTANCE,
        instance(
            "zk",
            json!({"NODE_COUNT": "7"}),
            json!({"team": "data"}),
            Some(("COMPLETE", "b2")),
        ),
    )
    .await;
    mount_get(&server, OPERATOR_VERSION, operator_version()).await;
    mount_no_children(&server).await;
    Mock::given(method("PATCH"))
        .and(path(INSTANCE))
        .and(body_partial_json(json!({
            "spec": {
                "parameters": {"NODE_COUNT": "7"},
                "operatorVersion": {"name": "zookeeper-3.4.14-0.3.0"}
            },
            "metadata": {"labels": {"team": "data"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            json!({"NODE_COUNT": "7"}),
            json!({"team": "data"}),
            Some(("COMPLETE", "a1")),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut data = state(&[("NODE_COUNT", "7")]);
    InstanceResource.update(&mut data, &meta(&server)).await.unwrap();

    assert_eq!(data.get_string_map("parameters")["NODE_COUNT"], "7");
    assert_eq!(data.get_string_map("output_parameters")["NODE_COUNT"], "7");
}

#[tokio::test]
async fn test_delete_waits_and_cleans_up_pvcs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCE))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            json!({}),
            json!({}),
            Some(("COMPLETE", "a1")),
        )))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_missing(&server, INSTANCE).await;
    Mock::given(method("DELETE"))
        .and(path(INSTANCE))
        .and(body_partial_json(json!({"propagationPolicy": "Foreground"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance(
            "zk",
            json!({}),
            json!({}),
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let live = format!("{PVCS}/data-zk-0");
    Mock::given(method("GET"))
        .and(path(live.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(pvc("data-zk-0")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_missing(&server, &live).await;
    Mock::given(method("DELETE"))
        .and(path(live.as_str()))
        .and(body_partial_json(json!({"propagationPolicy": "Foreground"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(pvc("data-zk-0")))
        .expect(1)
        .mount(&server)
        .await;

    let already_gone = format!("{PVCS}/data-zk-1");
    mount_missing(&server, &already_gone).await;
    Mock::given(method("DELETE"))
        .and(path(already_gone.as_str()))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut data = state(&[]);
    data.set_id("default_zk");
    data.set("pvcs", vec!["data-zk-0".to_string(), "data-zk-1".to_string()]);
    InstanceResource.delete(&mut data, &meta(&server)).await.unwrap();
}

#[tokio::test]
async fn test_delete_keeps_pvcs_without_cleanup() {
    let server = MockServer::start().await;
    mount_missing(&server, INSTANCE).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PVCS}/data-zk-0").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(pvc("data-zk-0")))
        .expect(0)
        .mount(&server)
        .await;

    let mut data = state(&[]);
    data.set_id("default_zk");
    data.set("cleanup_pvcs", false);
    data.set("pvcs", vec!["data-zk-0".to_string()]);
    InstanceResource.delete(&mut data, &meta(&server)).await.unwrap();
}
