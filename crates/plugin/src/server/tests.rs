use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::*;
use crate::schema::{Attribute, AttributeType};
use crate::traits::Resource;

/// Objects stored by the fake remote API, keyed by ID
#[derive(Default)]
struct Store {
    objects: Mutex<BTreeMap<String, String>>,
}

struct Widget;

#[async_trait]
impl Resource<Store> for Widget {
    fn schema(&self) -> Schema {
        Schema::new()
            .with_attribute(Attribute::required_string("name"))
            .with_attribute(Attribute::optional_string("color").default_value("blue"))
            .with_attribute(Attribute::string_map("parameters").optional())
            .with_attribute(Attribute::computed_string_list("parts"))
    }

    async fn create(&self, data: &mut ResourceData, meta: &Store) -> Result<()> {
        let name = data.get_str("name");
        if name == "broken" {
            bail!("widget {name} cannot be built");
        }
        meta.objects
            .lock()
            .unwrap()
            .insert(name.clone(), data.get_str("color"));
        data.set_id(name);
        self.read(data, meta).await
    }

    async fn read(&self, data: &mut ResourceData, meta: &Store) -> Result<()> {
        let color = meta.objects.lock().unwrap().get(&data.id()).cloned();
        match color {
            Some(color) => {
                data.set("color", color);
                data.set("parts", vec![format!("{}-0", data.id())]);
            }
            None => data.set_id(""),
        }
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData, meta: &Store) -> Result<()> {
        meta.objects
            .lock()
            .unwrap()
            .insert(data.id(), data.get_str("color"));
        self.read(data, meta).await
    }

    async fn delete(&self, data: &mut ResourceData, meta: &Store) -> Result<()> {
        meta.objects.lock().unwrap().remove(&data.id());
        Ok(())
    }

    async fn exists(&self, data: &ResourceData, meta: &Store) -> Result<bool> {
        Ok(meta.objects.lock().unwrap().contains_key(&data.id()))
    }

    fn customize_diff(&self, diff: &mut ResourceDiff) -> Result<()> {
        diff.computed_if_changed("parameters", &["parts"]);
        Ok(())
    }

    fn import(&self, id: &str) -> Result<ResourceData> {
        let mut data = ResourceData::default();
        data.set_id(id);
        Ok(data)
    }
}

struct WidgetProvider;

#[async_trait]
impl Provider for WidgetProvider {
    type Meta = Store;

    fn schema(&self) -> Schema {
        Schema::new().with_attribute(
            Attribute::new("endpoint", AttributeType::String)
                .optional()
                .default_value("http://localhost"),
        )
    }

    fn resources(&self) -> ResourceMap<Store> {
        let mut resources: ResourceMap<Store> = BTreeMap::new();
        resources.insert("test_widget".to_string(), Box::new(Widget));
        resources
    }

    async fn configure(&self, config: &ResourceData, _terraform_version: &str) -> Result<Store> {
        if config.get_str("endpoint").is_empty() {
            bail!("endpoint must be set");
        }
        Ok(Store::default())
    }
}

fn widget_schema() -> Schema {
    Widget.schema().with_id()
}

fn dynamic(value: &Value) -> Option<DynamicValue> {
    encode(value, &widget_schema()).unwrap()
}

fn object(entries: &[(&str, Value)]) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

fn decoded(value: Option<DynamicValue>) -> Value {
    decode(value.as_ref(), &widget_schema()).unwrap()
}

async fn configured() -> ProviderService<WidgetProvider> {
    let service = ProviderService::new(WidgetProvider);
    let response = service
        .configure(tonic::Request::new(tfplugin5::configure::Request {
            terraform_version: "1.5.7".to_string(),
            config: encode(&Value::Null, &WidgetProvider.schema()).unwrap(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty());
    service
}

async fn plan(
    service: &ProviderService<WidgetProvider>,
    prior: &Value,
    config: &Value,
) -> tfplugin5::plan_resource_change::Response {
    service
        .plan_resource_change(tonic::Request::new(tfplugin5::plan_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: dynamic(prior),
            proposed_new_state: dynamic(config),
            config: dynamic(config),
            prior_private: Vec::new(),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner()
}

async fn apply(
    service: &ProviderService<WidgetProvider>,
    prior: &Value,
    planned: &Value,
) -> tfplugin5::apply_resource_change::Response {
    service
        .apply_resource_change(tonic::Request::new(
            tfplugin5::apply_resource_change::Request {
                type_name: "test_widget".to_string(),
                prior_state: dynamic(prior),
                planned_state: dynamic(planned),
                config: dynamic(planned),
                planned_private: Vec::new(),
                provider_meta: None,
            },
        ))
        .await
        .unwrap()
        .into_inner()
}

#[tokio::test]
async fn test_schema_includes_id() {
    let service = ProviderService::new(WidgetProvider);
    let response = service
        .get_schema(tonic::Request::new(tfplugin5::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    let widget = &response.resource_schemas["test_widget"];
    let names: Vec<_> = widget
        .block
        .as_ref()
        .unwrap()
        .attributes
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(names, vec!["color", "id", "name", "parameters", "parts"]);
    assert!(response.data_source_schemas.is_empty());
}

#[tokio::test]
async fn test_apply_requires_configure() {
    let service = ProviderService::new(WidgetProvider);
    let planned = object(&[("name", Value::from("gear"))]);

    let status = service
        .apply_resource_change(tonic::Request::new(
            tfplugin5::apply_resource_change::Request {
                type_name: "test_widget".to_string(),
                prior_state: dynamic(&Value::Null),
                planned_state: dynamic(&planned),
                config: dynamic(&planned),
                planned_private: Vec::new(),
                provider_meta: None,
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::FailedPrecondition);
}

#[tokio::test]
async fn test_create_lifecycle() {
    let service = configured().await;
    let config = object(&[("name", Value::from("gear"))]);

    let planned = plan(&service, &Value::Null, &config).await;
    assert!(planned.legacy_type_system);
    let planned = decoded(planned.planned_state);
    assert_eq!(planned.attr("color"), &Value::from("blue"));
    assert!(planned.attr("id").is_unknown());
    assert!(planned.attr("parts").is_unknown());

    let applied = apply(&service, &Value::Null, &planned).await;
    assert!(applied.diagnostics.is_empty());
    let state = decoded(applied.new_state);
    assert_eq!(state.attr("id"), &Value::from("gear"));
    assert_eq!(state.attr("parts"), &Value::from(vec!["gear-0".to_string()]));

    // Destroy plans pass through, applying them removes the object
    let destroy = plan(&service, &state, &Value::Null).await;
    assert!(decoded(destroy.planned_state).is_null());
    let deleted = apply(&service, &state, &Value::Null).await;
    assert!(decoded(deleted.new_state).is_null());
}

#[tokio::test]
async fn test_failed_create_reports_diagnostic() {
    let service = configured().await;
    let config = object(&[("name", Value::from("broken"))]);
    let planned = decoded(plan(&service, &Value::Null, &config).await.planned_state);

    let applied = apply(&service, &Value::Null, &planned).await;
    assert_eq!(applied.diagnostics.len(), 1);
    assert!(applied.diagnostics[0].summary.contains("cannot be built"));
    assert!(decoded(applied.new_state).is_null());
}

#[tokio::test]
async fn test_plan_update() {
    let service = configured().await;
    let config = object(&[("name", Value::from("gear"))]);
    let planned = decoded(plan(&service, &Value::Null, &config).await.planned_state);
    let state = decoded(apply(&service, &Value::Null, &planned).await.new_state);

    // Unchanged configuration keeps computed values
    let unchanged = plan(&service, &state, &config).await;
    assert!(unchanged.requires_replace.is_empty());
    assert_eq!(decoded(unchanged.planned_state), state);

    // A parameters change recomputes the parts list
    let with_params = object(&[
        ("name", Value::from("gear")),
        (
            "parameters",
            Value::from(BTreeMap::from([("SIZE".to_string(), "L".to_string())])),
        ),
    ]);
    let updated = decoded(plan(&service, &state, &with_params).await.planned_state);
    assert!(updated.attr("parts").is_unknown());
    assert_eq!(updated.attr("id"), &Value::from("gear"));

    // Renaming is planned in place
    let renamed = object(&[("name", Value::from("cog"))]);
    let renamed = plan(&service, &state, &renamed).await;
    assert!(renamed.requires_replace.is_empty());
    assert_eq!(decoded(renamed.planned_state).attr("id"), &Value::from("gear"));
}

#[tokio::test]
async fn test_read_gone_resource_returns_null() {
    let service = configured().await;
    let state = object(&[
        ("id", Value::from("missing")),
        ("name", Value::from("missing")),
    ]);

    let response = service
        .read_resource(tonic::Request::new(tfplugin5::read_resource::Request {
            type_name: "test_widget".to_string(),
            current_state: dynamic(&state),
            private: Vec::new(),
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty());
    assert!(decoded(response.new_state).is_null());
}

#[tokio::test]
async fn test_import_sets_id() {
    let service = configured().await;
    let response = service
        .import_resource_state(tonic::Request::new(
            tfplugin5::import_resource_state::Request {
                type_name: "test_widget".to_string(),
                id: "gear".to_string(),
            },
        ))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.imported_resources.len(), 1);
    let state = decoded(response.imported_resources[0].state.clone());
    assert_eq!(state.attr("id"), &Value::from("gear"));
}

#[tokio::test]
async fn test_unknown_resource_type() {
    let service = configured().await;
    let status = service
        .validate_resource_type_config(tonic::Request::new(
            tfplugin5::validate_resource_type_config::Request {
                type_name: "test_gadget".to_string(),
                config: None,
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::NotFound);
}

#[tokio::test]
async fn test_data_sources_are_rejected() {
    let service = configured().await;
    let response = service
        .read_data_source(tonic::Request::new(tfplugin5::read_data_source::Request {
            type_name: "test_widget".to_string(),
            config: None,
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_upgrade_drops_unknown_attributes() {
    let service = configured().await;
    let response = service
        .upgrade_resource_state(tonic::Request::new(
            tfplugin5::upgrade_resource_state::Request {
                type_name: "test_widget".to_string(),
                version: 0,
                raw_state: Some(tfplugin5::RawState {
                    json: br#"{"id":"gear","name":"gear","legacy":"x"}"#.to_vec(),
                    flatmap: Default::default(),
                }),
            },
        ))
        .await
        .unwrap()
        .into_inner();

    let state = decoded(response.upgraded_state);
    assert_eq!(state.attr("name"), &Value::from("gear"));
    assert!(state.attr("legacy").is_null());
}

#[tokio::test]
async fn test_controller_shutdown_notifies() {
    let shutdown = Arc::new(Notify::new());
    let ctl = Controller::new(shutdown.clone());
    ctl
        .shutdown(tonic::Request::new(controller::Empty {}))
        .await
        .unwrap();
    // The permit is stored, so a later waiter completes immediately
    shutdown.notified().await;
}
