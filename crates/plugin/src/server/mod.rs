//! tfplugin5 gRPC server
//!
//! [`ProviderService`] adapts a [`Provider`] and its resources to the
//! Terraform plugin protocol: it decodes the dynamic values Terraform sends,
//! computes plans from the declared schemas, and dispatches applies to the
//! resource lifecycle handlers. [`serve`] performs the go-plugin handshake
//! and runs the service until the host shuts it down.

mod handshake;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tonic::Status;
use tracing::{debug, info, instrument, warn};

use crate::data::ResourceData;
use crate::diagnostics::{self, Diagnostic};
use crate::diff::ResourceDiff;
use crate::error::{PluginError, PluginResult};
use crate::plan;
use crate::proto::controller::{self, grpc_controller_server::GrpcController};
use crate::proto::health::{
    self, health_check_response::ServingStatus, health_server::Health,
};
use crate::proto::tfplugin5::{self, provider_server::Provider as ProviderRpc, DynamicValue};
use crate::schema::Schema;
use crate::traits::{Provider, Resource, ResourceMap};
use crate::validation::validate_config;
use crate::value::Value;

pub use handshake::{serve, ServeOptions, MAX_MESSAGE_SIZE};

type RpcResult<T> = Result<tonic::Response<T>, Status>;

/// Terraform-facing service wrapping a provider implementation
pub struct ProviderService<P: Provider> {
    provider: P,
    provider_schema: Schema,
    resources: ResourceMap<P::Meta>,
    /// Resource schemas including the implicit `id` attribute
    schemas: BTreeMap<String, Schema>,
    meta: RwLock<Option<Arc<P::Meta>>>,
}

impl<P: Provider> ProviderService<P> {
    pub fn new(provider: P) -> Self {
        let provider_schema = provider.schema();
        let resources = provider.resources();
        let schemas = resources
            .iter()
            .map(|(name, resource)| (name.clone(), resource.schema().with_id()))
            .collect();

        Self {
            provider,
            provider_schema,
            resources,
            schemas,
            meta: RwLock::new(None),
        }
    }

    fn resource(&self, type_name: &str) -> PluginResult<(&dyn Resource<P::Meta>, &Schema)> {
        match (self.resources.get(type_name), self.schemas.get(type_name)) {
            (Some(resource), Some(schema)) => Ok((resource.as_ref(), schema)),
            _ => Err(PluginError::UnknownResourceType(type_name.to_string())),
        }
    }

    async fn meta(&self) -> PluginResult<Arc<P::Meta>> {
        self.meta
            .read()
            .await
            .clone()
            .ok_or(PluginError::NotConfigured)
    }

    /// Plan a create or an in-place update
    fn plan_change(
        resource: &dyn Resource<P::Meta>,
        schema: &Schema,
        prior: &Value,
        config: &Value,
    ) -> anyhow::Result<Value> {
        let planned = if prior.is_null() {
            plan::plan_create(schema, config)
        } else {
            plan::plan_update(schema, prior, config)
        };
        Self::customize(resource, prior, planned)
    }

    fn customize(
        resource: &dyn Resource<P::Meta>,
        prior: &Value,
        planned: Value,
    ) -> anyhow::Result<Value> {
        let mut diff = ResourceDiff::new(prior, planned);
        resource.customize_diff(&mut diff)?;
        Ok(diff.into_planned())
    }
}

fn decode(value: Option<&DynamicValue>, schema: &Schema) -> PluginResult<Value> {
    match value {
        Some(value) => value.decode(&schema.object_type()),
        None => Ok(Value::Null),
    }
}

fn encode(value: &Value, schema: &Schema) -> PluginResult<Option<DynamicValue>> {
    Ok(Some(DynamicValue::encode(value, &schema.object_type())?))
}

fn unsupported_data_source(type_name: &str) -> Vec<tfplugin5::Diagnostic> {
    vec![Diagnostic::error(format!("data source {type_name:?} is not supported"))
        .with_detail("This provider does not implement any data sources.")
        .to_proto()]
}

#[tonic::async_trait]
impl<P: Provider> ProviderRpc for ProviderService<P> {
    async fn get_schema(
        &self,
        _request: tonic::Request<tfplugin5::get_provider_schema::Request>,
    ) -> RpcResult<tfplugin5::get_provider_schema::Response> {
        let resource_schemas = self
            .schemas
            .iter()
            .map(|(name, schema)| (name.clone(), schema.to_proto()))
            .collect();

        Ok(tonic::Response::new(tfplugin5::get_provider_schema::Response {
            provider: Some(self.provider_schema.to_proto()),
            resource_schemas,
            data_source_schemas: Default::default(),
            diagnostics: Vec::new(),
            provider_meta: None,
        }))
    }

    async fn prepare_provider_config(
        &self,
        request: tonic::Request<tfplugin5::prepare_provider_config::Request>,
    ) -> RpcResult<tfplugin5::prepare_provider_config::Response> {
        let request = request.into_inner();
        let schema = &self.provider_schema;
        let config = decode(request.config.as_ref(), schema)?;

        let prepared = plan::apply_defaults(schema, &config);
        let diagnostics = validate_config(schema, &prepared);

        Ok(tonic::Response::new(tfplugin5::prepare_provider_config::Response {
            prepared_config: encode(&prepared, schema)?,
            diagnostics: diagnostics::to_proto(&diagnostics),
        }))
    }

    async fn validate_resource_type_config(
        &self,
        request: tonic::Request<tfplugin5::validate_resource_type_config::Request>,
    ) -> RpcResult<tfplugin5::validate_resource_type_config::Response> {
        let request = request.into_inner();
        let (_, schema) = self.resource(&request.type_name)?;
        let config = decode(request.config.as_ref(), schema)?;

        let diagnostics = validate_config(schema, &config);
        Ok(tonic::Response::new(
            tfplugin5::validate_resource_type_config::Response {
                diagnostics: diagnostics::to_proto(&diagnostics),
            },
        ))
    }

    async fn validate_data_source_config(
        &self,
        request: tonic::Request<tfplugin5::validate_data_source_config::Request>,
    ) -> RpcResult<tfplugin5::validate_data_source_config::Response> {
        let request = request.into_inner();
        Ok(tonic::Response::new(
            tfplugin5::validate_data_source_config::Response {
                diagnostics: unsupported_data_source(&request.type_name),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<tfplugin5::upgrade_resource_state::Request>,
    ) -> RpcResult<tfplugin5::upgrade_resource_state::Response> {
        let request = request.into_inner();
        let (_, schema) = self.resource(&request.type_name)?;

        let raw = request.raw_state.unwrap_or_default();
        if raw.json.is_empty() && !raw.flatmap.is_empty() {
            let diagnostic = Diagnostic::error("Unsupported state format")
                .with_detail("Flatmap state from Terraform 0.11 and earlier cannot be upgraded.");
            return Ok(tonic::Response::new(tfplugin5::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: vec![diagnostic.to_proto()],
            }));
        }

        let state = if raw.json.is_empty() {
            Value::Null
        } else {
            Value::from_json(&raw.json, &schema.object_type())?
        };

        Ok(tonic::Response::new(tfplugin5::upgrade_resource_state::Response {
            upgraded_state: encode(&state, schema)?,
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip(self, request))]
    async fn configure(
        &self,
        request: tonic::Request<tfplugin5::configure::Request>,
    ) -> RpcResult<tfplugin5::configure::Response> {
        let request = request.into_inner();
        let schema = &self.provider_schema;
        let config = plan::apply_defaults(schema, &decode(request.config.as_ref(), schema)?);

        let data = ResourceData::from_value(&config);
        let diagnostics = match self
            .provider
            .configure(&data, &request.terraform_version)
            .await
        {
            Ok(meta) => {
                *self.meta.write().await = Some(Arc::new(meta));
                info!(terraform_version = %request.terraform_version, "Provider configured");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Provider configuration failed");
                vec![Diagnostic::from_error(&e).to_proto()]
            }
        };

        Ok(tonic::Response::new(tfplugin5::configure::Response {
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), fields(type_name = %request.get_ref().type_name))]
    async fn read_resource(
        &self,
        request: tonic::Request<tfplugin5::read_resource::Request>,
    ) -> RpcResult<tfplugin5::read_resource::Response> {
        let request = request.into_inner();
        let (resource, schema) = self.resource(&request.type_name)?;
        let current = decode(request.current_state.as_ref(), schema)?;

        if current.is_null() {
            return Ok(tonic::Response::new(tfplugin5::read_resource::Response {
                new_state: encode(&Value::Null, schema)?,
                diagnostics: Vec::new(),
                private: request.private,
            }));
        }

        let meta = self.meta().await?;
        let mut data = ResourceData::from_value(&current);

        let refreshed = match resource.exists(&data, &meta).await {
            Ok(true) => resource.read(&mut data, &meta).await,
            Ok(false) => {
                debug!(id = %data.id(), "Resource no longer exists");
                data.set_id("");
                Ok(())
            }
            Err(e) => Err(e),
        };

        let (new_state, diagnostics) = match refreshed {
            Ok(()) if data.is_gone() => (Value::Null, Vec::new()),
            Ok(()) => (data.to_state(schema), Vec::new()),
            Err(e) => (current, vec![Diagnostic::from_error(&e).to_proto()]),
        };

        Ok(tonic::Response::new(tfplugin5::read_resource::Response {
            new_state: encode(&new_state, schema)?,
            diagnostics,
            private: request.private,
        }))
    }

    #[instrument(skip(self, request), fields(type_name = %request.get_ref().type_name))]
    async fn plan_resource_change(
        &self,
        request: tonic::Request<tfplugin5::plan_resource_change::Request>,
    ) -> RpcResult<tfplugin5::plan_resource_change::Response> {
        let request = request.into_inner();
        let (resource, schema) = self.resource(&request.type_name)?;

        let prior = decode(request.prior_state.as_ref(), schema)?;
        let proposed = decode(request.proposed_new_state.as_ref(), schema)?;
        let config = decode(request.config.as_ref(), schema)?;

        let mut response = tfplugin5::plan_resource_change::Response {
            planned_state: None,
            requires_replace: Vec::new(),
            planned_private: request.prior_private,
            diagnostics: Vec::new(),
            legacy_type_system: true,
        };

        // Destroy plans pass through untouched
        if proposed.is_null() {
            response.planned_state = encode(&proposed, schema)?;
            return Ok(tonic::Response::new(response));
        }

        match Self::plan_change(resource, schema, &prior, &config) {
            Ok(planned) => {
                response.planned_state = encode(&planned, schema)?;
            }
            Err(e) => {
                response.planned_state = encode(&proposed, schema)?;
                response.diagnostics = vec![Diagnostic::from_error(&e).to_proto()];
            }
        }

        Ok(tonic::Response::new(response))
    }

    #[instrument(skip(self, request), fields(type_name = %request.get_ref().type_name))]
    async fn apply_resource_change(
        &self,
        request: tonic::Request<tfplugin5::apply_resource_change::Request>,
    ) -> RpcResult<tfplugin5::apply_resource_change::Response> {
        let request = request.into_inner();
        let (resource, schema) = self.resource(&request.type_name)?;

        let prior = decode(request.prior_state.as_ref(), schema)?;
        let planned = decode(request.planned_state.as_ref(), schema)?;
        let meta = self.meta().await?;

        let (new_state, diagnostics) = if planned.is_null() {
            let mut data = ResourceData::from_value(&prior);
            info!(id = %data.id(), "Deleting resource");
            match resource.delete(&mut data, &meta).await {
                Ok(()) => (Value::Null, Vec::new()),
                Err(e) => (prior, vec![Diagnostic::from_error(&e)]),
            }
        } else if prior.is_null() {
            let mut data = ResourceData::from_value(&planned);
            info!("Creating resource");
            let result = resource.create(&mut data, &meta).await;
            let state = if data.is_gone() {
                Value::Null
            } else {
                data.to_state(schema)
            };
            match result {
                Ok(()) => (state, Vec::new()),
                Err(e) => (state, vec![Diagnostic::from_error(&e)]),
            }
        } else {
            let mut data = ResourceData::from_change(&prior, &planned);
            info!(id = %data.id(), "Updating resource");
            match resource.update(&mut data, &meta).await {
                Ok(()) if data.is_gone() => (Value::Null, Vec::new()),
                Ok(()) => (data.to_state(schema), Vec::new()),
                Err(e) => (prior, vec![Diagnostic::from_error(&e)]),
            }
        };

        for diagnostic in &diagnostics {
            warn!(summary = %diagnostic.summary, detail = %diagnostic.detail, "Apply failed");
        }

        Ok(tonic::Response::new(tfplugin5::apply_resource_change::Response {
            new_state: encode(&new_state, schema)?,
            private: request.planned_private,
            diagnostics: diagnostics::to_proto(&diagnostics),
            legacy_type_system: true,
        }))
    }

    #[instrument(skip(self, request), fields(type_name = %request.get_ref().type_name))]
    async fn import_resource_state(
        &self,
        request: tonic::Request<tfplugin5::import_resource_state::Request>,
    ) -> RpcResult<tfplugin5::import_resource_state::Response> {
        let request = request.into_inner();
        let (resource, schema) = self.resource(&request.type_name)?;

        let response = match resource.import(&request.id) {
            Ok(data) => tfplugin5::import_resource_state::Response {
                imported_resources: vec![tfplugin5::import_resource_state::ImportedResource {
                    type_name: request.type_name.clone(),
                    state: encode(&data.to_state(schema), schema)?,
                    private: Vec::new(),
                }],
                diagnostics: Vec::new(),
            },
            Err(e) => tfplugin5::import_resource_state::Response {
                imported_resources: Vec::new(),
                diagnostics: vec![Diagnostic::from_error(&e).to_proto()],
            },
        };

        Ok(tonic::Response::new(response))
    }

    async fn read_data_source(
        &self,
        request: tonic::Request<tfplugin5::read_data_source::Request>,
    ) -> RpcResult<tfplugin5::read_data_source::Response> {
        let request = request.into_inner();
        Ok(tonic::Response::new(tfplugin5::read_data_source::Response {
            state: None,
            diagnostics: unsupported_data_source(&request.type_name),
        }))
    }

    async fn stop(
        &self,
        _request: tonic::Request<tfplugin5::stop::Request>,
    ) -> RpcResult<tfplugin5::stop::Response> {
        info!("Stop requested by host");
        Ok(tonic::Response::new(tfplugin5::stop::Response {
            error: String::new(),
        }))
    }
}

/// go-plugin controller: the host's request to exit
pub struct Controller {
    shutdown: Arc<Notify>,
}

impl Controller {
    pub fn new(shutdown: Arc<Notify>) -> Self {
        Self { shutdown }
    }
}

#[tonic::async_trait]
impl GrpcController for Controller {
    async fn shutdown(
        &self,
        _request: tonic::Request<controller::Empty>,
    ) -> RpcResult<controller::Empty> {
        info!("Shutdown requested by host");
        self.shutdown.notify_one();
        Ok(tonic::Response::new(controller::Empty {}))
    }
}

/// Health service reporting the plugin as serving
pub struct HealthService;

#[tonic::async_trait]
impl Health for HealthService {
    async fn check(
        &self,
        _request: tonic::Request<health::HealthCheckRequest>,
    ) -> RpcResult<health::HealthCheckResponse> {
        Ok(tonic::Response::new(health::HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        }))
    }
}

#[cfg(test)]
mod tests;
