//! Generated protocol types

#[allow(clippy::all)]
pub mod tfplugin5 {
    tonic::include_proto!("tfplugin5");
}

/// go-plugin controller service
#[allow(clippy::all)]
pub mod controller {
    tonic::include_proto!("plugin");
}

#[allow(clippy::all)]
pub mod health {
    tonic::include_proto!("grpc.health.v1");
}

use crate::error::PluginResult;
use crate::schema::AttributeType;
use crate::value::Value;

impl tfplugin5::DynamicValue {
    /// Encode a value as a msgpack dynamic value
    pub fn encode(value: &Value, ty: &AttributeType) -> PluginResult<Self> {
        Ok(Self {
            msgpack: value.to_msgpack(ty)?,
            json: Vec::new(),
        })
    }

    /// Decode whichever encoding the host filled in
    pub fn decode(&self, ty: &AttributeType) -> PluginResult<Value> {
        if !self.msgpack.is_empty() {
            Value::from_msgpack(&self.msgpack, ty)
        } else {
            Value::from_json(&self.json, ty)
        }
    }
}
