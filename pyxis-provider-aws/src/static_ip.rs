//! Lightsail static IP resource
//!
//! Allocation and release are synchronous, so this resource needs no
//! waiter; its name doubles as the remote identifier.

use std::collections::HashMap;

use aws_sdk_lightsail::Client as LightsailClient;
use aws_sdk_lightsail::types::StaticIp;
use pyxis_core::provider::{ProviderError, ProviderResult};
use pyxis_core::resource::{Resource, ResourceId, State, Value};
use tracing::{debug, warn};

use crate::schemas::static_ip::static_ip_schema;

pub const TYPE: &str = "lightsail.static_ip";

/// Validated configuration for a static IP
#[derive(Debug, Clone)]
pub struct StaticIpConfig {
    pub name: String,
}

impl StaticIpConfig {
    pub fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        static_ip_schema()
            .validate(&resource.attributes)
            .map_err(|errors| {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                ProviderError::new(format!("Invalid configuration: {}", messages.join("; ")))
                    .for_resource(resource.id.clone())
            })?;

        let name = resource
            .attributes
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::new("Missing required attribute 'name'")
                    .for_resource(resource.id.clone())
            })?;

        Ok(Self { name })
    }
}

/// Allocate a static IP and read back its state
pub async fn create(client: &LightsailClient, resource: &Resource) -> ProviderResult<State> {
    let config = StaticIpConfig::from_resource(resource)?;

    debug!(name = %config.name, "allocating Lightsail static IP");

    client
        .allocate_static_ip()
        .static_ip_name(&config.name)
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(format!("Failed to allocate static IP: {:?}", e))
                .for_resource(resource.id.clone())
        })?;

    read(client, &resource.id, Some(&config.name)).await
}

/// Read the current state of a static IP
pub async fn read(
    client: &LightsailClient,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(name) = identifier else {
        return Ok(State::not_found(id.clone()));
    };

    let output = match client.get_static_ip().static_ip_name(name).send().await {
        Ok(output) => output,
        Err(e) if is_not_found(&e) => {
            warn!(id = %id, name, "static IP not found, removing from state");
            return Ok(State::not_found(id.clone()));
        }
        Err(e) => {
            return Err(
                ProviderError::new(format!("Failed to read static IP: {:?}", e))
                    .for_resource(id.clone()),
            );
        }
    };

    match output.static_ip() {
        Some(static_ip) => Ok(static_ip_to_state(id.clone(), static_ip)),
        None => Ok(State::not_found(id.clone())),
    }
}

/// A static IP has no in-place updates; every change replaces it
pub async fn update(id: &ResourceId) -> ProviderResult<State> {
    Err(
        ProviderError::new("Update not supported for lightsail.static_ip, delete and recreate")
            .for_resource(id.clone()),
    )
}

/// Release a static IP; releasing one that is already gone is a no-op
pub async fn delete(
    client: &LightsailClient,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    debug!(id = %id, identifier, "releasing Lightsail static IP");

    match client
        .release_static_ip()
        .static_ip_name(identifier)
        .send()
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(
            ProviderError::new(format!("Failed to release static IP: {:?}", e))
                .for_resource(id.clone()),
        ),
    }
}

fn is_not_found<E: std::fmt::Debug>(err: &E) -> bool {
    format!("{:?}", err).contains("NotFoundException")
}

/// Map an API static IP to resource state
fn static_ip_to_state(id: ResourceId, static_ip: &StaticIp) -> State {
    let mut attributes = HashMap::new();

    let string_fields = [
        ("name", static_ip.name()),
        ("arn", static_ip.arn()),
        ("ip_address", static_ip.ip_address()),
        ("support_code", static_ip.support_code()),
        ("attached_to", static_ip.attached_to()),
    ];
    for (attr, value) in string_fields {
        if let Some(value) = value {
            attributes.insert(attr.to_string(), Value::String(value.to_string()));
        }
    }

    if let Some(attached) = static_ip.is_attached() {
        attributes.insert("is_attached".to_string(), Value::Bool(attached));
    }

    let mut state = State::existing(id, attributes);
    if let Some(name) = static_ip.name() {
        state = state.with_identifier(name);
    }
    state
}
