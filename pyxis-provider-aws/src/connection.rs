//! Direct Connect connection resource
//!
//! A connection is created in `requested`/`pending` state and transitions
//! asynchronously; the update and delete paths use the core waiter to block
//! until the transition settles.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_directconnect::Client as DirectConnectClient;
use aws_sdk_directconnect::types::{Connection, ConnectionState, Tag};
use pyxis_core::provider::{ProviderError, ProviderResult};
use pyxis_core::resource::{Resource, ResourceId, State, Value};
use pyxis_core::waiter::{self, FetchError, WaitSpec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::schemas::connection::connection_schema;
use crate::tags;

pub const TYPE: &str = "dx.connection";

const CONNECTION_CONFIRMED_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const CONNECTION_DELETED_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const CONNECTION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Validated configuration for a connection
///
/// Built from the declared resource once, at the boundary; the CRUD
/// handlers below only see typed fields.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub name: String,
    pub bandwidth: String,
    pub location: String,
    pub provider_name: Option<String>,
    pub request_macsec: bool,
    pub encryption_mode: Option<String>,
    pub tags: Vec<(String, String)>,
}

impl ConnectionConfig {
    pub fn from_resource(resource: &Resource) -> ProviderResult<Self> {
        connection_schema()
            .validate(&resource.attributes)
            .map_err(|errors| {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                ProviderError::new(format!("Invalid configuration: {}", messages.join("; ")))
                    .for_resource(resource.id.clone())
            })?;

        let attrs = &resource.attributes;
        let required_str = |key: &str| -> ProviderResult<String> {
            attrs
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ProviderError::new(format!("Missing required attribute '{}'", key))
                        .for_resource(resource.id.clone())
                })
        };

        Ok(Self {
            name: required_str("name")?,
            bandwidth: required_str("bandwidth")?,
            location: required_str("location")?,
            provider_name: attrs
                .get("provider_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            request_macsec: attrs
                .get("request_macsec")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            encryption_mode: attrs
                .get("encryption_mode")
                .and_then(Value::as_str)
                .map(str::to_string),
            tags: tags::pairs_from_value(attrs.get("tags")),
        })
    }
}

/// Create a connection and read back its initial state
///
/// A freshly requested connection is usable before it is confirmed, so
/// creation does not wait for `available`.
pub async fn create(
    client: &DirectConnectClient,
    partition: &str,
    resource: &Resource,
) -> ProviderResult<State> {
    let config = ConnectionConfig::from_resource(resource)?;

    debug!(name = %config.name, location = %config.location, "creating Direct Connect connection");

    let mut request = client
        .create_connection()
        .connection_name(&config.name)
        .bandwidth(&config.bandwidth)
        .location(&config.location)
        .request_mac_sec(config.request_macsec);

    if let Some(provider_name) = &config.provider_name {
        request = request.provider_name(provider_name);
    }
    for (key, value) in &config.tags {
        request = request.tags(build_tag(key, value)?);
    }

    let output = request.send().await.map_err(|e| {
        ProviderError::new(format!("Failed to create connection: {:?}", e))
            .for_resource(resource.id.clone())
    })?;

    let connection_id = output
        .connection_id()
        .ok_or_else(|| {
            ProviderError::new("CreateConnection returned no connection id")
                .for_resource(resource.id.clone())
        })?
        .to_string();

    read(client, partition, &resource.id, Some(&connection_id)).await
}

/// Read the current state of a connection
///
/// A connection that no longer exists, or that has reached its `deleted` or
/// `rejected` tombstone state, is reported as not found so the caller drops
/// it from its records.
pub async fn read(
    client: &DirectConnectClient,
    partition: &str,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(identifier) = identifier else {
        return Ok(State::not_found(id.clone()));
    };

    let connection = match find_connection_by_id(client, identifier).await {
        Ok(connection) => connection,
        Err(FetchError::NotFound) => {
            warn!(id = %id, identifier, "connection not found, removing from state");
            return Ok(State::not_found(id.clone()));
        }
        Err(FetchError::Remote(e)) => return Err(e.for_resource(id.clone())),
    };

    if matches!(
        connection.connection_state(),
        Some(ConnectionState::Deleted | ConnectionState::Rejected)
    ) {
        warn!(id = %id, identifier, "connection is terminated, removing from state");
        return Ok(State::not_found(id.clone()));
    }

    Ok(connection_to_state(id.clone(), partition, &connection))
}

/// Update a connection in place
///
/// Only the MACsec encryption mode can change without replacement; the
/// update is confirmed by waiting for the connection to return to
/// `available`.
pub async fn update(
    client: &DirectConnectClient,
    partition: &str,
    cancel: &CancellationToken,
    id: &ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let config = ConnectionConfig::from_resource(to)?;

    let current_mode = from.attributes.get("encryption_mode").and_then(Value::as_str);
    if let Some(mode) = &config.encryption_mode
        && current_mode != Some(mode.as_str())
    {
        debug!(id = %id, identifier, mode = %mode, "updating connection encryption mode");

        client
            .update_connection()
            .connection_id(identifier)
            .encryption_mode(mode)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to update connection: {:?}", e))
                    .for_resource(id.clone())
            })?;

        wait_connection_confirmed(client, cancel, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
    }

    read(client, partition, id, Some(identifier)).await
}

/// Delete a connection and wait until it is gone
pub async fn delete(
    client: &DirectConnectClient,
    cancel: &CancellationToken,
    id: &ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    debug!(id = %id, identifier, "deleting Direct Connect connection");

    if let Err(e) = client
        .delete_connection()
        .connection_id(identifier)
        .send()
        .await
    {
        if is_not_found(&e) {
            return Ok(());
        }
        return Err(
            ProviderError::new(format!("Failed to delete connection: {:?}", e))
                .for_resource(id.clone()),
        );
    }

    wait_connection_deleted(client, cancel, identifier)
        .await
        .map_err(|e| e.for_resource(id.clone()))
}

/// Wait for a connection to be confirmed by the service
///
/// `rejected` is terminal and never retried; a connection that disappears
/// mid-wait surfaces as a not-found error.
pub async fn wait_connection_confirmed(
    client: &DirectConnectClient,
    cancel: &CancellationToken,
    connection_id: &str,
) -> ProviderResult<Connection> {
    let spec = WaitSpec::new(
        vec![ConnectionState::Available],
        CONNECTION_CONFIRMED_TIMEOUT,
        CONNECTION_POLL_INTERVAL,
    )
    .with_failure_states(vec![ConnectionState::Rejected, ConnectionState::Deleted]);

    let connection = waiter::wait(&spec, cancel, || fetch_connection(client, connection_id))
        .await
        .map_err(|e| {
            ProviderError::new(format!(
                "Waiting for connection ({}) to be confirmed: {}",
                connection_id, e
            ))
        })?;

    connection.ok_or_else(|| {
        ProviderError::new(format!(
            "Connection ({}) disappeared while waiting for confirmation",
            connection_id
        ))
    })
}

/// Wait for a connection deletion to finish
///
/// Absence counts as success: the service stops returning the connection
/// once the tombstone is reaped.
pub async fn wait_connection_deleted(
    client: &DirectConnectClient,
    cancel: &CancellationToken,
    connection_id: &str,
) -> ProviderResult<()> {
    let spec = WaitSpec::new(
        vec![ConnectionState::Deleted],
        CONNECTION_DELETED_TIMEOUT,
        CONNECTION_POLL_INTERVAL,
    )
    .accept_absent()
    .with_backoff(1.5, Duration::from_secs(30));

    waiter::wait(&spec, cancel, || fetch_connection(client, connection_id))
        .await
        .map_err(|e| {
            ProviderError::new(format!(
                "Waiting for connection ({}) to be deleted: {}",
                connection_id, e
            ))
        })?;

    Ok(())
}

/// Status fetch used by the waiters
async fn fetch_connection(
    client: &DirectConnectClient,
    connection_id: &str,
) -> Result<(Connection, ConnectionState), FetchError> {
    let connection = find_connection_by_id(client, connection_id).await?;
    let state = connection
        .connection_state()
        .cloned()
        .unwrap_or_else(|| ConnectionState::from("unknown"));
    Ok((connection, state))
}

/// Find a connection by its identifier
async fn find_connection_by_id(
    client: &DirectConnectClient,
    connection_id: &str,
) -> Result<Connection, FetchError> {
    let output = client
        .describe_connections()
        .connection_id(connection_id)
        .send()
        .await
        .map_err(|e| {
            if is_not_found(&e) {
                FetchError::NotFound
            } else {
                FetchError::Remote(ProviderError::new(format!(
                    "Failed to describe connection {}: {:?}",
                    connection_id, e
                )))
            }
        })?;

    output
        .connections()
        .first()
        .cloned()
        .ok_or(FetchError::NotFound)
}

/// The service reports a missing connection as a client exception with a
/// "Could not find Connection" message rather than a dedicated error type
fn is_not_found<E: std::fmt::Debug>(err: &E) -> bool {
    format!("{:?}", err).contains("Could not find Connection")
}

fn build_tag(key: &str, value: &str) -> ProviderResult<Tag> {
    Tag::builder()
        .key(key)
        .value(value)
        .build()
        .map_err(|e| ProviderError::new(format!("Failed to build tag: {}", e)))
}

fn connection_arn(
    partition: &str,
    region: &str,
    owner_account: &str,
    connection_id: &str,
) -> String {
    format!("arn:{partition}:directconnect:{region}:{owner_account}:dxcon/{connection_id}")
}

/// Map an API connection to resource state
fn connection_to_state(id: ResourceId, partition: &str, connection: &Connection) -> State {
    let mut attributes = HashMap::new();

    let string_fields = [
        ("name", connection.connection_name()),
        ("bandwidth", connection.bandwidth()),
        ("location", connection.location()),
        ("provider_name", connection.provider_name()),
        ("partner_name", connection.partner_name()),
        ("owner_account_id", connection.owner_account()),
        ("aws_device", connection.aws_device_v2()),
        ("encryption_mode", connection.encryption_mode()),
        ("port_encryption_status", connection.port_encryption_status()),
    ];
    for (attr, value) in string_fields {
        if let Some(value) = value {
            attributes.insert(attr.to_string(), Value::String(value.to_string()));
        }
    }

    if let (Some(connection_id), Some(region), Some(owner)) = (
        connection.connection_id(),
        connection.region(),
        connection.owner_account(),
    ) {
        attributes.insert(
            "arn".to_string(),
            Value::String(connection_arn(partition, region, owner, connection_id)),
        );
    }

    if let Some(capable) = connection.jumbo_frame_capable() {
        attributes.insert("jumbo_frame_capable".to_string(), Value::Bool(capable));
    }
    if let Some(capable) = connection.mac_sec_capable() {
        attributes.insert("macsec_capable".to_string(), Value::Bool(capable));
    }
    if let Some(redundancy) = connection.has_logical_redundancy() {
        attributes.insert(
            "has_logical_redundancy".to_string(),
            Value::String(redundancy.as_str().to_string()),
        );
    }
    if connection.vlan() > 0 {
        attributes.insert("vlan_id".to_string(), Value::Int(connection.vlan() as i64));
    }

    let pairs = connection
        .tags()
        .iter()
        .filter_map(|tag| {
            tag.value()
                .map(|value| (tag.key().to_string(), value.to_string()))
        })
        .collect::<Vec<_>>();
    if let Some(tags_value) = tags::pairs_to_value(pairs) {
        attributes.insert("tags".to_string(), tags_value);
    }

    let mut state = State::existing(id, attributes);
    if let Some(connection_id) = connection.connection_id() {
        state = state.with_identifier(connection_id);
    }
    state
}
