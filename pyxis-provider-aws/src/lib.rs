//! Pyxis AWS Provider
//!
//! Resource plugins implemented against the AWS control plane: Direct
//! Connect connections and Lightsail static IPs. Clients are built once and
//! injected into the provider; every operation receives the resource it
//! works on explicitly.

pub mod connection;
pub mod schemas;
pub mod static_ip;
pub mod tags;

use aws_config::Region;
use aws_sdk_directconnect::Client as DirectConnectClient;
use aws_sdk_lightsail::Client as LightsailClient;
use pyxis_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceType,
};
use pyxis_core::resource::{Resource, ResourceId, State};
use pyxis_core::schema::ResourceSchema;
use tokio_util::sync::CancellationToken;

/// Direct Connect connection resource type
pub struct ConnectionType;

impl ResourceType for ConnectionType {
    fn name(&self) -> &'static str {
        connection::TYPE
    }

    fn schema(&self) -> ResourceSchema {
        schemas::connection::connection_schema()
    }
}

/// Lightsail static IP resource type
pub struct StaticIpType;

impl ResourceType for StaticIpType {
    fn name(&self) -> &'static str {
        static_ip::TYPE
    }

    fn schema(&self) -> ResourceSchema {
        schemas::static_ip::static_ip_schema()
    }
}

/// AWS Provider
pub struct AwsProvider {
    dx_client: DirectConnectClient,
    lightsail_client: LightsailClient,
    region: String,
    partition: String,
    cancel: CancellationToken,
}

impl AwsProvider {
    /// Create a new AWS Provider for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            dx_client: DirectConnectClient::new(&config),
            lightsail_client: LightsailClient::new(&config),
            region: region.to_string(),
            partition: "aws".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create with specific clients (for testing and injection)
    pub fn with_clients(
        dx_client: DirectConnectClient,
        lightsail_client: LightsailClient,
        region: String,
    ) -> Self {
        Self {
            dx_client,
            lightsail_client,
            region,
            partition: "aws".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the ARN partition (e.g., "aws-us-gov")
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Thread the caller's cancellation signal into every wait
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The region this provider operates in
    pub fn region(&self) -> &str {
        &self.region
    }
}

fn unknown_resource_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(ConnectionType), Box::new(StaticIpType)]
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            match id.resource_type.as_str() {
                connection::TYPE => {
                    connection::read(&self.dx_client, &self.partition, &id, identifier.as_deref())
                        .await
                }
                static_ip::TYPE => {
                    static_ip::read(&self.lightsail_client, &id, identifier.as_deref()).await
                }
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match resource.id.resource_type.as_str() {
                connection::TYPE => {
                    connection::create(&self.dx_client, &self.partition, &resource).await
                }
                static_ip::TYPE => static_ip::create(&self.lightsail_client, &resource).await,
                _ => Err(unknown_resource_type(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            match id.resource_type.as_str() {
                connection::TYPE => {
                    connection::update(
                        &self.dx_client,
                        &self.partition,
                        &self.cancel,
                        &id,
                        &identifier,
                        &from,
                        &to,
                    )
                    .await
                }
                static_ip::TYPE => static_ip::update(&id).await,
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            match id.resource_type.as_str() {
                connection::TYPE => {
                    connection::delete(&self.dx_client, &self.cancel, &id, &identifier).await
                }
                static_ip::TYPE => {
                    static_ip::delete(&self.lightsail_client, &id, &identifier).await
                }
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }
}
