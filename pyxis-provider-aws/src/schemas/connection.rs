//! Direct Connect connection schema definition

use pyxis_core::resource::Value;
use pyxis_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

/// Port speeds accepted for a dedicated or hosted connection
const VALID_BANDWIDTHS: [&str; 12] = [
    "1Gbps", "2Gbps", "5Gbps", "10Gbps", "100Gbps", "400Gbps", "50Mbps", "100Mbps", "200Mbps",
    "300Mbps", "400Mbps", "500Mbps",
];

/// Connection bandwidth type (with validation)
pub fn connection_bandwidth() -> AttributeType {
    AttributeType::Custom {
        name: "ConnectionBandwidth".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                if VALID_BANDWIDTHS.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "Invalid bandwidth '{}'. Must be one of: {}",
                        s,
                        VALID_BANDWIDTHS.join(", ")
                    ))
                }
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// MACsec encryption mode for the connection
pub fn encryption_mode() -> AttributeType {
    AttributeType::Enum(vec![
        "no_encrypt".to_string(),
        "should_encrypt".to_string(),
        "must_encrypt".to_string(),
    ])
}

/// Returns the schema for a Direct Connect connection
pub fn connection_schema() -> ResourceSchema {
    ResourceSchema::new("dx.connection")
        .with_description("A Direct Connect dedicated network connection")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("connectionName")
                .with_description("The name of the connection"),
        )
        .attribute(
            AttributeSchema::new("bandwidth", connection_bandwidth())
                .required()
                .force_new()
                .with_provider_name("bandwidth")
                .with_description("The bandwidth of the connection"),
        )
        .attribute(
            AttributeSchema::new("location", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("location")
                .with_description("The Direct Connect location code for the connection"),
        )
        .attribute(
            AttributeSchema::new("provider_name", AttributeType::String)
                .optional()
                .computed()
                .force_new()
                .with_provider_name("providerName")
                .with_description("The name of the service provider for the connection"),
        )
        .attribute(
            AttributeSchema::new("request_macsec", AttributeType::Bool)
                .optional()
                .force_new()
                .with_default(Value::Bool(false))
                .with_provider_name("requestMACSec")
                .with_description("Request a MAC Security (MACsec) capable port"),
        )
        .attribute(
            AttributeSchema::new("encryption_mode", encryption_mode())
                .optional()
                .computed()
                .with_provider_name("encryptionMode")
                .with_description("The MACsec connection encryption mode"),
        )
        .attribute(
            AttributeSchema::new("tags", types::tag_map())
                .optional()
                .with_description("Tags to assign to the connection"),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("aws_device", AttributeType::String)
                .computed()
                .with_provider_name("awsDeviceV2"),
        )
        .attribute(
            AttributeSchema::new("has_logical_redundancy", AttributeType::String)
                .computed()
                .with_provider_name("hasLogicalRedundancy"),
        )
        .attribute(
            AttributeSchema::new("jumbo_frame_capable", AttributeType::Bool)
                .computed()
                .with_provider_name("jumboFrameCapable"),
        )
        .attribute(
            AttributeSchema::new("macsec_capable", AttributeType::Bool)
                .computed()
                .with_provider_name("macSecCapable"),
        )
        .attribute(
            AttributeSchema::new("owner_account_id", AttributeType::String)
                .computed()
                .with_provider_name("ownerAccount"),
        )
        .attribute(
            AttributeSchema::new("partner_name", AttributeType::String)
                .computed()
                .with_provider_name("partnerName"),
        )
        .attribute(
            AttributeSchema::new("port_encryption_status", AttributeType::String)
                .computed()
                .with_provider_name("portEncryptionStatus"),
        )
        .attribute(
            AttributeSchema::new("vlan_id", AttributeType::Int)
                .computed()
                .with_provider_name("vlan"),
        )
}
