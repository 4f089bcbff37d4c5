//! Lightsail static IP schema definition

use pyxis_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Returns the schema for a Lightsail static IP
pub fn static_ip_schema() -> ResourceSchema {
    ResourceSchema::new("lightsail.static_ip")
        .with_description("A Lightsail static IP address")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new()
                .with_provider_name("staticIpName")
                .with_description("The name of the static IP"),
        )
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("ip_address", AttributeType::String)
                .computed()
                .with_provider_name("ipAddress"),
        )
        .attribute(
            AttributeSchema::new("support_code", AttributeType::String)
                .computed()
                .with_provider_name("supportCode"),
        )
        .attribute(
            AttributeSchema::new("is_attached", AttributeType::Bool)
                .computed()
                .with_provider_name("isAttached"),
        )
        .attribute(
            AttributeSchema::new("attached_to", AttributeType::String)
                .computed()
                .with_provider_name("attachedTo"),
        )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pyxis_core::resource::Value;

    use super::*;

    #[test]
    fn name_only_configuration_is_valid() {
        let attrs = HashMap::from([(
            "name".to_string(),
            Value::String("web-static-ip".to_string()),
        )]);
        assert!(static_ip_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn missing_name_is_rejected() {
        assert!(static_ip_schema().validate(&HashMap::new()).is_err());
    }

    #[test]
    fn ip_address_cannot_be_configured() {
        let attrs = HashMap::from([
            (
                "name".to_string(),
                Value::String("web-static-ip".to_string()),
            ),
            (
                "ip_address".to_string(),
                Value::String("203.0.113.10".to_string()),
            ),
        ]);
        assert!(static_ip_schema().validate(&attrs).is_err());
    }
}
