//! Attribute projection
//!
//! Flattens a service instance into the attribute namespace that rule files
//! address through their `path` field. Key names are part of the rule file
//! contract and must not change.

use ahash::{HashMap, HashMapExt};
use serde_json::Value;

use crate::services::Instance;

pub const CONTAINER_ID: &str = "ContainerID";
pub const CONTAINER_NAME: &str = "ContainerName";
pub const CONTAINER_IMAGE: &str = "ContainerImage";
pub const CONTAINER_POD: &str = "ContainerPod";
pub const CONTAINER_COMMAND: &str = "ContainerCommand";
pub const CONTAINER_STATE: &str = "ContainerState";
pub const NETWORK_IP: &str = "NetworkIP";
pub const NETWORK_TYPE: &str = "NetworkType";
pub const NETWORK_PUBLIC_PORT: &str = "NetworkPublicPort";
pub const NETWORK_PRIVATE_PORT: &str = "NetworkPrivatePort";

/// Prefix for attributes derived from container labels
pub const CONTAINER_LABEL_PREFIX: &str = "ContainerLabel-";
/// Prefix for attributes derived from port labels
pub const NETWORK_LABEL_PREFIX: &str = "NetworkLabel-";

const FIXED_KEYS: usize = 10;

/// Flat attribute name -> value mapping used as the fact base for rules
pub type AttributeMap = HashMap<String, Value>;

/// Project an instance into its attribute map
///
/// Containers without names project an empty `ContainerName`.
pub fn project(instance: &Instance) -> AttributeMap {
    let container = &instance.container;
    let port = &instance.port;

    let mut attributes = AttributeMap::with_capacity(
        FIXED_KEYS + container.labels.len() + port.labels.len(),
    );

    let fixed = [
        (CONTAINER_ID, container.id.clone()),
        (
            CONTAINER_NAME,
            instance.first_name().unwrap_or_default().to_string(),
        ),
        (CONTAINER_IMAGE, container.image.clone()),
        (CONTAINER_POD, container.pod.clone()),
        (CONTAINER_COMMAND, container.command.clone()),
        (CONTAINER_STATE, container.state.clone()),
        (NETWORK_IP, port.ip.clone()),
        (NETWORK_TYPE, port.port_type.clone()),
        (NETWORK_PUBLIC_PORT, port.public_port.to_string()),
        (NETWORK_PRIVATE_PORT, port.private_port.to_string()),
    ];

    for (key, value) in fixed {
        attributes.insert(key.to_string(), Value::String(value));
    }

    merge_labels(&mut attributes, CONTAINER_LABEL_PREFIX, &container.labels);
    merge_labels(&mut attributes, NETWORK_LABEL_PREFIX, &port.labels);

    attributes
}

fn merge_labels<'a>(
    attributes: &mut AttributeMap,
    prefix: &str,
    labels: impl IntoIterator<Item = (&'a String, &'a String)>,
) {
    for (key, value) in labels {
        attributes.insert(format!("{prefix}{key}"), Value::String(value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Container, Port};
    use std::collections::HashMap as StdHashMap;

    fn redis_instance() -> Instance {
        Instance {
            id: "c0ffee-6379".to_string(),
            container: Container {
                id: "c0ffee".to_string(),
                names: vec!["/cache".to_string(), "/cache-alias".to_string()],
                image: "redis:6".to_string(),
                pod: "cache-0".to_string(),
                command: "redis-server".to_string(),
                state: "running".to_string(),
                labels: StdHashMap::from([("app".to_string(), "cache".to_string())]),
            },
            port: Port {
                ip: "172.17.0.2".to_string(),
                port_type: "tcp".to_string(),
                public_port: 16379,
                private_port: 6379,
                labels: StdHashMap::from([("app".to_string(), "metrics".to_string())]),
            },
            ..Default::default()
        }
    }

    fn get<'a>(attributes: &'a AttributeMap, key: &str) -> Option<&'a str> {
        attributes.get(key).and_then(Value::as_str)
    }

    #[test]
    fn test_fixed_keys_projected() {
        let attributes = project(&redis_instance());

        assert_eq!(get(&attributes, CONTAINER_ID), Some("c0ffee"));
        assert_eq!(get(&attributes, CONTAINER_NAME), Some("/cache"));
        assert_eq!(get(&attributes, CONTAINER_IMAGE), Some("redis:6"));
        assert_eq!(get(&attributes, CONTAINER_POD), Some("cache-0"));
        assert_eq!(get(&attributes, CONTAINER_COMMAND), Some("redis-server"));
        assert_eq!(get(&attributes, CONTAINER_STATE), Some("running"));
        assert_eq!(get(&attributes, NETWORK_IP), Some("172.17.0.2"));
        assert_eq!(get(&attributes, NETWORK_TYPE), Some("tcp"));
        assert_eq!(get(&attributes, NETWORK_PUBLIC_PORT), Some("16379"));
        assert_eq!(get(&attributes, NETWORK_PRIVATE_PORT), Some("6379"));
    }

    #[test]
    fn test_label_namespaces_do_not_collide() {
        let attributes = project(&redis_instance());

        assert_eq!(get(&attributes, "ContainerLabel-app"), Some("cache"));
        assert_eq!(get(&attributes, "NetworkLabel-app"), Some("metrics"));
        assert_eq!(attributes.len(), FIXED_KEYS + 2);
    }

    #[test]
    fn test_missing_name_projects_empty_string() {
        let mut instance = redis_instance();
        instance.container.names.clear();

        let attributes = project(&instance);
        assert_eq!(get(&attributes, CONTAINER_NAME), Some(""));
    }

    #[test]
    fn test_labels_with_dots_keep_full_key() {
        let mut instance = redis_instance();
        instance.container.labels.insert(
            "com.docker.compose.service".to_string(),
            "cache".to_string(),
        );

        let attributes = project(&instance);
        assert_eq!(
            get(&attributes, "ContainerLabel-com.docker.compose.service"),
            Some("cache")
        );
    }

    #[test]
    fn test_projection_is_deterministic() {
        let instance = redis_instance();
        assert_eq!(project(&instance), project(&instance));
    }
}
