//! Discovered service instances
//!
//! Instances are produced by the discovery layer and handed to the rule filter,
//! which fills in [`Service::service_type`] for the ones it recognises.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Service category assigned by a matching ruleset (e.g. "redis")
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceType(String);

impl ServiceType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True until a ruleset has classified the instance
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Service record carried by an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "type", default)]
    pub service_type: ServiceType,
}

/// Container metadata as reported by the runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub pod: String,
    pub command: String,
    pub state: String,
    pub labels: HashMap<String, String>,
}

/// Network endpoint exposed by a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Port {
    pub ip: String,
    #[serde(rename = "type")]
    pub port_type: String,
    pub public_port: u16,
    pub private_port: u16,
    pub labels: HashMap<String, String>,
}

/// One discovered container endpoint eligible for classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub port: Port,
}

impl Instance {
    /// Name of the container, if it declares one
    pub fn first_name(&self) -> Option<&str> {
        self.container.names.first().map(String::as_str)
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service.service_type
    }
}
