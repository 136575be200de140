//! Core OpenStack domain types.
//!
//! This module enumerates the services the workspace talks to and the
//! endpoint interfaces a Keystone catalog advertises for each of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::client::{
    COMPUTE_DEFAULT_TIMEOUT, IDENTITY_DEFAULT_TIMEOUT, IMAGE_DEFAULT_TIMEOUT,
    NETWORK_DEFAULT_TIMEOUT,
};
use crate::error::{Error, Result};

/// Supported OpenStack services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Keystone
    Identity,
    /// Nova
    Compute,
    /// Neutron
    Network,
    /// Glance
    Image,
}

impl ServiceType {
    /// Returns the catalog type string of the service.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Compute => "compute",
            Self::Network => "network",
            Self::Image => "image",
        }
    }

    /// Returns all supported services.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Identity, Self::Compute, Self::Network, Self::Image]
    }

    /// Returns the default request timeout for the service.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        let secs = match self {
            Self::Identity => IDENTITY_DEFAULT_TIMEOUT,
            Self::Compute => COMPUTE_DEFAULT_TIMEOUT,
            Self::Network => NETWORK_DEFAULT_TIMEOUT,
            Self::Image => IMAGE_DEFAULT_TIMEOUT,
        };
        Duration::from_secs(secs)
    }
}

impl FromStr for ServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "identity" | "keystone" => Ok(Self::Identity),
            "compute" | "nova" => Ok(Self::Compute),
            "network" | "neutron" => Ok(Self::Network),
            "image" | "glance" => Ok(Self::Image),
            _ => Err(Error::ConfigError(format!("Unknown service type: {s}"))),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Endpoint interface advertised in the service catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    /// Publicly reachable endpoint
    #[default]
    Public,
    /// Endpoint on the internal management network
    Internal,
    /// Administrative endpoint
    Admin,
}

impl Interface {
    /// Returns the interface as it appears in the catalog.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Interface {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().trim_end_matches("url") {
            "public" => Ok(Self::Public),
            "internal" => Ok(Self::Internal),
            "admin" => Ok(Self::Admin),
            _ => Err(Error::ConfigError(format!("Unknown endpoint interface: {s}"))),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_names() {
        assert_eq!(ServiceType::Identity.name(), "identity");
        assert_eq!(ServiceType::Network.to_string(), "network");
        assert_eq!(ServiceType::all().len(), 4);
    }

    #[test]
    fn service_type_from_project_names() {
        assert_eq!("neutron".parse::<ServiceType>().unwrap(), ServiceType::Network);
        assert_eq!("Nova".parse::<ServiceType>().unwrap(), ServiceType::Compute);
        assert!("swift".parse::<ServiceType>().is_err());
    }

    #[test]
    fn image_timeout_is_longest() {
        assert!(ServiceType::Image.default_timeout() > ServiceType::Network.default_timeout());
    }

    #[test]
    fn interface_parsing() {
        assert_eq!("publicURL".parse::<Interface>().unwrap(), Interface::Public);
        assert_eq!("internal".parse::<Interface>().unwrap(), Interface::Internal);
        assert!("private".parse::<Interface>().is_err());
        assert_eq!(Interface::default(), Interface::Public);
    }

    #[test]
    fn interface_serde() {
        let json = serde_json::to_string(&Interface::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let parsed: Interface = serde_json::from_str("\"internal\"").unwrap();
        assert_eq!(parsed, Interface::Internal);
    }
}
