//! Desired topology: networks, servers, routers and router interfaces.

use ipnet::IpNet;
use ostack_core::uuid::SubnetId;
use ostack_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use validator::Validate;

/// Everything a deployment should create, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Topology {
    /// Private networks, each with one subnet
    #[serde(default)]
    #[validate(nested)]
    pub networks: Vec<NetworkSpec>,

    /// Servers attached to one network each
    #[serde(default)]
    #[validate(nested)]
    pub servers: Vec<ServerSpec>,

    /// Routers
    #[serde(default)]
    #[validate(nested)]
    pub routers: Vec<RouterSpec>,

    /// Router-to-subnet attachments
    #[serde(default)]
    #[validate(nested)]
    pub interfaces: Vec<InterfaceSpec>,
}

/// A private network and its subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NetworkSpec {
    /// Network name
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// The network's subnet
    #[validate(nested)]
    pub subnet: SubnetSpec,
}

/// An IPv4 subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SubnetSpec {
    /// Subnet name
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Address range, e.g. `192.168.3.0/24`
    pub cidr: IpNet,

    /// Gateway address; Neutron picks the first host when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
}

/// A server booted on a single network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ServerSpec {
    /// Server name
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Image name or id
    #[validate(length(min = 1))]
    pub image: String,

    /// Flavor name or id
    #[validate(length(min = 1))]
    pub flavor: String,

    /// Network name or id
    #[validate(length(min = 1))]
    pub network: String,

    /// Keypair injected at boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub key_name: Option<String>,
}

/// A router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RouterSpec {
    /// Router name
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Attachment of a subnet to a router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct InterfaceSpec {
    /// Name of a router declared in the topology
    #[validate(length(min = 1))]
    pub router: String,

    /// Subnet to attach
    pub subnet: SubnetRef,
}

/// How an interface names its subnet.
///
/// In TOML this is written `subnet = { name = "subnet21" }` for a subnet the
/// topology creates, or `subnet = { id = "..." }` for an existing one such as
/// the public subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetRef {
    /// A subnet declared in the topology
    Name(String),
    /// An existing subnet outside the topology
    Id(SubnetId),
}

impl fmt::Display for SubnetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Id(id) => write!(f, "subnet {id}"),
        }
    }
}

impl Topology {
    /// Check the references between sections and the subnet addressing.
    ///
    /// Names must be unique per kind, every interface must reference a
    /// declared router and, by name, a declared subnet, and each subnet must
    /// be IPv4 with its gateway inside the range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] for a broken reference and
    /// [`Error::InvalidNetwork`] for bad addressing.
    pub fn check_references(&self) -> Result<()> {
        unique("network", self.networks.iter().map(|n| n.name.as_str()))?;
        unique("subnet", self.networks.iter().map(|n| n.subnet.name.as_str()))?;
        unique("server", self.servers.iter().map(|s| s.name.as_str()))?;
        unique("router", self.routers.iter().map(|r| r.name.as_str()))?;

        for network in &self.networks {
            network.subnet.check_addressing()?;
        }

        let routers: HashSet<&str> = self.routers.iter().map(|r| r.name.as_str()).collect();
        let subnets: HashSet<&str> = self
            .networks
            .iter()
            .map(|n| n.subnet.name.as_str())
            .collect();
        let mut attached = HashSet::new();
        for interface in &self.interfaces {
            if !routers.contains(interface.router.as_str()) {
                return Err(Error::ValidationError(format!(
                    "interface references unknown router `{}`",
                    interface.router
                )));
            }
            if let SubnetRef::Name(name) = &interface.subnet {
                if !subnets.contains(name.as_str()) {
                    return Err(Error::ValidationError(format!(
                        "interface on `{}` references unknown subnet `{name}`",
                        interface.router
                    )));
                }
            }
            if !attached.insert((interface.router.as_str(), &interface.subnet)) {
                return Err(Error::ValidationError(format!(
                    "`{}` is attached to {} more than once",
                    interface.router, interface.subnet
                )));
            }
        }

        Ok(())
    }
}

impl SubnetSpec {
    fn check_addressing(&self) -> Result<()> {
        let IpNet::V4(cidr) = self.cidr else {
            return Err(Error::InvalidNetwork(format!(
                "subnet `{}` must be IPv4, got {}",
                self.name, self.cidr
            )));
        };
        let Some(gateway) = self.gateway else {
            return Ok(());
        };
        let IpAddr::V4(gateway) = gateway else {
            return Err(Error::InvalidNetwork(format!(
                "gateway {gateway} of subnet `{}` is not IPv4",
                self.name
            )));
        };
        if !cidr.contains(&gateway) || gateway == cidr.network() || gateway == cidr.broadcast() {
            return Err(Error::InvalidNetwork(format!(
                "gateway {gateway} is not a host address of {cidr} (subnet `{}`)",
                self.name
            )));
        }
        Ok(())
    }
}

fn unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::ValidationError(format!(
                "{kind} name `{name}` is declared more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
impl Topology {
    /// The two-tier layout: a front network holding the calculator service,
    /// a back network holding the four operator services, a router from the
    /// public subnet to the front network and one from front to back.
    pub(crate) fn two_tier(public_subnet: SubnetId) -> Self {
        let network = |name: &str, subnet: &str, third_octet: u8| NetworkSpec {
            name: name.to_string(),
            subnet: SubnetSpec {
                name: subnet.to_string(),
                cidr: IpNet::V4(ipnet::Ipv4Net::new_assert(
                    std::net::Ipv4Addr::new(192, 168, third_octet, 0),
                    24,
                )),
                gateway: Some(IpAddr::V4(std::net::Ipv4Addr::new(192, 168, third_octet, 1))),
            },
        };
        let server = |name: &str, service: &str, key: &str, network: &str| ServerSpec {
            name: name.to_string(),
            image: format!("alpine-node_{service}Service"),
            flavor: "nano".to_string(),
            network: network.to_string(),
            key_name: Some(format!("{key}KeyPair")),
        };
        let interface = |router: &str, subnet: SubnetRef| InterfaceSpec {
            router: router.to_string(),
            subnet,
        };

        Self {
            networks: vec![
                network("Net21", "subnet21", 3),
                network("Net22", "subnet22", 4),
            ],
            servers: vec![
                server("Calc2", "Calc", "calc", "Net21"),
                server("Div2", "Div", "div", "Net22"),
                server("Mul2", "Mul", "mul", "Net22"),
                server("Sub2", "Sub", "sub", "Net22"),
                server("Sum2", "Sum", "sum", "Net22"),
            ],
            routers: vec![
                RouterSpec {
                    name: "RT21".to_string(),
                },
                RouterSpec {
                    name: "RT22".to_string(),
                },
            ],
            interfaces: vec![
                interface("RT21", SubnetRef::Id(public_subnet)),
                interface("RT21", SubnetRef::Name("subnet21".to_string())),
                interface("RT22", SubnetRef::Name("subnet21".to_string())),
                interface("RT22", SubnetRef::Name("subnet22".to_string())),
            ],
        }
    }
}
