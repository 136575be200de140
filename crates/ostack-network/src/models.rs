//! Neutron data models for networks, subnets, routers and ports.

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use ostack_core::query::{PageRequest, Paged, QueryParams};
use ostack_core::uuid::{NetworkId, PortId, RouterId, SubnetId};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Device owner Neutron assigns to router interface ports.
///
/// Distributed routers use `network:router_interface_distributed`, which
/// shares this prefix.
pub const ROUTER_INTERFACE_OWNER: &str = "network:router_interface";

/// Device owner of interface ports on HA routers.
pub const HA_ROUTER_INTERFACE_OWNER: &str = "network:ha_router_replicated_interface";

/// Query parameters supported by `/networks`.
#[derive(Debug, Default, Clone)]
pub struct NetworkListParams {
    /// Filter by exact network name.
    pub name: Option<String>,
    /// Only external (provider) networks.
    pub external: Option<bool>,
}

impl NetworkListParams {
    /// Convert the params and a page cursor into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_deref());
        params.push_opt("router:external", self.external);
        params.push_page(page);
        params.into_pairs()
    }
}

/// Network representation returned by Neutron.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    /// Network id.
    pub id: NetworkId,
    /// Network name.
    pub name: String,
    /// Operational status (`ACTIVE`, `DOWN`, `BUILD`, `ERROR`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Administrative state.
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// Shared across projects.
    #[serde(default)]
    pub shared: bool,
    /// External (provider) network.
    #[serde(rename = "router:external", default)]
    pub external: bool,
    /// Subnets on this network.
    #[serde(default)]
    pub subnets: Vec<SubnetId>,
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Paged for Network {
    fn marker(&self) -> String {
        self.id.to_string()
    }
}

/// Payload for `POST /networks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateNetworkRequest {
    /// Network name.
    pub name: String,
    /// Administrative state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

impl CreateNetworkRequest {
    /// A request for an enabled network named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin_state_up: Some(true),
        }
    }
}

/// Query parameters supported by `/subnets`.
#[derive(Debug, Default, Clone)]
pub struct SubnetListParams {
    /// Filter by exact subnet name.
    pub name: Option<String>,
    /// Filter by parent network.
    pub network_id: Option<NetworkId>,
}

impl SubnetListParams {
    /// Convert the params and a page cursor into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_deref());
        params.push_opt("network_id", self.network_id.as_ref());
        params.push_page(page);
        params.into_pairs()
    }
}

/// Subnet representation returned by Neutron.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subnet {
    /// Subnet id.
    pub id: SubnetId,
    /// Subnet name.
    #[serde(default)]
    pub name: String,
    /// Parent network.
    pub network_id: NetworkId,
    /// Address range.
    pub cidr: IpNet,
    /// IP version, 4 or 6.
    pub ip_version: u8,
    /// Default gateway, `None` when the subnet has no gateway.
    #[serde(default)]
    pub gateway_ip: Option<IpAddr>,
    /// DHCP enabled.
    #[serde(default = "default_true")]
    pub enable_dhcp: bool,
}

impl Paged for Subnet {
    fn marker(&self) -> String {
        self.id.to_string()
    }
}

/// Payload for `POST /subnets`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSubnetRequest {
    /// Subnet name.
    pub name: String,
    /// Parent network id.
    pub network_id: NetworkId,
    /// IP version.
    pub ip_version: u8,
    /// Address range.
    pub cidr: IpNet,
    /// Default gateway; Neutron picks the first host address when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<IpAddr>,
}

impl CreateSubnetRequest {
    /// An IPv4 subnet request.
    #[must_use]
    pub fn ipv4(
        name: impl Into<String>,
        network_id: NetworkId,
        cidr: IpNet,
        gateway_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            name: name.into(),
            network_id,
            ip_version: 4,
            cidr,
            gateway_ip,
        }
    }
}

/// Query parameters supported by `/routers`.
#[derive(Debug, Default, Clone)]
pub struct RouterListParams {
    /// Filter by exact router name.
    pub name: Option<String>,
}

impl RouterListParams {
    /// Convert the params and a page cursor into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_deref());
        params.push_page(page);
        params.into_pairs()
    }
}

/// External gateway of a router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalGateway {
    /// External network.
    pub network_id: NetworkId,
    /// Source NAT enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_snat: Option<bool>,
}

/// Router representation returned by Neutron.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Router {
    /// Router id.
    pub id: RouterId,
    /// Router name.
    pub name: String,
    /// Operational status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Administrative state.
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// Gateway to an external network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_gateway_info: Option<ExternalGateway>,
}

impl Paged for Router {
    fn marker(&self) -> String {
        self.id.to_string()
    }
}

/// Payload for `POST /routers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRouterRequest {
    /// Router name.
    pub name: String,
    /// Administrative state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

impl CreateRouterRequest {
    /// A request for an enabled router named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin_state_up: Some(true),
        }
    }
}

/// Body of `add_router_interface` / `remove_router_interface`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterInterfaceRequest {
    /// Subnet to attach or detach.
    pub subnet_id: SubnetId,
}

/// Result of attaching a subnet to a router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterInterface {
    /// Router id.
    pub id: RouterId,
    /// Attached subnet.
    pub subnet_id: SubnetId,
    /// Port created on the subnet.
    pub port_id: PortId,
    /// Network of the subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<NetworkId>,
}

/// Query parameters supported by `/ports`.
#[derive(Debug, Default, Clone)]
pub struct PortListParams {
    /// Filter by owning device, e.g. a router id.
    pub device_id: Option<String>,
    /// Filter by device owner.
    pub device_owner: Option<String>,
    /// Filter by network.
    pub network_id: Option<NetworkId>,
}

impl PortListParams {
    /// Ports owned by `router`.
    ///
    /// The owner is not filtered server side since it differs between
    /// legacy, distributed and HA routers; see [`Port::is_router_interface`].
    #[must_use]
    pub fn router_ports(router: RouterId) -> Self {
        Self {
            device_id: Some(router.to_string()),
            ..Self::default()
        }
    }

    /// Convert the params into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("device_id", self.device_id.as_deref());
        params.push_opt("device_owner", self.device_owner.as_deref());
        params.push_opt("network_id", self.network_id.as_ref());
        params.into_pairs()
    }
}

/// Fixed address of a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedIp {
    /// Subnet the address belongs to.
    pub subnet_id: SubnetId,
    /// The address.
    pub ip_address: IpAddr,
}

/// Port representation returned by Neutron.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Port {
    /// Port id.
    pub id: PortId,
    /// Port name.
    #[serde(default)]
    pub name: String,
    /// Network of the port.
    pub network_id: NetworkId,
    /// Owning device id.
    #[serde(default)]
    pub device_id: String,
    /// Owning device kind.
    #[serde(default)]
    pub device_owner: String,
    /// Fixed addresses.
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

impl Port {
    /// Returns true if the port has an address on `subnet`.
    #[must_use]
    pub fn is_on_subnet(&self, subnet: SubnetId) -> bool {
        self.fixed_ips.iter().any(|ip| ip.subnet_id == subnet)
    }

    /// Returns true if the port is a router interface of any router flavor.
    #[must_use]
    pub fn is_router_interface(&self) -> bool {
        self.device_owner.starts_with(ROUTER_INTERFACE_OWNER)
            || self.device_owner == HA_ROUTER_INTERFACE_OWNER
    }
}

const fn default_true() -> bool {
    true
}

macro_rules! envelope {
    ($name:ident, $field:ident, $ty:ty) => {
        #[derive(Debug, Serialize, Deserialize)]
        pub(crate) struct $name<T = $ty> {
            pub $field: T,
        }
    };
}

envelope!(NetworkEnvelope, network, Network);
envelope!(NetworksEnvelope, networks, Vec<Network>);
envelope!(SubnetEnvelope, subnet, Subnet);
envelope!(SubnetsEnvelope, subnets, Vec<Subnet>);
envelope!(RouterEnvelope, router, Router);
envelope!(RoutersEnvelope, routers, Vec<Router>);
envelope!(PortsEnvelope, ports, Vec<Port>);
