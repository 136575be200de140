//! Ordered provisioning steps.
//!
//! A [`Plan`] flattens a [`Topology`] into the fixed order the provisioner
//! executes: every network with its subnet, then every server, then every
//! router, then every interface.

use crate::topology::{InterfaceSpec, NetworkSpec, RouterSpec, ServerSpec, SubnetSpec, Topology};
use std::fmt;

/// One unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Find or create a network.
    Network(NetworkSpec),
    /// Find or create the subnet of a network provisioned earlier.
    Subnet {
        /// Parent network name
        network: String,
        /// Subnet to ensure
        subnet: SubnetSpec,
    },
    /// Find or create a server and wait until it is `ACTIVE`.
    Server(ServerSpec),
    /// Find or create a router.
    Router(RouterSpec),
    /// Attach a subnet to a router unless already attached.
    Interface(InterfaceSpec),
}

impl Step {
    /// Short kind label, e.g. `network`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Subnet { .. } => "subnet",
            Self::Server(_) => "server",
            Self::Router(_) => "router",
            Self::Interface(_) => "interface",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(network) => write!(f, "network {}", network.name),
            Self::Subnet { network, subnet } => {
                write!(f, "subnet {} {} on {network}", subnet.name, subnet.cidr)?;
                if let Some(gateway) = subnet.gateway {
                    write!(f, " via {gateway}")?;
                }
                Ok(())
            }
            Self::Server(server) => {
                write!(
                    f,
                    "server {} ({} / {}) on {}",
                    server.name, server.image, server.flavor, server.network
                )?;
                if let Some(key) = &server.key_name {
                    write!(f, " key {key}")?;
                }
                Ok(())
            }
            Self::Router(router) => write!(f, "router {}", router.name),
            Self::Interface(interface) => {
                write!(f, "interface {} <-> {}", interface.router, interface.subnet)
            }
        }
    }
}

/// The ordered steps of a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Derive the steps for `topology`.
    #[must_use]
    pub fn from_topology(topology: &Topology) -> Self {
        let mut steps = Vec::with_capacity(
            topology.networks.len() * 2
                + topology.servers.len()
                + topology.routers.len()
                + topology.interfaces.len(),
        );

        for network in &topology.networks {
            steps.push(Step::Network(network.clone()));
            steps.push(Step::Subnet {
                network: network.name.clone(),
                subnet: network.subnet.clone(),
            });
        }
        steps.extend(topology.servers.iter().cloned().map(Step::Server));
        steps.extend(topology.routers.iter().cloned().map(Step::Router));
        steps.extend(topology.interfaces.iter().cloned().map(Step::Interface));

        Self { steps }
    }

    /// The steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(f, "{:>3}. {step}", index + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostack_core::uuid::SubnetId;

    fn two_tier_plan() -> Plan {
        let public = SubnetId::parse_str("369ab09c-411c-49a4-98f7-2b807a4b77df").unwrap();
        Plan::from_topology(&Topology::two_tier(public))
    }

    #[test]
    fn steps_follow_section_order() {
        let plan = two_tier_plan();
        let kinds: Vec<&str> = plan.steps().iter().map(Step::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "network", "subnet", "network", "subnet", "server", "server", "server", "server",
                "server", "router", "router", "interface", "interface", "interface", "interface",
            ]
        );
        assert_eq!(plan.len(), 15);
        assert!(!plan.is_empty());
    }

    #[test]
    fn step_descriptions() {
        let plan = two_tier_plan();
        let lines: Vec<String> = plan.steps().iter().map(ToString::to_string).collect();
        assert_eq!(lines[0], "network Net21");
        assert_eq!(lines[1], "subnet subnet21 192.168.3.0/24 on Net21 via 192.168.3.1");
        assert_eq!(
            lines[4],
            "server Calc2 (alpine-node_CalcService / nano) on Net21 key calcKeyPair"
        );
        assert_eq!(lines[9], "router RT21");
        assert_eq!(
            lines[11],
            "interface RT21 <-> subnet 369ab09c-411c-49a4-98f7-2b807a4b77df"
        );
        assert_eq!(lines[14], "interface RT22 <-> subnet22");
    }

    #[test]
    fn plan_display_numbers_steps() {
        let rendered = two_tier_plan().to_string();
        assert!(rendered.starts_with("  1. network Net21\n"));
        assert!(rendered.contains(" 15. interface RT22 <-> subnet22\n"));
    }

    #[test]
    fn empty_topology_has_no_steps() {
        assert!(Plan::from_topology(&Topology::default()).is_empty());
    }
}
