//! Plan execution.
//!
//! The [`Provisioner`] runs every [`Step`] of a [`Plan`] in order. Each step
//! looks its resource up by name first and only creates it when absent, so a
//! failed deployment can be re-run and resumes where it stopped.
//!
//! Resources created by the current run are remembered. When rollback is
//! enabled and a step fails, they are removed again in reverse order;
//! resources that already existed are never touched.

use crate::cloud::Cloud;
use crate::error::{DeployError, Result as DeployResult};
use crate::plan::{Plan, Step};
use crate::topology::{InterfaceSpec, NetworkSpec, RouterSpec, ServerSpec, SubnetRef, SubnetSpec};
use ostack_compute::{CreateServerRequest, ServerStatus, WaitOptions};
use ostack_core::uuid::{NetworkId, RouterId, ServerId, SubnetId};
use ostack_core::{Error, Result};
use ostack_network::CreateSubnetRequest;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Whether a step created its resource or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Created by this run
    Created,
    /// Already present
    Reused,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Created => "created",
            Self::Reused => "reused",
        })
    }
}

/// One provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Resource kind, e.g. `server`
    pub kind: &'static str,
    /// Resource name
    pub name: String,
    /// Resource id; interfaces report the router port
    pub id: String,
    /// Created or reused
    pub outcome: Outcome,
}

/// Summary of a successful deployment, in step order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    entries: Vec<ReportEntry>,
}

impl DeploymentReport {
    /// All entries in step order.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Number of resources created by the run.
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(Outcome::Created)
    }

    /// Number of resources that already existed.
    #[must_use]
    pub fn reused(&self) -> usize {
        self.count(Outcome::Reused)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    fn record(&mut self, kind: &'static str, name: &str, id: impl ToString, outcome: Outcome) {
        let id = id.to_string();
        info!(kind, name, %id, %outcome, "resource ready");
        self.entries.push(ReportEntry {
            kind,
            name: name.to_string(),
            id,
            outcome,
        });
    }
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{:<8} {:<10} {:<24} {}",
                entry.outcome, entry.kind, entry.name, entry.id
            )?;
        }
        write!(f, "{} created, {} reused", self.created(), self.reused())
    }
}

// Resources this run created, for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Created {
    Network(NetworkId),
    Subnet(SubnetId),
    Server(ServerId),
    Router(RouterId),
    Interface { router: RouterId, subnet: SubnetId },
}

impl fmt::Display for Created {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(id) => write!(f, "network {id}"),
            Self::Subnet(id) => write!(f, "subnet {id}"),
            Self::Server(id) => write!(f, "server {id}"),
            Self::Router(id) => write!(f, "router {id}"),
            Self::Interface { router, subnet } => write!(f, "interface {router} <-> {subnet}"),
        }
    }
}

/// Executes a [`Plan`] against a [`Cloud`].
pub struct Provisioner<'a> {
    cloud: &'a dyn Cloud,
    wait: WaitOptions,
    rollback_on_failure: bool,
    networks: HashMap<String, NetworkId>,
    subnets: HashMap<String, SubnetId>,
    routers: HashMap<String, RouterId>,
    created: Vec<Created>,
    report: DeploymentReport,
}

impl<'a> Provisioner<'a> {
    /// Create a provisioner with the given server wait options and rollback
    /// disabled.
    #[must_use]
    pub fn new(cloud: &'a dyn Cloud, wait: WaitOptions) -> Self {
        Self {
            cloud,
            wait,
            rollback_on_failure: false,
            networks: HashMap::new(),
            subnets: HashMap::new(),
            routers: HashMap::new(),
            created: Vec::new(),
            report: DeploymentReport::default(),
        }
    }

    /// Remove resources created by this run when a step fails.
    #[must_use]
    pub const fn with_rollback(mut self, enabled: bool) -> Self {
        self.rollback_on_failure = enabled;
        self
    }

    /// Execute every step in order.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Provision`] naming the first failed step.
    pub async fn run(mut self, plan: &Plan) -> DeployResult<DeploymentReport> {
        info!(steps = plan.len(), rollback = self.rollback_on_failure, "deploying");

        for step in plan.steps() {
            debug!(kind = step.kind(), %step, "step");
            if let Err(source) = self.execute(step).await {
                warn!(%step, error = %source, "step failed");
                let rolled_back = self.rollback_on_failure && self.rollback().await;
                return Err(DeployError::Provision {
                    step: step.to_string(),
                    source,
                    rolled_back,
                });
            }
        }

        info!(
            created = self.report.created(),
            reused = self.report.reused(),
            "deployment complete"
        );
        Ok(self.report)
    }

    async fn execute(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Network(network) => self.ensure_network(network).await,
            Step::Subnet { network, subnet } => self.ensure_subnet(network, subnet).await,
            Step::Server(server) => self.ensure_server(server).await,
            Step::Router(router) => self.ensure_router(router).await,
            Step::Interface(interface) => self.attach_interface(interface).await,
        }
    }

    async fn ensure_network(&mut self, spec: &NetworkSpec) -> Result<()> {
        let (network, outcome) = match self.cloud.find_network(&spec.name).await? {
            Some(network) => (network, Outcome::Reused),
            None => {
                let network = self.cloud.create_network(&spec.name).await?;
                self.created.push(Created::Network(network.id));
                (network, Outcome::Created)
            }
        };
        self.networks.insert(spec.name.clone(), network.id);
        self.report.record("network", &spec.name, network.id, outcome);
        Ok(())
    }

    async fn ensure_subnet(&mut self, network: &str, spec: &SubnetSpec) -> Result<()> {
        let network_id = *self.networks.get(network).ok_or_else(|| {
            Error::ValidationError(format!("network `{network}` was not provisioned"))
        })?;

        let (subnet, outcome) = match self.cloud.find_subnet(&spec.name, Some(network_id)).await? {
            Some(subnet) if subnet.cidr != spec.cidr => {
                return Err(Error::Conflict(format!(
                    "subnet `{}` exists with {} instead of {}",
                    spec.name, subnet.cidr, spec.cidr
                )));
            }
            Some(subnet) if spec.gateway.is_some() && subnet.gateway_ip != spec.gateway => {
                return Err(Error::Conflict(format!(
                    "subnet `{}` exists with gateway {} instead of {}",
                    spec.name,
                    gateway_label(subnet.gateway_ip),
                    gateway_label(spec.gateway)
                )));
            }
            Some(subnet) => (subnet, Outcome::Reused),
            None => {
                let request =
                    CreateSubnetRequest::ipv4(&spec.name, network_id, spec.cidr, spec.gateway);
                let subnet = self.cloud.create_subnet(&request).await?;
                self.created.push(Created::Subnet(subnet.id));
                (subnet, Outcome::Created)
            }
        };
        self.subnets.insert(spec.name.clone(), subnet.id);
        self.report.record("subnet", &spec.name, subnet.id, outcome);
        Ok(())
    }

    async fn ensure_server(&mut self, spec: &ServerSpec) -> Result<()> {
        if let Some(server) = self.cloud.find_server(&spec.name).await? {
            if server.status.is_stopped() {
                return Err(Error::InvalidServerState(format!(
                    "server {} ({}) is {}",
                    spec.name, server.id, server.status
                )));
            }
            if server.status != ServerStatus::Active {
                debug!(name = %spec.name, status = %server.status, "waiting on existing server");
                self.cloud.wait_for_server(server.id, &self.wait).await?;
            }
            self.report.record("server", &spec.name, server.id, Outcome::Reused);
            return Ok(());
        }

        let image = self
            .cloud
            .find_image(&spec.image)
            .await?
            .ok_or_else(|| Error::NotFound(format!("image `{}`", spec.image)))?;
        let flavor = self
            .cloud
            .find_flavor(&spec.flavor)
            .await?
            .ok_or_else(|| Error::NotFound(format!("flavor `{}`", spec.flavor)))?;
        let network = self
            .cloud
            .find_network(&spec.network)
            .await?
            .ok_or_else(|| Error::NotFound(format!("network `{}`", spec.network)))?;

        let mut request = CreateServerRequest::new(&spec.name, image.id, flavor.id, network.id);
        if let Some(key_name) = &spec.key_name {
            request = request.with_key_name(key_name);
        }
        let id = self.cloud.create_server(&request).await?;
        self.created.push(Created::Server(id));

        self.cloud.wait_for_server(id, &self.wait).await?;
        self.report.record("server", &spec.name, id, Outcome::Created);
        Ok(())
    }

    async fn ensure_router(&mut self, spec: &RouterSpec) -> Result<()> {
        let (router, outcome) = match self.cloud.find_router(&spec.name).await? {
            Some(router) => (router, Outcome::Reused),
            None => {
                let router = self.cloud.create_router(&spec.name).await?;
                self.created.push(Created::Router(router.id));
                (router, Outcome::Created)
            }
        };
        self.routers.insert(spec.name.clone(), router.id);
        self.report.record("router", &spec.name, router.id, outcome);
        Ok(())
    }

    async fn attach_interface(&mut self, spec: &InterfaceSpec) -> Result<()> {
        let router = match self.routers.get(&spec.router) {
            Some(id) => *id,
            None => {
                self.cloud
                    .find_router(&spec.router)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("router `{}`", spec.router)))?
                    .id
            }
        };
        let subnet = match &spec.subnet {
            SubnetRef::Id(id) => *id,
            SubnetRef::Name(name) => match self.subnets.get(name) {
                Some(id) => *id,
                None => {
                    self.cloud
                        .find_subnet(name, None)
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("subnet `{name}`")))?
                        .id
                }
            },
        };

        let label = format!("{} <-> {}", spec.router, spec.subnet);
        if let Some(port) = self.cloud.router_interface_port(router, subnet).await? {
            self.report.record("interface", &label, port.id, Outcome::Reused);
            return Ok(());
        }

        let port = match self.cloud.add_router_interface(router, subnet).await {
            Ok(interface) => interface.port_id,
            Err(err) if attach_may_have_applied(&err) => {
                // The attach can land even though the reply was lost or rejected.
                match self.cloud.router_interface_port(router, subnet).await? {
                    Some(port) => {
                        warn!(
                            interface = %label,
                            error = %err,
                            "interface present after failed attach"
                        );
                        port.id
                    }
                    None => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };
        self.created.push(Created::Interface { router, subnet });
        self.report.record("interface", &label, port, Outcome::Created);
        Ok(())
    }

    // Returns true when every created resource was removed.
    async fn rollback(&mut self) -> bool {
        info!(resources = self.created.len(), "rolling back");
        let mut clean = true;

        while let Some(resource) = self.created.pop() {
            let result = match &resource {
                Created::Interface { router, subnet } => {
                    self.cloud.remove_router_interface(*router, *subnet).await
                }
                Created::Router(id) => self.cloud.delete_router(*id).await,
                Created::Server(id) => match self.cloud.delete_server(*id).await {
                    Ok(()) => self.cloud.wait_for_server_deleted(*id, &self.wait).await,
                    Err(err) => Err(err),
                },
                Created::Subnet(id) => self.cloud.delete_subnet(*id).await,
                Created::Network(id) => self.cloud.delete_network(*id).await,
            };
            match result {
                Ok(()) => info!(%resource, "removed"),
                Err(Error::NotFound(_)) => debug!(%resource, "already gone"),
                Err(err) => {
                    clean = false;
                    warn!(%resource, error = %err, "rollback failed");
                }
            }
        }

        clean
    }
}

// Transient failures and "already has a port" rejections leave the
// interface state unknown until the router ports are checked again.
const fn attach_may_have_applied(err: &Error) -> bool {
    matches!(
        err,
        Error::ServiceUnavailable(_)
            | Error::Timeout(_)
            | Error::BadRequest(_)
            | Error::Conflict(_)
    )
}

fn gateway_label(gateway: Option<IpAddr>) -> String {
    gateway.map_or_else(|| "none".to_string(), |ip| ip.to_string())
}
