//! # ostack-deploy
//!
//! Provisions a small routed topology on OpenStack: private networks with
//! subnets, servers attached to them, and routers wired between the subnets
//! and a public network.
//!
//! Every step is keyed by resource name and checks for an existing resource
//! before creating one, so an interrupted run can simply be repeated.
//!
//! ## Modules
//!
//! - [`config`] - TOML deployment configuration and validation
//! - [`topology`] - The desired networks, servers, routers and interfaces
//! - [`plan`] - Ordered provisioning steps derived from a topology
//! - [`cloud`] - The cloud operations the provisioner needs, and the
//!   OpenStack implementation
//! - [`provision`] - Step execution, rollback and the deployment report
//! - [`inventory`] - Streaming listings of cloud resources
//! - [`error`] - Deployment error type and process exit codes

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cloud;
pub mod config;
pub mod error;
pub mod inventory;
pub mod plan;
pub mod provision;
pub mod topology;

pub use cloud::{connect, Cloud, OpenStackCloud};
pub use config::DeployConfig;
pub use error::{DeployError, Result};
pub use plan::{Plan, Step};
pub use provision::{DeploymentReport, Provisioner};
pub use topology::Topology;
