//! Neutron client and data models for OpenStack networking.
//!
//! Provides typed structures and an asynchronous client for networks,
//! subnets, routers and the ports that back router interfaces.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{NetworkClient, NetworkClientBuilder};
pub use models::{
    CreateNetworkRequest, CreateRouterRequest, CreateSubnetRequest, FixedIp, Network,
    NetworkListParams, Port, PortListParams, Router, RouterInterface, RouterListParams, Subnet,
    SubnetListParams,
};

/// Convenient result alias sharing the `ostack-core` error type.
pub type Result<T> = ostack_core::Result<T>;
