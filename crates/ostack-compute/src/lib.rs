//! Nova client and data models for OpenStack compute.
//!
//! Provides typed structures and an asynchronous client for servers and
//! flavors, including polling a new server until it becomes `ACTIVE`.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{ComputeClient, ComputeClientBuilder, WaitOptions};
pub use models::{
    CreateServerRequest, CreatedServer, Flavor, FlavorId, Server, ServerListParams,
    ServerNetwork, ServerStatus,
};

/// Convenient result alias sharing the `ostack-core` error type.
pub type Result<T> = ostack_core::Result<T>;
