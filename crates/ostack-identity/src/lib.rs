//! Keystone client for OpenStack authentication.
//!
//! Exchanges password credentials for a project-scoped token and exposes the
//! resulting [`Session`], which every other service client is built from.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{IdentityClient, IdentityClientBuilder, Session};
pub use models::{DomainRef, NamedRef, TokenBody};

/// Convenient result alias sharing the `ostack-core` error type.
pub type Result<T> = ostack_core::Result<T>;
