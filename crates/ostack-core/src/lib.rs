//! # ostack-core
//!
//! Core types and utilities shared by the OpenStack service clients.
//!
//! This crate provides the error type, the retrying HTTP client every service
//! crate builds on, strongly-typed resource identifiers and the Keystone
//! service catalog.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`uuid`] - Strongly-typed UUID wrappers for OpenStack resources
//! - [`types`] - Service types and endpoint interfaces
//! - [`config`] - Authentication and client settings
//! - [`client`] - HTTP client utilities and retry logic
//! - [`services`] - Service catalog and endpoint resolution
//! - [`query`] - Query string helpers

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod services;
pub mod types;
pub mod uuid;

// Re-export commonly used types
pub use error::{Error, Result};
