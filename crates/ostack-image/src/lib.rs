//! Glance client and data models for OpenStack images.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{ImageClient, ImageClientBuilder};
pub use models::{Image, ImageListParams, ImageStatus};

/// Convenient result alias sharing the `ostack-core` error type.
pub type Result<T> = ostack_core::Result<T>;
