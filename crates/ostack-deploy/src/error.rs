//! Deployment error type.
//!
//! Every failure the `ostack` binary can report falls into one of these
//! variants, each mapped onto a distinct process exit code.

use thiserror::Error;

/// Errors raised while loading configuration, connecting, provisioning or
/// listing resources.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The configuration file is missing, malformed or inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication or endpoint discovery failed
    #[error("failed to connect to {auth_url}: {source}")]
    Connect {
        /// Identity endpoint that was contacted
        auth_url: String,
        /// Underlying client error
        #[source]
        source: ostack_core::Error,
    },

    /// A provisioning step failed
    #[error("step `{step}` failed: {source}{}", rollback_suffix(.rolled_back))]
    Provision {
        /// Description of the failed step
        step: String,
        /// Underlying client error
        #[source]
        source: ostack_core::Error,
        /// Whether resources created by this run were removed
        rolled_back: bool,
    },

    /// Listing a resource collection failed
    #[error("listing {resource} failed: {source}")]
    Inventory {
        /// Resource collection being listed
        resource: &'static str,
        /// Underlying client error
        #[source]
        source: ostack_core::Error,
    },

    /// Writing output failed
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

fn rollback_suffix(rolled_back: &bool) -> &'static str {
    if *rolled_back {
        " (rolled back)"
    } else {
        ""
    }
}

/// Result alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Connect { .. } => 3,
            Self::Provision { .. } => 4,
            Self::Inventory { .. } => 5,
            Self::Output(_) => 1,
        }
    }

    /// The underlying client error, if any.
    #[must_use]
    pub const fn client_error(&self) -> Option<&ostack_core::Error> {
        match self {
            Self::Connect { source, .. }
            | Self::Provision { source, .. }
            | Self::Inventory { source, .. } => Some(source),
            Self::Config(_) | Self::Output(_) => None,
        }
    }
}
