//! Deployment configuration file.
//!
//! ```toml
//! rollback_on_failure = false
//!
//! [auth]
//! auth_url = "https://keystone.example:5000/v3"
//! region_name = "RegionOne"
//! project_name = "demo"
//! username = "alice"
//! domain_name = "Default"
//!
//! [wait]
//! timeout_secs = 120
//! interval_secs = 2
//!
//! [[topology.networks]]
//! name = "Net21"
//! subnet = { name = "subnet21", cidr = "192.168.3.0/24", gateway = "192.168.3.1" }
//! ```

use crate::error::{DeployError, Result};
use crate::topology::Topology;
use ostack_compute::WaitOptions;
use ostack_core::config::{AuthConfig, ClientSettings};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Root of the deployment configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeployConfig {
    /// Keystone credentials and scope
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Settings shared by the service clients
    #[serde(default)]
    #[validate(nested)]
    pub client: ClientSettings,

    /// Server readiness polling
    #[serde(default)]
    #[validate(nested)]
    pub wait: WaitSettings,

    /// Remove resources created by a failed run
    #[serde(default)]
    pub rollback_on_failure: bool,

    /// Resources to provision
    #[serde(default)]
    #[validate(nested)]
    pub topology: Topology,
}

/// How long to wait for a server to become `ACTIVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct WaitSettings {
    /// Upper bound on the wait, in seconds
    #[serde(default = "default_wait_timeout")]
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,

    /// Delay between status polls, in seconds
    #[serde(default = "default_wait_interval")]
    #[validate(range(min = 1, max = 60))]
    pub interval_secs: u64,
}

const fn default_wait_timeout() -> u64 {
    ostack_compute::client::DEFAULT_WAIT_TIMEOUT.as_secs()
}

const fn default_wait_interval() -> u64 {
    ostack_compute::client::DEFAULT_POLL_INTERVAL.as_secs()
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_wait_timeout(),
            interval_secs: default_wait_interval(),
        }
    }
}

impl WaitSettings {
    /// Polling options for the compute client.
    #[must_use]
    pub const fn options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_interval(Duration::from_secs(self.interval_secs))
    }
}

impl DeployConfig {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Config`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Config`] if parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| DeployError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Validate field constraints and cross references.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Config`] describing the problem.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| DeployError::Config(format!("invalid configuration: {e}")))?;
        self.topology
            .check_references()
            .map_err(|e| DeployError::Config(e.to_string()))
    }

    /// Replace the configured credentials with those given on the command
    /// line or in the environment.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: Option<String>,
        password: Option<SecretString>,
    ) -> Self {
        if let Some(username) = username {
            self.auth.username = username;
        }
        if let Some(password) = password {
            self.auth.password = Some(password);
        }
        self
    }

    /// Force rollback on failure.
    #[must_use]
    pub const fn with_rollback(mut self, enabled: bool) -> Self {
        self.rollback_on_failure = self.rollback_on_failure || enabled;
        self
    }
}
