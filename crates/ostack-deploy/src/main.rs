//! ostack - provision and inspect a two-tier OpenStack topology.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ostack_deploy::inventory::{self, OutputFormat, Resource};
use ostack_deploy::{connect, DeployConfig, DeployError, Plan, Provisioner};
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Provision networks, servers and routers on OpenStack
#[derive(Parser)]
#[command(name = "ostack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the configured user name
    #[arg(long, env = "OS_USERNAME", global = true)]
    username: Option<String>,

    /// Override the configured password
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every missing resource of the topology
    Deploy {
        /// Deployment configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Remove resources created by this run if a step fails
        #[arg(long)]
        rollback_on_failure: bool,
    },

    /// Print the ordered steps without contacting the cloud
    Plan {
        /// Deployment configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List existing resources
    List {
        /// Collection to list
        #[arg(value_enum)]
        resource: Resource,

        /// Deployment configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let code = err
                .downcast_ref::<DeployError>()
                .map_or(1, DeployError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let credentials = (cli.username, cli.password.map(SecretString::from));

    match cli.command {
        Commands::Deploy {
            config,
            rollback_on_failure,
        } => {
            let config = load(&config, credentials)?.with_rollback(rollback_on_failure);
            let plan = Plan::from_topology(&config.topology);
            let cloud = connect(&config.auth, &config.client).await?;

            let report = Provisioner::new(&cloud, config.wait.options())
                .with_rollback(config.rollback_on_failure)
                .run(&plan)
                .await?;
            println!("{report}");
        }
        Commands::Plan { config } => {
            let config = load(&config, credentials)?;
            print!("{}", Plan::from_topology(&config.topology));
        }
        Commands::List {
            resource,
            config,
            json,
        } => {
            let config = load(&config, credentials)?;
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            };
            let cloud = connect(&config.auth, &config.client).await?;
            let mut stdout = std::io::stdout().lock();
            inventory::list(&cloud, resource, format, &mut stdout)
                .await
                .with_context(|| format!("ostack list {resource}"))?;
        }
    }

    Ok(())
}

fn load(
    path: &std::path::Path,
    (username, password): (Option<String>, Option<SecretString>),
) -> Result<DeployConfig, DeployError> {
    Ok(DeployConfig::load(path)?.with_credentials(username, password))
}
