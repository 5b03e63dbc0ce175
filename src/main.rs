//! ZFS Lifecycle CLI
//!
//! Operator-side entry point to the lifecycle layer: prints the CRDs and
//! inspects volume records the way the node agent and the provisioner see
//! them.

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use clap::{Parser, Subcommand};
use kube::{Client, CustomResourceExt, ResourceExt};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zfs_lifecycle::config::NAMESPACE_ENV;
use zfs_lifecycle::{
    Error, KubeStore, LifecycleConfig, Result, VolumeLifecycle, ZfsBackup, ZfsRestore,
    ZfsSnapshot, ZfsState, ZfsVolume,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ZFS Lifecycle - manage ZFS volume, snapshot, backup and restore records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace holding the ZFS resources
    #[arg(long, env = "OPENEBS_NAMESPACE")]
    namespace: Option<String>,

    /// Identity of this node
    #[arg(long, env = "OPENEBS_NODE_ID")]
    node_id: Option<String>,

    /// Set when running as the node driver; any non-empty value enables it
    #[arg(long, env = "OPENEBS_NODE_DRIVER")]
    node_driver: Option<String>,

    /// Analytics flag, passed through untouched
    #[arg(long, env = "OPENEBS_IO_ENABLE_ANALYTICS")]
    analytics: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the CustomResourceDefinitions as YAML
    Crds,

    /// List volumes claimed by a node
    Volumes {
        /// Node to list for, defaults to OPENEBS_NODE_ID
        #[arg(long)]
        node: Option<String>,
    },

    /// Show owner node and state of a volume
    VolumeState {
        volume: String,
    },

    /// Poll a volume until it leaves Pending
    WaitReady {
        volume: String,

        /// Give up after this many seconds
        #[arg(long, default_value = "300")]
        timeout_secs: u64,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    if let Command::Crds = args.command {
        return print_crds();
    }

    // Missing identity in node-driver mode is fatal
    let config = Arc::new(lifecycle_config(&args)?);
    if config.namespace.is_empty() {
        return Err(Error::Configuration(format!(
            "{} environment variable not set",
            NAMESPACE_ENV
        )));
    }

    info!("Starting {} {}", zfs_lifecycle::NAME, zfs_lifecycle::VERSION);
    info!("  Namespace: {}", config.namespace);
    info!("  Node ID: {}", config.node_id);
    info!("  Node driver: {}", config.node_driver);

    let client = Client::try_default().await?;
    let store = Arc::new(KubeStore::<ZfsVolume>::new(client, &config.namespace));
    let volumes = VolumeLifecycle::new(store, config.clone());

    match args.command {
        Command::Crds => Ok(()),
        Command::Volumes { node } => {
            let node = node.unwrap_or_else(|| config.node_id.clone());
            for vol in volumes.list_for_node(&node).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    vol.name_any(),
                    vol.spec.pool_name,
                    vol.spec.capacity,
                    vol.state()
                );
            }
            Ok(())
        }
        Command::VolumeState { volume } => {
            let (owner, state) = volumes.owner_and_state(&volume).await?;
            println!("{}\t{}", owner, state);
            Ok(())
        }
        Command::WaitReady {
            volume,
            timeout_secs,
        } => wait_ready(&volumes, &volume, Duration::from_secs(timeout_secs)).await,
    }
}

// =============================================================================
// Commands
// =============================================================================

fn lifecycle_config(args: &Args) -> Result<LifecycleConfig> {
    LifecycleConfig::validated(
        args.namespace.clone(),
        args.node_id.clone(),
        args.node_driver.as_deref().is_some_and(|v| !v.is_empty()),
        args.analytics.clone(),
    )
}

fn print_crds() -> Result<()> {
    let crds = [
        ZfsVolume::crd(),
        ZfsSnapshot::crd(),
        ZfsBackup::crd(),
        ZfsRestore::crd(),
    ];
    for crd in crds {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}

/// Poll with exponential backoff until the volume is Ready or Failed
async fn wait_ready(volumes: &VolumeLifecycle, volume: &str, timeout: Duration) -> Result<()> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(Some(timeout))
        .build();

    let (owner, state) = backoff::future::retry(policy, move || async move {
        match volumes.owner_and_state(volume).await {
            Ok((_, ZfsState::Pending)) => Err(backoff::Error::transient(Error::Unavailable(
                format!("volume {} is still Pending", volume),
            ))),
            Ok(done) => Ok(done),
            Err(e) if e.is_retryable() => Err(backoff::Error::transient(e)),
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await?;

    match state {
        ZfsState::Failed => {
            error!("Volume {} failed on node {}", volume, owner);
            Err(Error::Validation(format!(
                "volume {} is {} on node {}",
                volume, state, owner
            )))
        }
        _ => {
            info!("Volume {} is {} on node {}", volume, state, owner);
            Ok(())
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
