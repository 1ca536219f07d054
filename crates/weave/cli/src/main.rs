//! Weave CLI - compile pipeline graphs and deploy them
//!
//! This CLI gives operators a terminal interface to:
//! - Compile an editor payload into a service topology
//! - Export the rendered deployment artifacts
//! - Deploy to a remote host or through the cluster control plane
//! - Watch a running deployment until it is healthy

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Weave CLI application
#[derive(Parser)]
#[command(name = "weave")]
#[command(about = "Weave - pipeline graph compiler and deployment orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Remote target options shared by deploy and watch.
#[derive(Args, Clone)]
struct RemoteArgs {
    /// Target host name or address
    #[arg(long)]
    host: String,

    /// Ssh port
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// Ssh user
    #[arg(long)]
    user: String,

    /// Password authentication (omit to use the local ssh agent)
    #[arg(long, env = "WEAVE_SSH_PASSWORD")]
    password: Option<String>,

    /// Private-key authentication
    #[arg(long, conflicts_with = "password")]
    key: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Compile an editor payload into a service topology
    Compile {
        /// Editor payload (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render deployment artifacts for a payload
    Export {
        /// Editor payload (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Pack the artifacts into a tar.gz archive as well
        #[arg(long)]
        archive: bool,
    },

    /// Deploy a payload to a target
    Deploy {
        #[command(subcommand)]
        command: DeployCommands,
    },

    /// Watch a running remote deployment until it is healthy
    Watch {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Subcommand)]
enum DeployCommands {
    /// Deploy over ssh + compose
    Remote {
        /// Editor payload (JSON)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Deploy through the cluster control plane
    Cluster {
        /// Editor payload (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Isolation namespace
        #[arg(long)]
        namespace: String,

        /// Control-plane API base URL
        #[arg(long, env = "WEAVE_API_URL", default_value = "http://localhost:8080")]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    match cli.command {
        Commands::Compile { input, output } => commands::compile(&input, output.as_deref()),
        Commands::Export {
            input,
            output,
            archive,
        } => commands::export(&input, &output, archive),
        Commands::Deploy { command } => match command {
            DeployCommands::Remote { input, remote } => {
                commands::deploy_remote(&input, remote.into_target()).await
            }
            DeployCommands::Cluster {
                input,
                namespace,
                api_url,
            } => commands::deploy_cluster(&input, &namespace, &api_url).await,
        },
        Commands::Watch { remote } => commands::watch(remote.into_target()).await,
    }
}

impl RemoteArgs {
    fn into_target(self) -> weave_types::RemoteTarget {
        let auth = match (self.password, self.key) {
            (Some(password), _) => weave_types::RemoteAuth::Password(password),
            (None, Some(key)) => weave_types::RemoteAuth::KeyFile(key),
            (None, None) => weave_types::RemoteAuth::Agent,
        };
        let mut target = weave_types::RemoteTarget::new(self.host, self.user, auth);
        target.port = self.port;
        target
    }
}
