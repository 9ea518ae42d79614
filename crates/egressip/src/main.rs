mod commands;

use clap::{Parser, Subcommand};
use egressip_config::EgressIpConfig;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "egressip")]
#[command(about = "Add, move and release egress IPs on cloud and cluster in one step", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: $EGRESSIP_CONFIG_PATH, ./egressip.yaml, ~/.config/egressip/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Namespace the egress IP belongs to, used for failure alarms
    #[arg(short, long, global = true, env = "EGRESSIP_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Give up on the forward steps after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Let the cloud pick a new address on a host
    #[command(name = "add-random")]
    AddRandom {
        #[arg(long)]
        host: String,
        /// Failure domain the address is for
        #[arg(short, long)]
        domain: String,
    },
    /// Add a given address to a host
    Add {
        #[arg(long)]
        ip: IpAddr,
        #[arg(long)]
        host: String,
        #[arg(short, long, default_value = "")]
        domain: String,
    },
    /// Move an address to another host
    Move {
        #[arg(long)]
        ip: IpAddr,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(short, long, default_value = "")]
        domain: String,
    },
    /// Release an address from a host
    Remove {
        #[arg(long)]
        ip: IpAddr,
        #[arg(long)]
        host: String,
        #[arg(short, long, default_value = "")]
        domain: String,
    },
    /// Check that cloud and cluster both have the address on the host
    Check {
        #[arg(long)]
        ip: IpAddr,
        #[arg(long)]
        host: String,
    },
    /// Ask the cluster for a host and a free address of a failure domain
    #[command(name = "find-host")]
    FindHost {
        #[arg(short, long)]
        domain: String,
    },
    /// Put the failure domain ranges on a host (ocp-dynamic)
    #[command(name = "assign-cidr")]
    AssignCidr {
        #[arg(long)]
        host: String,
    },
    /// Validate the configuration
    Validate,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stdout carries the status JSON, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EgressIpConfig> {
    let config = match path {
        Some(path) => {
            let mut config = EgressIpConfig::load(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => EgressIpConfig::discover()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    if matches!(cli.command, Commands::Validate) {
        commands::validate::handle(&config);
        return Ok(());
    }

    let session = commands::Session::new(&config, &cli.namespace, cli.timeout).await?;

    let exit_code = match cli.command {
        Commands::AddRandom { host, domain } => {
            commands::provision::add_random(&session, &host, &domain).await
        }
        Commands::Add { ip, host, domain } => {
            commands::provision::add(&session, ip, &host, &domain).await
        }
        Commands::Move {
            ip,
            from,
            to,
            domain,
        } => commands::provision::relocate(&session, ip, &from, &to, &domain).await,
        Commands::Remove { ip, host, domain } => {
            commands::provision::remove(&session, ip, &host, &domain).await
        }
        Commands::Check { ip, host } => commands::inspect::check(&session, ip, &host).await,
        Commands::FindHost { domain } => commands::inspect::find_host(&session, &domain).await,
        Commands::AssignCidr { host } => commands::inspect::assign_cidr(&session, &host).await,
        Commands::Validate => Ok(0),
    }?;

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
