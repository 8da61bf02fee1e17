//! harden-rs - baseline hardening for Debian and Ubuntu servers
//!
//! Runs an ordered, idempotent sequence of steps:
//! - package refresh, safe upgrade and installs
//! - UFW firewall and SSH daemon hardening
//! - dotfiles, IPv6, timezone and an optional reboot

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use harden_rs::config::{ConfigLoader, DEFAULT_CONFIG_PATH, RunConfig};
use harden_rs::modules::sshd::render_sshd_config;
use harden_rs::runner::SystemRunner;
use harden_rs::state::{HostPaths, RunReport};
use harden_rs::{Provisioner, Step};

#[derive(Parser)]
#[command(name = "harden-rs")]
#[command(author, version, about = "Idempotent baseline hardening for Debian and Ubuntu servers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run configuration file (drop-ins are read from <name>.d/ next to it)
    #[arg(short, long, env = "HARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Ignore the drop-in directory next to the config file
    #[arg(long)]
    no_dropins: bool,

    /// Extra YAML merged over all config files, e.g. --set 'sshd_port: 2222'
    #[arg(long = "set", value_name = "YAML")]
    overlays: Vec<String>,

    /// Filesystem root of the host to configure
    #[arg(long, env = "HARDEN_ROOT", default_value = "/")]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full hardening sequence
    Apply {
        /// Also write the JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show which steps would run and which are skipped
    Plan,
    /// Print the rendered sshd_config
    RenderSshd,
    /// Print the effective merged configuration
    ShowConfig,
    /// Show the report of the last run
    Status,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

async fn load_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let mut loader = ConfigLoader::new(&cli.config);
    if cli.no_dropins {
        loader = loader.skip_dropins();
    }
    for overlay in &cli.overlays {
        loader = loader.with_overlay(overlay.as_str());
    }

    loader
        .load()
        .await
        .with_context(|| format!("loading configuration from {}", cli.config.display()))
}

async fn apply(cli: &Cli, report_path: Option<&PathBuf>) -> anyhow::Result<()> {
    let config = load_config(cli).await?;
    let paths = HostPaths::with_root(&cli.root);
    let runner = SystemRunner;

    info!("Running all hardening steps");
    let mut report = RunReport::start();
    let result = Provisioner::new(&config, &paths, &runner)
        .run_into(&mut report)
        .await;

    if let Err(e) = report.save(paths.last_run()).await {
        warn!("Could not write run report: {}", e);
    }
    if let Some(path) = report_path {
        report
            .save(path)
            .await
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    println!("{}", report.summary());
    result.context("hardening run aborted")?;
    Ok(())
}

fn plan(config: &RunConfig) {
    for (i, step) in Step::ALL.iter().enumerate() {
        let state = if step.is_enabled(config) {
            "run "
        } else {
            "skip"
        };
        println!("{:>2}. [{}] {:<20} {}", i + 1, state, step, step.description());
    }
}

async fn status(paths: &HostPaths) -> anyhow::Result<()> {
    match RunReport::load(paths.last_run()).await? {
        Some(report) => {
            for record in &report.steps {
                println!("{:<20} {}", record.step, record.outcome);
            }
            if let Some(failed) = &report.failed {
                println!("{:<20} failed: {}", failed.step, failed.error);
            }
            println!("{}", report.summary());
        }
        None => println!("No run recorded at {}", paths.last_run().display()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Some(Commands::Apply { report }) => apply(&cli, report.as_ref()).await?,
        Some(Commands::Plan) => plan(&load_config(&cli).await?),
        Some(Commands::RenderSshd) => {
            let config = load_config(&cli).await?;
            print!("{}", render_sshd_config(&config).await?);
        }
        Some(Commands::ShowConfig) => {
            let config = load_config(&cli).await?;
            print!("{}", config.to_yaml()?);
        }
        Some(Commands::Status) => status(&HostPaths::with_root(&cli.root)).await?,
        None => {
            info!("No command specified, running apply");
            apply(&cli, None).await?;
        }
    }

    Ok(())
}
