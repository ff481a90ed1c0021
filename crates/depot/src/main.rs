mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use depot_core::model::VersionedIdentifier;
use depot_core::site::LocalSite;
use depot_core::storage::{DepotConfig, LocalStorageProvider};
use depot_core::verification::{DigestManifest, PolicyListener, TrustPolicy};
use depot_core::{Application, ArchiveFeatureProvider, Error, Result};

use crate::cli::{ConsoleListener, ConsoleMonitor};

/// Depot: install, configure and roll back features of a local site
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Site directory to operate on
    #[arg(long, value_name = "DIR")]
    site: PathBuf,

    /// Engine configuration (json, yaml or toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the feature described by a JSON file
    Install {
        feature: PathBuf,
        /// Update site directory or URL
        #[arg(long, value_name = "DIR|URL")]
        from: String,
        /// Digest manifest to verify content against
        #[arg(long, value_name = "FILE")]
        digests: Option<PathBuf>,
        /// Answer to verification prompts, overriding the configuration
        #[arg(long, value_enum)]
        trust: Option<TrustArg>,
    },
    /// Unconfigure and uninstall a feature
    Remove { id: String, version: String },
    /// Configure an installed feature
    Configure { id: String, version: String },
    /// Unconfigure a feature, keeping its files
    Unconfigure { id: String, version: String },
    /// List installed features
    List,
    /// Show the configuration history, newest first
    History,
    /// Revert to an earlier configuration
    Revert { configuration: u64 },
    /// Keep a configuration from being evicted
    Preserve {
        configuration: u64,
        /// Allow eviction again
        #[arg(long)]
        release: bool,
    },
    /// Bytes a feature would download and occupy
    Size {
        feature: PathBuf,
        #[arg(long, value_name = "DIR|URL")]
        from: String,
    },
    /// Plugins only the given feature uses
    Orphans { id: String, version: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TrustArg {
    Never,
    Once,
    Always,
}

impl From<TrustArg> for TrustPolicy {
    fn from(value: TrustArg) -> Self {
        match value {
            TrustArg::Never => TrustPolicy::Never,
            TrustArg::Once => TrustPolicy::Once,
            TrustArg::Always => TrustPolicy::Always,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => DepotConfig::load(&LocalStorageProvider::new(PathBuf::new()), path)?,
        None => DepotConfig::default(),
    };
    let app = Application::new(config)?;
    app.start().await?;
    let site = app.open_site(&args.site).await?;
    info!("Using site {}", site.root().display());

    let outcome = execute(&app, &site, args.command).await;
    let stopped = app.shutdown().await;
    outcome?;
    stopped
}

async fn execute(app: &Application, site: &LocalSite, command: Commands) -> Result<()> {
    match command {
        Commands::Install { feature, from, digests, trust } => {
            let feature = cli::load_feature(&feature)?;
            let provider = provider_for(app, &from, digests.as_deref())?;
            let policy = trust.map(|t| PolicyListener::new(t.into())).unwrap_or_else(|| app.listener());
            let listener = ConsoleListener::new(policy);
            for import in site.unsatisfied_imports(&feature).await {
                eprintln!("warning: {} requires {}, which is not installed", feature.identifier, import);
            }
            let reference = site.install(&feature, &provider, &listener, &ConsoleMonitor::new()).await?;
            println!("Installed {} at {}", reference.identifier, reference.location.display());
        }
        Commands::Remove { id, version } => {
            let feature = identifier(id, &version)?;
            site.remove(&feature, &ConsoleMonitor::new()).await?;
            println!("Removed {}", feature);
        }
        Commands::Configure { id, version } => {
            let feature = identifier(id, &version)?;
            let configuration = site.configure(&feature).await?;
            println!("Configured {} in configuration {}", feature, configuration.id);
        }
        Commands::Unconfigure { id, version } => {
            let feature = identifier(id, &version)?;
            let configuration = site.unconfigure(&feature).await?;
            println!("Unconfigured {} in configuration {}", feature, configuration.id);
        }
        Commands::List => {
            let current = site.current_configuration()?;
            cli::print_features(&site.features().await, &current, site.root());
        }
        Commands::History => {
            cli::print_history(&*site.configuration_history()?, site.root());
        }
        Commands::Revert { configuration } => {
            let reverted = site.revert_to(configuration).await?;
            println!("Reverted to configuration {} as {}", configuration, reverted.id);
        }
        Commands::Preserve { configuration, release } => {
            if release {
                site.unpreserve(configuration)?;
                println!("Configuration {} may be evicted", configuration);
            } else {
                site.preserve(configuration)?;
                println!("Preserved configuration {}", configuration);
            }
        }
        Commands::Size { feature, from } => {
            let feature = cli::load_feature(&feature)?;
            let provider = app.provider(&from)?;
            println!("download: {}", cli::format_size(site.download_size_for(&feature, &provider).await));
            println!("install: {}", cli::format_size(site.install_size_for(&feature, &provider).await));
        }
        Commands::Orphans { id, version } => {
            let feature = identifier(id, &version)?;
            let plugins = site.plugins_only_referenced_by(&feature).await;
            if plugins.is_empty() {
                println!("No plugins used only by {}", feature);
            }
            for plugin in plugins {
                println!("{}", plugin.identifier);
            }
        }
    }
    Ok(())
}

fn provider_for(app: &Application, location: &str, digests: Option<&Path>) -> Result<ArchiveFeatureProvider> {
    match digests {
        Some(path) => {
            let manifest = DigestManifest::load(&LocalStorageProvider::new(PathBuf::new()), path)?;
            app.verified_provider(location, manifest)
        }
        None => app.provider(location),
    }
}

fn identifier(id: String, version: &str) -> Result<VersionedIdentifier> {
    VersionedIdentifier::parse(id, version).map_err(|e| Error::Other(e.to_string()))
}
