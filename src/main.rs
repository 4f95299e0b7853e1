//! Gantry - tool-server install orchestrator for OpenShift

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gantry::config::{self, InstallSettings};
use gantry::install::Installer;
use gantry::{compose, Error, Result};

/// Gantry - compose and install tool servers, then trigger document ingestion
#[derive(Parser, Debug)]
#[command(name = "gantry", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full install: bootstrap, provision, apply, wait, ingest
    Install(InstallArgs),

    /// Compose the resource set and print it without touching the cluster
    ///
    /// Credential placeholders resolve to empty strings since no bootstrap
    /// happens; useful for reviewing what an install would apply.
    Compose(ComposeArgs),
}

/// Install mode arguments
#[derive(Parser, Debug)]
struct InstallArgs {
    /// Path to the YAML values file
    #[arg(short = 'f', long = "values")]
    values_file: PathBuf,

    /// Control-plane admin password
    #[arg(long, env = "GANTRY_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// Override the target namespace from the values file
    #[arg(long, env = "GANTRY_NAMESPACE")]
    namespace: Option<String>,

    /// Override the control-plane base URL from the values file
    #[arg(long, env = "GANTRY_CONTROL_PLANE_URL")]
    control_plane_url: Option<String>,
}

/// Compose mode arguments
#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Path to the YAML values file
    #[arg(short = 'f', long = "values")]
    values_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Install(args) => run_install(args).await,
        Commands::Compose(args) => run_compose(args).await,
    }
}

async fn run_install(args: InstallArgs) -> Result<()> {
    let mut settings = load_settings(&args.values_file).await?;
    settings.apply_overrides(args.namespace, args.control_plane_url);

    let password = args.admin_password.unwrap_or_default();
    let installer = Installer::new(settings, password)?;
    installer.run().await
}

async fn run_compose(args: ComposeArgs) -> Result<()> {
    let settings = load_settings(&args.values_file).await?;

    // No bootstrap in compose mode; placeholders resolve to empty strings.
    let registry = config::resolve_registry(&settings.servers, &BTreeMap::new());
    let resources = compose::compose(
        &settings.release,
        &settings.chart,
        &settings.namespace,
        &registry,
    );

    for resource in &resources {
        let value = resource.to_value()?;
        let yaml =
            serde_yaml::to_string(&value).map_err(|e| Error::serialization(e.to_string()))?;
        println!("---");
        print!("{}", yaml);
    }

    Ok(())
}

async fn load_settings(path: &PathBuf) -> Result<InstallSettings> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::config(format!("cannot read values file {}: {}", path.display(), e)))?;
    InstallSettings::from_yaml(&content)
}
