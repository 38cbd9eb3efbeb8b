//! simple-app-operator - backs SimpleApp resources with a Service and a Deployment

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kube::{Api, Client, CustomResourceExt};

use simple_app_operator::controller::{ClusterClientImpl, Reconciler};
use simple_app_operator::crd::{render_crd, SimpleApp};
use simple_app_operator::dispatch::{Dispatcher, DispatcherConfig};
use simple_app_operator::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use simple_app_operator::FIELD_MANAGER;

/// simple-app-operator - provisions a Service and a Deployment for every SimpleApp
#[derive(Parser, Debug)]
#[command(name = "simple-app-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (json or text)
    #[arg(long, env = "SIMPLE_APP_LOG_FORMAT", default_value = "json", global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches SimpleApp resources, creates the backing Service and
    /// Deployment when one appears and deletes them when it is removed.
    Controller,
}

#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch SimpleApps in this namespace (default: all namespaces)
    #[arg(long, env = "SIMPLE_APP_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Seconds to wait before delivering a failed event again
    #[arg(long, env = "SIMPLE_APP_RETRY_BACKOFF_SECS", default_value_t = 5, global = true)]
    retry_backoff_secs: u64,

    /// Maximum number of SimpleApps handled at once
    #[arg(long, env = "SIMPLE_APP_CONCURRENCY", default_value_t = 1, global = true)]
    concurrency: u16,

    /// Install or update the SimpleApp CRD on startup
    #[arg(long, env = "SIMPLE_APP_INSTALL_CRD", global = true)]
    install_crd: bool,
}

impl ControllerArgs {
    fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            namespace: self.namespace.clone(),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            concurrency: self.concurrency,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        println!("{}", render_crd()?);
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        log_format: cli.log_format,
    })?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.controller).await,
    }
}

/// Ensure the SimpleApp CRD is installed
///
/// Uses server-side apply so the installed schema always matches this binary.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!(crd = SimpleApp::crd_name(), "installing SimpleApp CRD");
    crds.patch(SimpleApp::crd_name(), &params, &Patch::Apply(&SimpleApp::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install SimpleApp CRD: {}", e))?;

    Ok(())
}

/// Run in controller mode
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("simple-app controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.install_crd {
        ensure_crd_installed(&client).await?;
    }

    let reconciler = Reconciler::new(Arc::new(ClusterClientImpl::new(client.clone())));
    Dispatcher::new(client, args.dispatcher_config(), Arc::new(reconciler))
        .run()
        .await;

    tracing::info!("simple-app controller stopped");
    Ok(())
}
