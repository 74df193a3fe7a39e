//! Binary entry point for the Atlas lifecycle CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use atlas_lifecycle::{
    AtlasClient, AtlasConfig, AtlasError, ConfigError, InstanceApi, InstanceId, InstanceRequest,
    LifecycleError, LifecycleOrchestrator,
};

mod cli;

use cli::{Cli, CreateCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("client error: {0}")]
    Client(#[from] AtlasError),
    #[error("lifecycle failed: {0}")]
    Lifecycle(#[from] LifecycleError<AtlasError>),
}

/// Work resolved from the command line and configuration.
#[derive(Debug, Eq, PartialEq)]
enum Action {
    Run(InstanceRequest),
    Create(InstanceRequest),
    Status(InstanceId),
    Stop(InstanceId),
    Start(InstanceId),
    Delete(InstanceId),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let exit_code = match dispatch(cli, &cancel).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            cancel.cancel();
        }
    });
}

async fn dispatch(cli: Cli, cancel: &CancellationToken) -> Result<(), CliError> {
    let config = AtlasConfig::load_without_cli_args()?;
    config.validate()?;
    let action = resolve(cli, &config)?;

    let credentials = config.credential_source()?.into_provider()?;
    let client = AtlasClient::new(config.region_url()?, credentials)?;
    let orchestrator =
        LifecycleOrchestrator::new(client, config.project()?).with_poll_policy(config.poll_policy()?);

    execute(&orchestrator, &action, cancel, io::stdout()).await?;
    Ok(())
}

fn resolve(cli: Cli, config: &AtlasConfig) -> Result<Action, ConfigError> {
    let request = |command: &CreateCommand| {
        config.instance_request(command.name.as_deref(), command.instance_type.as_deref())
    };
    Ok(match cli {
        Cli::Run(command) => Action::Run(request(&command)?),
        Cli::Create(command) => Action::Create(request(&command)?),
        Cli::Status(command) => Action::Status(InstanceId::from(command.id)),
        Cli::Stop(command) => Action::Stop(InstanceId::from(command.id)),
        Cli::Start(command) => Action::Start(InstanceId::from(command.id)),
        Cli::Delete(command) => Action::Delete(InstanceId::from(command.id)),
    })
}

async fn execute<A>(
    orchestrator: &LifecycleOrchestrator<A>,
    action: &Action,
    cancel: &CancellationToken,
    mut out: impl Write,
) -> Result<(), LifecycleError<A::Error>>
where
    A: InstanceApi,
{
    match action {
        Action::Run(request) => {
            let id = orchestrator.run_lifecycle(request, cancel).await?;
            writeln!(out, "{id} DELETED").ok();
        }
        Action::Create(request) => {
            let instance = orchestrator.create(request, cancel).await?;
            writeln!(out, "{} {}", instance.id, instance.state).ok();
        }
        Action::Status(id) => {
            let instance = orchestrator.status(id, cancel).await?;
            writeln!(out, "{} {}", instance.id, instance.state).ok();
        }
        Action::Stop(id) => {
            orchestrator.stop(id, cancel).await?;
            writeln!(out, "{id} STOPPED").ok();
        }
        Action::Start(id) => {
            let instance = orchestrator.start(id, cancel).await?;
            writeln!(out, "{} {}", instance.id, instance.state).ok();
        }
        Action::Delete(id) => {
            orchestrator.delete(id, cancel).await?;
            writeln!(out, "{id} DELETED").ok();
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
