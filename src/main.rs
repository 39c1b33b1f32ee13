use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use run_recorder::cli::Cli;
use run_recorder::config::TrackingConfig;
use run_recorder::recorder::{record_run, RunMetadata};
use run_recorder::tracking::Backend;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the run identity lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = TrackingConfig::from_env()
        .and_then(|c| c.with_overrides(cli.tracking_uri.as_deref(), cli.experiment_name.as_deref()))
        .context("invalid tracking configuration")?;
    tracing::debug!(tracking_uri = %config.tracking_uri, "resolved tracking backend");

    let backend = Backend::from_config(&config).context("failed to set up tracking backend")?;
    let experiment_id = config
        .experiment
        .resolve(&backend)
        .await
        .context("failed to resolve experiment")?;

    let workdir = std::env::current_dir().context("failed to read working directory")?;
    let mut stdout = std::io::stdout().lock();
    record_run(
        &backend,
        &experiment_id,
        &cli.run_args(),
        &RunMetadata::from_env(),
        &workdir,
        &mut stdout,
    )
    .await
    .context("failed to record run")?;

    Ok(())
}
