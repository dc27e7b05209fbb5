//! blobworm: tag every blob of a container and optionally extend its WORM
//! retention or delete it.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use blobworm_azure::AzureContainerClient;
use blobworm_core::app::{self, RunReport};
use blobworm_core::domain::ContainerTarget;
use blobworm_core::ports::SystemClock;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

const DEFAULT_LOG_FILTER: &str = "blobworm_core=info,blobworm_azure=info,blobworm_cli=info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // .env has to be loaded before clap reads env-backed flags
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "ignoring unreadable environment file"),
    }

    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let (options, ignored) = cli.run_options();
    for word in &ignored {
        warn!(word = %word, "ignoring unknown operation");
    }
    info!(
        extend = options.operations.extend,
        delete = options.operations.delete,
        extension_days = options.extension_days,
        "operations selected"
    );

    let target = ContainerTarget::from_env().context("cannot resolve the storage target")?;
    let container = AzureContainerClient::connect(&target, &cli.client_settings())
        .await
        .with_context(|| {
            format!(
                "cannot connect to container {} of account {}",
                target.container_name, target.account_name
            )
        })?;

    let report = app::run(&container, &SystemClock, &options)
        .await
        .context("run aborted")?;
    summarize(&report);

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("cannot encode the run report")?;
        println!("{json}");
    }
    Ok(())
}

fn summarize(report: &RunReport) {
    let passes = [
        ("tagging", Some(&report.tagging)),
        ("extension", report.extension.as_ref()),
        ("deletion", report.deletion.as_ref()),
    ];
    for (pass, outcome) in passes {
        let Some(outcome) = outcome else { continue };
        if outcome.is_clean() {
            info!(pass, succeeded = outcome.succeeded.len(), "pass finished");
        } else {
            warn!(
                pass,
                succeeded = outcome.succeeded.len(),
                failed = outcome.failed.len(),
                "pass finished with failures"
            );
        }
    }
}
