use anyhow::Result;
use clap::{CommandFactory, Parser};
use gatewatch::assess::SpctlAssessor;
use gatewatch::cli::Cli;
use gatewatch::reconcile::{ReconcileOptions, Reconciler};
use gatewatch::store::ExpectationStore;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_directive())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Adding requires something to add; catch this before any work begins.
    if cli.allow_add() && cli.targets.is_empty() {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "--add and --update require at least one target path",
            )
            .exit();
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

/// Load the store, reconcile, and write it back iff anything changed.
/// Returns whether every target succeeded.
fn run(cli: &Cli) -> Result<bool> {
    let store_path = cli.store_path()?;
    let mut store = ExpectationStore::load(&store_path, cli.substitute_home(), dirs::home_dir())?;

    let assessor = SpctlAssessor::with_program(&cli.spctl_path);
    let options = ReconcileOptions {
        allow_add: cli.allow_add(),
        allow_freshen: cli.allow_freshen(),
    };

    let report = Reconciler::new(&mut store, &assessor, options).run(&cli.targets)?;

    if report.changed {
        store.save()?;
        debug!("Store written to {}", store_path.display());
    }

    Ok(!report.failed())
}
