use clap::Parser;
use quire::app::{self, Outcome};
use quire::cli::Cli;
use quire::error::ErrorKind;
use quire::logging;
use quire_session::LinePrompt;
use std::process::ExitCode;
use time::UtcOffset;

fn main() -> ExitCode {
    let cli = Cli::parse();
    // The local offset can only be read while the process is single-threaded.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let config = quire_config::load(cli.config.as_deref(), &cli.overrides());
    logging::init(config.as_ref().map_or(cli.verbose, |config| config.verbose));
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", ErrorKind::Config((*e).to_string()));
            tracing::debug!(error = ?e, "Configuration rejected");
            return ExitCode::FAILURE;
        },
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Could not start the async runtime");
            return ExitCode::FAILURE;
        },
    };
    let discovery = app::discovery(&config);
    let prompt = Box::new(LinePrompt::stdin());
    match runtime.block_on(app::run(&config, discovery, prompt, offset)) {
        Ok(Outcome::Listed(_) | Outcome::Scanned(_)) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", *e);
            tracing::debug!(error = ?e, "Invocation failed");
            ExitCode::FAILURE
        },
    }
}
