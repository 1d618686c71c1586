//! bio-prompter CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bio_prompter::cli::{
    app::{load_merged_config, run_dictate, run_rehearse, run_script, EXIT_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use bio_prompter::infrastructure::XdgConfigStore;

/// Environment variable holding the log filter
const LOG_ENV: &str = "BIO_PROMPTER_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let cli_config = cli.to_config();

    match cli.command {
        Commands::Config { action } => {
            let presenter = Presenter::new();
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Script(args) => run_script(args, load_merged_config(cli_config).await).await,
        Commands::Dictate(args) => run_dictate(args, load_merged_config(cli_config).await).await,
        Commands::Rehearse(args) => {
            run_rehearse(args, load_merged_config(cli_config).await).await
        }
    }
}
