mod config;
mod observability;

use clap::{Args, Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Fans catalog search queries out to the upstream search API")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the search router
    SearchRouter(ConfigArgs),
    /// Load and validate a config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short, default_value = "tunesearch.yaml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::SearchRouter(args) => run_search_router(args),
        CliCommand::CheckConfig(args) => match Config::from_file(&args.config) {
            Ok(config) => {
                println!("{config:#?}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", args.config.display());
                ExitCode::FAILURE
            }
        },
    }
}

fn run_search_router(args: ConfigArgs) -> ExitCode {
    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry_guard = match observability::init_logging(&config.common.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Could not initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(metrics_config) = &config.common.metrics
        && let Err(e) = observability::init_metrics(metrics_config)
    {
        tracing::error!(error = %e, "Could not initialize metrics");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Could not start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting search-router");
    match runtime.block_on(search_router::run(config.search_router)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Search router stopped");
            ExitCode::FAILURE
        }
    }
}
