use jobwarden::commands::run::{list_backends, run_job};
use jobwarden::commands::{Cli, Commands};
use jobwarden::config::RuntimeConfig;
use jobwarden::utils::logger::init_logger;
use jobwarden::Runtime;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let log_level = cli.log.clone().or_else(|| RuntimeConfig::load().log_level);
    if let Err(err) = init_logger(log_level.as_deref(), None) {
        eprintln!("Failed to initialize logging: {}", err);
    }

    match main_impl(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn main_impl(command: Commands) -> anyhow::Result<ExitCode> {
    let runtime = Runtime::initialize();
    match command {
        Commands::Run {
            url,
            env_vars,
            timeout,
            command,
        } => {
            let report = run_job(runtime, &url, &env_vars, timeout, &command)?;
            report.print();
            Ok(ExitCode::from(report.process_exit_code()))
        }
        Commands::Backends { json } => {
            list_backends(runtime, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
