//! Main entry point for amdfan

use amdfan::{
    args::{Args, Commands},
    commands,
    daemon::{self, DaemonOptions},
    logging,
    source::SysfsSource,
};
use clap::Parser;
use std::{process::ExitCode, sync::Arc};

async fn dispatch(args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Commands::Daemon {
            notification_fd,
            pidfile,
            config,
        } => {
            daemon::run(DaemonOptions {
                notification_fd,
                pidfile: Some(pidfile),
                config,
            })
            .await?
        }
        Commands::Monitor { fps, single_run } => commands::monitor(fps, single_run).await?,
        Commands::Set { card, speed } => {
            commands::set_speed(Arc::new(SysfsSource::new()), card.as_deref(), speed)?
        }
        Commands::PrintDefault {
            configuration,
            service,
        } => match commands::default_text(configuration, service.as_deref()) {
            Some(text) => println!("{}", text),
            None => {
                eprintln!("Nothing to print, see `amdfan print-default --help`");
                return Ok(ExitCode::FAILURE);
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::setup(args.verbose, args.logfile.as_deref()) {
        eprintln!("unable to set up logging: {}", e);
        return ExitCode::FAILURE;
    }

    log::debug!(
        "amdfan v{} (git {}) built {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_DESC").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown"),
    );

    match dispatch(args).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
