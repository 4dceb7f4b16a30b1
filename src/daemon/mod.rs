//! Daemon implementation: signals, pidfile and readiness around the controller

use crate::{
    config::{self, CONFIG_LOCATIONS},
    controller::{ControlHandle, Controller},
    logging::Logger,
    source::SysfsSource,
};
use anyhow::Context;
use log::info;
use std::{fs::File, io::Write, path::PathBuf, sync::Arc};
use tokio::signal::unix::{signal, SignalKind};

mod pidfile;

pub use pidfile::Pidfile;

/// How the daemon was asked to run
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub notification_fd: Option<i32>,
    pub pidfile: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// What a caught signal asks of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Reload,
    Stop,
}

fn request_for(kind: SignalKind) -> Request {
    if kind == SignalKind::hangup() {
        Request::Reload
    } else {
        Request::Stop
    }
}

/// Forward SIGHUP as reload and SIGTERM/SIGINT as stop requests
fn spawn_signal_handling(handle: ControlHandle) -> anyhow::Result<()> {
    let mut hup = signal(SignalKind::hangup()).context("unable to listen for SIGHUP")?;
    let mut term = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let mut int = signal(SignalKind::interrupt()).context("unable to listen for SIGINT")?;

    tokio::spawn(async move {
        loop {
            let (name, kind) = tokio::select! {
                _ = hup.recv() => ("SIGHUP", SignalKind::hangup()),
                _ = term.recv() => ("SIGTERM", SignalKind::terminate()),
                _ = int.recv() => ("SIGINT", SignalKind::interrupt()),
            };

            info!("caught signal: {}", name);
            match request_for(kind) {
                Request::Reload => handle.reload(),
                Request::Stop => {
                    info!("Shutting down controller");
                    handle.stop();
                    break;
                }
            }
        }
    });

    Ok(())
}

/// Writer for the readiness notification file descriptor
fn notification_channel(fd: i32) -> anyhow::Result<Box<dyn Write + Send>> {
    use std::os::fd::FromRawFd;

    if fd < 0 {
        anyhow::bail!("invalid notification file descriptor {}", fd);
    }

    // SAFETY: the descriptor is handed to us by the service manager for this
    // single purpose and nothing else in the process uses it.
    Ok(Box::new(unsafe { File::from_raw_fd(fd) }))
}

/// Run the controller until a stop signal arrives
pub async fn run(options: DaemonOptions) -> anyhow::Result<()> {
    info!("Launching the amdfan controller");

    let _pidfile = match &options.pidfile {
        Some(path) => Some(Pidfile::create(path).context("unable to create pidfile")?),
        None => None,
    };

    let config_path = match options.config {
        Some(path) => path,
        None => config::ensure(&CONFIG_LOCATIONS).context("unable to locate configuration")?,
    };

    let controller = Controller::new(
        config_path,
        Arc::new(SysfsSource::new()),
        Logger::global(),
    )?;

    spawn_signal_handling(controller.handle())?;

    let ready = options.notification_fd.map(notification_channel).transpose()?;
    controller.run(ready).await?;

    info!("Goodbye");
    Ok(())
}
