//! `start` and `stop` flows of the daemon.

use std::{fs::File, sync::Arc};

use anyhow::{Context, Result, anyhow};
use daemonize::Daemonize;
use log::{error, info, warn};

use crate::{
    app_context::{AppState, Devices},
    config::Config,
    coordinator::SystemCoordinator,
    instance::{PidFile, StopOutcome},
    time_source::LocalClock,
};

/// The daemon process: single-instance guard, hardware, workers.
///
/// # Example
///
/// ```no_run
/// use sunrise_clockd::{application::Application, config::Config};
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// Application::builder()
///     .with_config(config)
///     .foreground(true)
///     .build()?
///     .start()
/// # }
/// ```
pub struct Application {
    config: Config,
    foreground: bool,
    pidfile: PidFile,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Starts the daemon and blocks until it is told to stop.
    ///
    /// Everything that can fail on a misconfigured machine (a live instance,
    /// missing GPIO lines, no display on the bus) fails here, before the
    /// process detaches from the terminal.
    pub fn start(self) -> Result<()> {
        self.pidfile.ensure_not_running()?;
        let devices = Devices::open(&self.config)?;

        if !self.foreground {
            into_daemon(&self.config)?;
        }
        self.pidfile.write_current()?;
        info!(
            "sunrise_clockd {} started (pid {}), alarm at {:02}:{:02}, sunrise over {}s",
            env!("CARGO_PKG_VERSION"),
            std::process::id(),
            self.config.alarm.hour,
            self.config.alarm.minute,
            self.config.sunrise_duration
        );

        let outcome = self.run(devices);
        if let Err(e) = self.pidfile.remove() {
            warn!("{e:#}");
        }
        match &outcome {
            Ok(()) => info!("sunrise_clockd stopped"),
            Err(e) => error!("sunrise_clockd stopped with error: {e:#}"),
        }
        outcome
    }

    fn run(&self, devices: Devices) -> Result<()> {
        // Built only now: a runtime must not be carried across the fork.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")?;

        runtime.block_on(async {
            let state = AppState::new(&self.config, devices, Arc::new(LocalClock))?;
            let mut coordinator = SystemCoordinator::new();
            coordinator.initialize(state)?;
            coordinator.start_all_services().await?;
            coordinator.run_main_loop().await
        })
    }
}

/// Signals the running daemon recorded in the configured pidfile.
pub fn stop(config: &Config) -> Result<StopOutcome> {
    let outcome = PidFile::new(&config.pidfile).stop()?;
    match outcome {
        StopOutcome::Signalled(pid) => info!("Sent SIGTERM to sunrise_clockd (pid {pid})"),
        StopOutcome::AlreadyGone(pid) => {
            warn!("sunrise_clockd (pid {pid}) was not running, removed stale pidfile")
        }
    }
    Ok(outcome)
}

fn into_daemon(config: &Config) -> Result<()> {
    let stdout = File::create(&config.logfile)
        .with_context(|| format!("Failed to create {}", config.logfile.display()))?;
    let stderr = stdout.try_clone()?;
    Daemonize::new()
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .map_err(|e| anyhow!("Failed to daemonize: {e}"))
}

pub struct ApplicationBuilder {
    config: Option<Config>,
    foreground: bool,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self {
            config: None,
            foreground: false,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Stay attached to the terminal instead of daemonizing.
    pub fn foreground(mut self, foreground: bool) -> Self {
        self.foreground = foreground;
        self
    }

    pub fn build(self) -> Result<Application> {
        let config = self
            .config
            .ok_or_else(|| anyhow!("Configuration is required"))?;
        let pidfile = PidFile::new(&config.pidfile);

        Ok(Application {
            config,
            foreground: self.foreground,
            pidfile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceError;
    use pretty_assertions::assert_eq;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        Config {
            pidfile: dir.path().join("sunrise_clockd.pid"),
            ..Config::default()
        }
    }

    #[test]
    fn build_requires_config() {
        assert!(Application::builder().build().is_err());
    }

    #[test]
    fn start_refuses_when_instance_alive() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config.pidfile, format!("{}\n", std::process::id())).unwrap();

        let err = Application::builder()
            .with_config(config.clone())
            .foreground(true)
            .build()
            .unwrap()
            .start()
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<InstanceError>(),
            Some(&InstanceError::AlreadyRunning {
                pid: std::process::id() as i32
            })
        );
        assert!(config.pidfile.exists());
    }

    #[test]
    fn stop_without_pidfile_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let err = stop(&config).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InstanceError>(),
            Some(InstanceError::NotRunning { .. })
        ));
    }
}
