use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{LevelFilter, error};
use syslog::{BasicLogger, Facility, Formatter3164};

use sunrise_clockd::{
    application::{self, Application},
    cli::{Cli, Command},
    config::Config,
};

fn init_log() -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "sunrise_clockd".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(LevelFilter::Info))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    log::set_max_level(config.level_filter()?);

    match cli.command {
        Command::Start => Application::builder()
            .with_config(config)
            .foreground(cli.foreground)
            .build()?
            .start(),
        Command::Stop => application::stop(&config).map(|_| ()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_log() {
        eprintln!("sunrise_clockd: syslog unavailable, logging disabled: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("sunrise_clockd: {e:#}");
            ExitCode::FAILURE
        }
    }
}
