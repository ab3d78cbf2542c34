pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::{AppConfig, DisplayOptions};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};

/// Raw display flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ViewArgs {
    pub kiosk: Option<String>,
    pub refresh: Option<String>,
    pub json: bool,
}

pub enum AppCommand {
    Summary(ViewArgs),
    Watch(ViewArgs),
    Template { output: Option<PathBuf> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("aumdash starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Summary(args) => {
            let options = DisplayOptions::resolve(
                args.kiosk.as_deref(),
                args.refresh.as_deref(),
                &config.display,
            );
            let session = cli::Session::from_config(&config)?;
            let report = session.refresh(!args.json).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", session.render(&report, &options));
            }
            Ok(())
        }
        AppCommand::Watch(args) => {
            let options = DisplayOptions::resolve(
                args.kiosk.as_deref(),
                args.refresh.as_deref(),
                &config.display,
            );
            let session = cli::Session::from_config(&config)?;
            cli::watch::run(&session, options).await
        }
        AppCommand::Template { output } => {
            cli::template::run(&config.universe()?, output.as_deref())
        }
    }
}
