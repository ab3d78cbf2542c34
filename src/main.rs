use aumdash::core::log::init_logging;
use aumdash::{AppCommand, ViewArgs};
use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct KioskArg {
    /// Show only the total in large type (1/true/yes/y enables)
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    kiosk: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display estimated assets once
    Summary {
        #[command(flatten)]
        kiosk: KioskArg,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Redraw estimated assets until interrupted
    Watch {
        #[command(flatten)]
        kiosk: KioskArg,

        /// Refresh interval in milliseconds
        #[arg(long)]
        refresh: Option<String>,
    },
    /// Write an overrides CSV template for the tracked tickers
    Template {
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Summary { kiosk, json } => AppCommand::Summary(ViewArgs {
                kiosk: kiosk.kiosk,
                refresh: None,
                json,
            }),
            Commands::Watch { kiosk, refresh } => AppCommand::Watch(ViewArgs {
                kiosk: kiosk.kiosk,
                refresh,
                json: false,
            }),
            Commands::Template { output } => AppCommand::Template { output },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => aumdash::cli::setup::setup_at_path(path),
            None => aumdash::cli::setup::setup(),
        },
        Some(cmd) => aumdash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
