use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use remitrates::core::log::init_logging;

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

impl From<Commands> for remitrates::AppCommand {
    fn from(cmd: Commands) -> remitrates::AppCommand {
        match cmd {
            Commands::Rates {
                from,
                to,
                refresh,
                json,
            } => remitrates::AppCommand::Rates {
                from,
                to,
                refresh,
                json,
            },
            Commands::Forex { from, to, refresh } => {
                remitrates::AppCommand::Forex { from, to, refresh }
            }
            Commands::Margins => remitrates::AppCommand::Margins,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Compare provider rates for a currency pair
    Rates {
        /// Source currency
        #[arg(short, long, default_value = "USD")]
        from: String,
        /// Target currency, defaults to the first configured target
        #[arg(short, long)]
        to: Option<String>,
        /// Ignore cached results
        #[arg(long)]
        refresh: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the mid-market forex rate for a currency pair
    Forex {
        /// Source currency
        #[arg(short, long, default_value = "USD")]
        from: String,
        /// Target currency, defaults to the first configured target
        #[arg(short, long)]
        to: Option<String>,
        /// Ignore cached results
        #[arg(long)]
        refresh: bool,
    },
    /// Check configured provider margins against live rates
    Margins,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => remitrates::cli::setup::setup(),
        Some(cmd) => remitrates::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
